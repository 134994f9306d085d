//! Virtual host and mount resolution library.

pub mod admin;
pub mod config;
pub mod hosting;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::schema::HostsConfig;
pub use hosting::{HostingManager, VirtualHosts};
pub use http::AdminServer;
pub use lifecycle::Shutdown;
