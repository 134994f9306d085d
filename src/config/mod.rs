//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! hosting config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → HostsConfig (validated, immutable)
//!     → hosting::Builder (build pass) → VirtualHosts
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → HostingManager::replace builds and swaps the registry
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - Inheritable values are optional so "not set" stays distinguishable
//! - Validation separates syntactic (serde) from semantic checks; tree
//!   shape problems are left to the build pass

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, HostGroupConfig, HostsConfig, HostsSection, MountConfig, ObservabilityConfig,
    PortMountConfig, SiteRootConfig, VirtualHostConfig,
};
