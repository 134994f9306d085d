//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, farthest host)
//!     → admin handlers (inspection / management)
//!     → JSON response
//! ```

pub mod request;
pub mod server;

pub use request::{farthest_host, X_REQUEST_ID};
pub use server::{AdminServer, AppState};
