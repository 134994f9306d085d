//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Build registry → Start watcher → Start admin listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     SIGHUP → Invalidate the hosting registry
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then registry, then listeners
//! - A registry that fails its first build aborts startup

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
