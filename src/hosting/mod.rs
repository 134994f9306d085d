//! Hosting subsystem: virtual hosts, port mounts, mounts and resolution.
//!
//! # Data Flow
//! ```text
//! HostsConfig
//!     → builder.rs (build pass, issues tagged by subtree)
//!     → tree.rs (host groups → virtual hosts → port mounts → mounts)
//!     → registry.rs (VirtualHosts: indexes + resolution cache)
//!     → manager.rs (atomic swap, lazy rebuild on invalidation)
//!
//! Per request:
//!     raw Host header
//!     → VirtualHosts::match_virtual_host → ResolvedVirtualHost
//!     → ResolvedVirtualHost::match_mount → ResolvedMount
//! ```
//!
//! # Design Decisions
//! - Properties are resolved once per node while building; reads never
//!   walk an inheritance chain
//! - A registry is never mutated after its build; editorial locks live in
//!   a separate table
//! - A miss is `Ok(None)`; errors are reserved for bad input and a
//!   missing registry

pub mod builder;
pub mod error;
pub mod locks;
pub mod manager;
pub mod mount;
pub mod port_mount;
pub mod properties;
pub mod registry;
pub mod resolved;
pub mod tree;
pub mod virtual_host;

pub use builder::{BuildPolicy, Builder};
pub use error::{BuildFailure, ConfigurationError, ConfigurationIssue, LockError, MatchError, Severity};
pub use locks::{MountLock, MountLocks};
pub use manager::{ConfigSource, FileSource, HostingManager, StaticSource};
pub use mount::{ContentPaths, Mount, SiteRoots};
pub use port_mount::{PortMount, ANY_PORT};
pub use properties::{HostProperties, MountProperties, LIVE_TYPE, PREVIEW_TYPE};
pub use registry::{split_host, RegistrySettings, VirtualHosts};
pub use resolved::{ResolvedMount, ResolvedMountSummary, ResolvedVirtualHost};
pub use tree::{HostGroup, HostId, HostingTree, MountId};
pub use virtual_host::{VirtualHost, WILDCARD};
