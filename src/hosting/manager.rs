//! Registry manager: the process-wide current [`VirtualHosts`].
//!
//! # Responsibilities
//! - Build registries from a [`ConfigSource`]
//! - Publish them atomically; readers see a whole old or a whole new
//!   registry, never a partial one
//! - Rebuild lazily after [`HostingManager::invalidate`]
//! - Own the editorial lock table across registry generations
//!
//! # Design Decisions
//! - `ArcSwapOption` for the snapshot: reads are a lock-free load
//! - A mutex serializes rebuilds only; readers never take it
//! - A failed rebuild keeps serving the previous registry

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwapOption;

use crate::config::loader::{load_config, ConfigError};
use crate::config::schema::HostsConfig;
use crate::hosting::builder::{BuildPolicy, Builder};
use crate::hosting::error::{LockError, MatchError};
use crate::hosting::locks::{MountLock, MountLocks};
use crate::hosting::mount::Mount;
use crate::hosting::registry::VirtualHosts;
use crate::hosting::resolved::{ResolvedMount, ResolvedVirtualHost};

/// Where hosting configuration comes from.
pub trait ConfigSource: Send + Sync {
    fn load(&self) -> Result<HostsConfig, ConfigError>;

    /// Human readable origin, for logs.
    fn describe(&self) -> String;
}

/// A TOML file on disk, validated on every load.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for FileSource {
    fn load(&self) -> Result<HostsConfig, ConfigError> {
        load_config(&self.path)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// An in-memory configuration; `replace` updates what it serves.
#[derive(Debug, Default)]
pub struct StaticSource {
    config: Mutex<HostsConfig>,
}

impl StaticSource {
    pub fn new(config: HostsConfig) -> Self {
        Self {
            config: Mutex::new(config),
        }
    }

    fn set(&self, config: HostsConfig) {
        *self.config.lock().unwrap_or_else(|e| e.into_inner()) = config;
    }
}

impl ConfigSource for StaticSource {
    fn load(&self) -> Result<HostsConfig, ConfigError> {
        Ok(self.config.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn describe(&self) -> String {
        "in-memory configuration".to_string()
    }
}

pub struct HostingManager {
    source: Box<dyn ConfigSource>,
    /// Latest configuration pushed through `replace`, preferred over the
    /// source on lazy rebuilds until the next `invalidate`.
    pushed: StaticSource,
    has_pushed: AtomicBool,
    current: ArcSwapOption<VirtualHosts>,
    stale: AtomicBool,
    rebuild_lock: Mutex<()>,
    generation: AtomicU64,
    policy: BuildPolicy,
    locks: MountLocks,
}

impl HostingManager {
    pub fn new(source: impl ConfigSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            pushed: StaticSource::default(),
            has_pushed: AtomicBool::new(false),
            current: ArcSwapOption::empty(),
            stale: AtomicBool::new(true),
            rebuild_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
            policy: BuildPolicy::default(),
            locks: MountLocks::new(),
        }
    }

    pub fn from_config(config: HostsConfig) -> Self {
        Self::new(StaticSource::new(config))
    }

    pub fn with_policy(mut self, policy: BuildPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Build and publish a registry now.
    pub fn load(&self) -> Result<Arc<VirtualHosts>, ConfigError> {
        let _guard = self.rebuild_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.rebuild()
    }

    /// Mark the current registry stale; the next read rebuilds it from
    /// the source, dropping any configuration pushed through `replace`.
    pub fn invalidate(&self) {
        self.has_pushed.store(false, Ordering::Release);
        self.stale.store(true, Ordering::Release);
        tracing::info!(source = %self.source.describe(), "Hosting configuration invalidated");
    }

    /// Build from a pushed configuration and publish it.
    ///
    /// The configuration is kept for later lazy rebuilds even when this
    /// build is rejected.
    pub fn replace(&self, config: HostsConfig) -> Result<Arc<VirtualHosts>, ConfigError> {
        let _guard = self.rebuild_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.pushed.set(config);
        self.has_pushed.store(true, Ordering::Release);
        self.rebuild()
    }

    /// The current registry, rebuilt first when stale.
    pub fn virtual_hosts(&self) -> Result<Arc<VirtualHosts>, MatchError> {
        if self.stale.load(Ordering::Acquire) {
            let _guard = self.rebuild_lock.lock().unwrap_or_else(|e| e.into_inner());
            // Another reader may have rebuilt while we waited.
            if self.stale.load(Ordering::Acquire) {
                if let Err(e) = self.rebuild() {
                    tracing::error!(
                        error = %e,
                        "Hosting rebuild failed; serving the previous configuration"
                    );
                }
            }
        }
        self.current.load_full().ok_or(MatchError::NotConfigured)
    }

    /// The current registry without triggering a rebuild.
    pub fn snapshot(&self) -> Option<Arc<VirtualHosts>> {
        self.current.load_full()
    }

    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    /// Caller holds `rebuild_lock`.
    fn rebuild(&self) -> Result<Arc<VirtualHosts>, ConfigError> {
        // Cleared before loading so an invalidation racing with this
        // build triggers another one.
        self.stale.store(false, Ordering::Release);

        let loaded = if self.has_pushed.load(Ordering::Acquire) {
            self.pushed.load()
        } else {
            self.source.load()
        };
        let config = match loaded {
            Ok(config) => config,
            Err(e) => {
                self.stale.store(true, Ordering::Release);
                return Err(e);
            }
        };

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        match Builder::new(&config).policy(self.policy).build(generation) {
            Ok(hosts) => {
                let hosts = Arc::new(hosts);
                self.current.store(Some(Arc::clone(&hosts)));
                tracing::info!(generation, "Hosting registry published");
                Ok(hosts)
            }
            Err(failure) => Err(ConfigError::Rejected(failure)),
        }
    }

    pub fn match_virtual_host(&self, raw_host: &str) -> Result<Option<Arc<ResolvedVirtualHost>>, MatchError> {
        self.virtual_hosts()?.match_virtual_host(raw_host)
    }

    pub fn match_mount(
        &self,
        raw_host: &str,
        context_path: Option<&str>,
        request_path: &str,
    ) -> Result<Option<ResolvedMount>, MatchError> {
        self.virtual_hosts()?.match_mount(raw_host, context_path, request_path)
    }

    /// A copy of the mount; it stays valid after the registry is replaced.
    pub fn mount_by_identifier(&self, identifier: &str) -> Result<Option<Mount>, MatchError> {
        Ok(self.virtual_hosts()?.mount_by_identifier(identifier).cloned())
    }

    pub fn mount_by_group_alias_and_type(
        &self,
        group: &str,
        alias: &str,
        mount_type: &str,
    ) -> Result<Option<Mount>, MatchError> {
        Ok(self
            .virtual_hosts()?
            .mount_by_group_alias_and_type(group, alias, mount_type)?
            .cloned())
    }

    pub fn locks(&self) -> &MountLocks {
        &self.locks
    }

    /// Lock a mount known to the current registry.
    pub fn lock_mount(&self, identifier: &str, user: &str) -> Result<MountLock, LockError> {
        self.ensure_known(identifier)?;
        self.locks.lock(identifier, user)
    }

    /// Release a lock. A lock left on a mount that no longer exists can
    /// still be released by its holder.
    pub fn unlock_mount(&self, identifier: &str, user: &str) -> Result<(), LockError> {
        if self.locks.lock_of(identifier).is_none() {
            self.ensure_known(identifier)?;
        }
        self.locks.unlock(identifier, user)
    }

    fn ensure_known(&self, identifier: &str) -> Result<(), LockError> {
        let known = self
            .virtual_hosts()
            .map(|hosts| hosts.mount_by_identifier(identifier).is_some())
            .unwrap_or(false);
        if known {
            Ok(())
        } else {
            Err(LockError::UnknownMount(identifier.to_string()))
        }
    }
}
