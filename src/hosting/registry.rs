//! The virtual hosts registry of one configuration generation.
//!
//! # Responsibilities
//! - Resolve a raw `Host` value (with optional `:port`) to a
//!   [`ResolvedVirtualHost`]
//! - Memoize resolutions, misses included, per raw host string
//! - Secondary mount indexes: by identifier, by host group, by
//!   host group + alias + type
//!
//! # Resolution
//! ```text
//! raw host ──▶ cache hit? ──yes──▶ cached result
//!                 │ no
//!                 ▼
//!   normalize, split port ──▶ every host group, declared order:
//!                               walk labels most significant first
//!                               exact port mount?   → winner, stop
//!                               port 0 mount only?  → provisional winner
//!                                                     (first one kept)
//!                 │ none
//!                 ▼
//!   default host name (once) ──▶ cache under the raw host
//! ```
//!
//! # Design Decisions
//! - The registry is immutable after the build; a configuration change
//!   produces a new registry instead of touching this one
//! - The cache is a `DashMap` without any outer lock: two threads racing
//!   on the same uncached key both compute the same result and the later
//!   insert wins
//! - The cache is bounded by entry count; once full, new results are
//!   returned but not stored

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::config::schema::HostsSection;
use crate::hosting::error::{ConfigurationError, ConfigurationIssue, MatchError};
use crate::hosting::mount::Mount;
use crate::hosting::port_mount::ANY_PORT;
use crate::hosting::resolved::{ResolvedMount, ResolvedVirtualHost};
use crate::hosting::tree::{HostId, HostingTree, MountId};
use crate::observability::metrics;

const DEFAULT_CHANNEL_MANAGER_SITES: &str = "hst:sites";

/// Mount lookup tables filled while the tree is built.
#[derive(Debug, Default)]
pub struct MountIndex {
    by_identifier: HashMap<String, MountId>,
    by_host_group: HashMap<String, Vec<MountId>>,
    by_group_alias_and_type: HashMap<String, HashMap<(String, String), MountId>>,
}

impl MountIndex {
    /// Register an attached mount. Returns the collisions found.
    ///
    /// An alias/type pair keeps its first mount; an identifier keeps its
    /// last.
    pub(crate) fn add_mount(&mut self, tree: &HostingTree, id: MountId) -> Vec<ConfigurationError> {
        let mount = tree.mount(id);
        let group = mount.host_group_name();
        let mut collisions = Vec::new();

        self.by_host_group.entry(group.to_string()).or_default().push(id);

        if let Some(alias) = mount.alias() {
            let by_alias = self.by_group_alias_and_type.entry(group.to_string()).or_default();
            for mount_type in mount.types() {
                match by_alias.entry((alias.to_string(), mount_type.to_string())) {
                    Entry::Vacant(slot) => {
                        slot.insert(id);
                    }
                    Entry::Occupied(existing) => collisions.push(ConfigurationError::AliasConflict {
                        group: group.to_string(),
                        alias: alias.to_string(),
                        mount_type: mount_type.to_string(),
                        existing: describe_mount(tree, *existing.get()),
                    }),
                }
            }
        }

        if self.by_identifier.insert(mount.identifier().to_string(), id).is_some() {
            collisions.push(ConfigurationError::DuplicateIdentifier {
                identifier: mount.identifier().to_string(),
            });
        }
        collisions
    }
}

/// `host:port/mount/path`, for log lines and issue messages.
pub(crate) fn describe_mount(tree: &HostingTree, id: MountId) -> String {
    let mount = tree.mount(id);
    format!(
        "{}:{}{}",
        tree.host(mount.virtual_host_id()).host_name(),
        mount.port(),
        mount.mount_path()
    )
}

/// Registry-wide settings that are not inherited by nodes.
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    pub default_host_name: Option<String>,
    pub default_context_path: Option<String>,
    pub context_path_in_url: bool,
    pub port_in_url: bool,
    pub cms_preview_prefix: String,
    pub channel_manager_host_group: Option<String>,
    pub channel_manager_sites: String,
    pub prefix_exclusions: Vec<String>,
    pub suffix_exclusions: Vec<String>,
    pub max_cached_hosts: usize,
}

impl RegistrySettings {
    pub fn from_config(section: &HostsSection) -> Self {
        let cms_preview_prefix = section
            .cms_preview_prefix
            .as_deref()
            .unwrap_or_default()
            .trim_matches('/')
            .to_string();
        if cms_preview_prefix.is_empty() {
            tracing::info!("Empty cms_preview_prefix; CMS and site URLs share their prefix");
        }

        Self {
            default_host_name: section
                .default_host_name
                .as_deref()
                .map(normalize_host_name)
                .filter(|h| !h.is_empty()),
            default_context_path: section.default_context_path.clone(),
            context_path_in_url: section.show_context_path,
            port_in_url: section.show_port,
            cms_preview_prefix,
            channel_manager_host_group: section.channel_manager_host_group.clone(),
            channel_manager_sites: section
                .channel_manager_sites
                .clone()
                .unwrap_or_else(|| DEFAULT_CHANNEL_MANAGER_SITES.to_string()),
            prefix_exclusions: section.prefix_exclusions.clone(),
            suffix_exclusions: section.suffix_exclusions.clone(),
            max_cached_hosts: section.max_cached_hosts,
        }
    }
}

/// Immutable snapshot of every host group, virtual host and mount.
#[derive(Debug)]
pub struct VirtualHosts {
    tree: Arc<HostingTree>,
    index: MountIndex,
    settings: RegistrySettings,
    issues: Vec<ConfigurationIssue>,
    generation: u64,
    resolved_cache: DashMap<String, Option<Arc<ResolvedVirtualHost>>>,
}

impl VirtualHosts {
    pub(crate) fn new(
        tree: HostingTree,
        index: MountIndex,
        settings: RegistrySettings,
        issues: Vec<ConfigurationIssue>,
        generation: u64,
    ) -> Self {
        metrics::record_cached_hosts(0);
        Self {
            tree: Arc::new(tree),
            index,
            settings,
            issues,
            generation,
            resolved_cache: DashMap::new(),
        }
    }

    /// Resolve a raw host header value.
    ///
    /// `Ok(None)` is an ordinary miss and is cached like a hit. Malformed
    /// input is an error and is never cached.
    pub fn match_virtual_host(&self, raw_host: &str) -> Result<Option<Arc<ResolvedVirtualHost>>, MatchError> {
        if let Some(cached) = self.resolved_cache.get(raw_host) {
            metrics::record_resolution("cache_hit");
            return Ok(cached.value().clone());
        }

        let resolved = match self.resolve(raw_host, true) {
            Ok(resolved) => resolved,
            Err(e) => {
                metrics::record_resolution("error");
                return Err(e);
            }
        };

        match &resolved {
            Some(host) => {
                metrics::record_resolution("resolved");
                tracing::debug!(
                    raw_host,
                    host = %host.virtual_host().host_name(),
                    group = %host.virtual_host().host_group_name(),
                    port = host.port_mount().port_number(),
                    generation = self.generation,
                    "Host resolved"
                );
            }
            None => {
                metrics::record_resolution("not_found");
                tracing::info!(
                    raw_host,
                    default_host = ?self.settings.default_host_name,
                    "No virtual host mapping, not even for the default host"
                );
            }
        }
        Ok(resolved)
    }

    /// Resolve `raw_host` through the cache, caching what it computes.
    ///
    /// The default host is tried only when `allow_default` is set, and
    /// the fallback lookup itself never falls back again.
    fn resolve(&self, raw_host: &str, allow_default: bool) -> Result<Option<Arc<ResolvedVirtualHost>>, MatchError> {
        if let Some(cached) = self.resolved_cache.get(raw_host) {
            return Ok(cached.value().clone());
        }

        let (host_name, port) = split_host(raw_host)?;
        let mut resolved = self.find_matching_virtual_host(&host_name, port);

        if resolved.is_none() && allow_default {
            if let Some(default_host) = self.settings.default_host_name.as_deref() {
                if default_host != host_name {
                    tracing::debug!(
                        host = %host_name,
                        default_host = %default_host,
                        "No mapping for host; trying the default host"
                    );
                    let fallback = if port != ANY_PORT {
                        format!("{}:{}", default_host, port)
                    } else {
                        default_host.to_string()
                    };
                    resolved = self.resolve(&fallback, false)?;
                }
            }
        }

        self.remember(raw_host, resolved.clone());
        Ok(resolved)
    }

    fn remember(&self, raw_host: &str, resolved: Option<Arc<ResolvedVirtualHost>>) {
        if self.resolved_cache.len() >= self.settings.max_cached_hosts {
            tracing::debug!(raw_host, "Resolution cache full; result not cached");
            return;
        }
        self.resolved_cache.insert(raw_host.to_string(), resolved);
        metrics::record_cached_hosts(self.resolved_cache.len());
    }

    /// Walk every host group for a port-stripped, normalized host name.
    ///
    /// The first exact port match ends the search. The first match
    /// through a port 0 entry is provisional: a later exact port match
    /// replaces it, a later port 0 match does not.
    pub fn find_matching_virtual_host(&self, host_name: &str, port: u16) -> Option<Arc<ResolvedVirtualHost>> {
        let labels: Vec<&str> = host_name.split('.').collect();
        let mut winner: Option<(HostId, u16)> = None;

        for group in self.tree.host_groups() {
            let Some(host_id) = self.tree.find_host(group, &labels) else {
                continue;
            };
            let host = self.tree.host(host_id);

            match host.port_mount(port) {
                Some(port_mount) => {
                    if port_mount.root_mount_id().is_some() {
                        winner = Some((host_id, port));
                        break;
                    }
                }
                None if port != ANY_PORT => {
                    let usable = host
                        .port_mount(ANY_PORT)
                        .is_some_and(|pm| pm.root_mount_id().is_some());
                    if usable {
                        match winner {
                            Some((previous, _)) => tracing::debug!(
                                previous = %self.tree.host(previous).host_name(),
                                previous_group = %self.tree.host(previous).host_group_name(),
                                group = %group.name(),
                                port,
                                "Port 0 candidate ignored; an earlier host group already has one"
                            ),
                            None => winner = Some((host_id, ANY_PORT)),
                        }
                    }
                }
                None => {}
            }
        }

        winner.map(|(host, port_mount)| {
            Arc::new(ResolvedVirtualHost::new(
                Arc::clone(&self.tree),
                host,
                host_name.to_string(),
                port,
                port_mount,
            ))
        })
    }

    /// Resolve a host and then a mount below it.
    pub fn match_mount(
        &self,
        raw_host: &str,
        context_path: Option<&str>,
        request_path: &str,
    ) -> Result<Option<ResolvedMount>, MatchError> {
        Ok(self
            .match_virtual_host(raw_host)?
            .and_then(|host| host.match_mount(context_path, request_path)))
    }

    pub fn mount_by_identifier(&self, identifier: &str) -> Option<&Mount> {
        self.index
            .by_identifier
            .get(identifier)
            .map(|id| self.tree.mount(*id))
    }

    /// The first mount registered in `group` with `alias` (any case)
    /// among its aliases and `mount_type` among its types.
    pub fn mount_by_group_alias_and_type(
        &self,
        group: &str,
        alias: &str,
        mount_type: &str,
    ) -> Result<Option<&Mount>, MatchError> {
        if alias.is_empty() {
            return Err(MatchError::InvalidLookup { reason: "alias is empty" });
        }
        if mount_type.is_empty() {
            return Err(MatchError::InvalidLookup { reason: "mount type is empty" });
        }
        let key = (alias.to_lowercase(), mount_type.to_string());
        Ok(self
            .index
            .by_group_alias_and_type
            .get(group)
            .and_then(|by_alias| by_alias.get(&key))
            .map(|id| self.tree.mount(*id)))
    }

    /// Mounts of a host group in registration order.
    pub fn mounts_by_host_group(&self, group: &str) -> Vec<&Mount> {
        self.index
            .by_host_group
            .get(group)
            .map(|ids| ids.iter().map(|id| self.tree.mount(*id)).collect())
            .unwrap_or_default()
    }

    /// Host group names in declared order.
    pub fn host_group_names(&self) -> Vec<&str> {
        self.tree.host_groups().iter().map(|g| g.name()).collect()
    }

    /// Whether a request path is excluded from handling altogether.
    pub fn is_excluded(&self, path_info: &str) -> bool {
        self.settings
            .prefix_exclusions
            .iter()
            .any(|prefix| path_info.starts_with(prefix.as_str()))
            || self
                .settings
                .suffix_exclusions
                .iter()
                .any(|suffix| path_info.ends_with(suffix.as_str()))
    }

    pub fn tree(&self) -> &Arc<HostingTree> {
        &self.tree
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    pub fn issues(&self) -> &[ConfigurationIssue] {
        &self.issues
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cached_hosts(&self) -> usize {
        self.resolved_cache.len()
    }

    pub fn default_host_name(&self) -> Option<&str> {
        self.settings.default_host_name.as_deref()
    }

    pub fn default_context_path(&self) -> Option<&str> {
        self.settings.default_context_path.as_deref()
    }

    pub fn cms_preview_prefix(&self) -> &str {
        &self.settings.cms_preview_prefix
    }

    pub fn channel_manager_host_group_name(&self) -> Option<&str> {
        self.settings.channel_manager_host_group.as_deref()
    }

    pub fn channel_manager_sites_name(&self) -> &str {
        &self.settings.channel_manager_sites
    }

    pub fn is_context_path_in_url(&self) -> bool {
        self.settings.context_path_in_url
    }

    pub fn is_port_in_url(&self) -> bool {
        self.settings.port_in_url
    }
}

/// Trim, lowercase and drop one trailing `.`: the form host names are
/// compared in.
pub fn normalize_host_name(name: &str) -> String {
    let name = name.trim().to_lowercase();
    match name.strip_suffix('.') {
        Some(stripped) => stripped.to_string(),
        None => name,
    }
}

/// Normalize a raw host value and split off its port (0 when absent).
pub fn split_host(raw_host: &str) -> Result<(String, u16), MatchError> {
    let trimmed = raw_host.trim();
    let (host, port) = match trimmed.split_once(':') {
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|_| MatchError::InvalidPort {
                host: raw_host.to_string(),
            })?;
            (host, port)
        }
        None => (trimmed, ANY_PORT),
    };
    let host = normalize_host_name(host);
    if host.is_empty() {
        return Err(MatchError::EmptyHost);
    }
    Ok((host, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_host() {
        assert_eq!(split_host("WWW.Example.com").unwrap(), ("www.example.com".into(), 0));
        assert_eq!(split_host(" example.com.:8080 ").unwrap(), ("example.com".into(), 8080));
        assert_eq!(split_host("localhost:0").unwrap(), ("localhost".into(), 0));
        assert!(matches!(split_host("example.com:http"), Err(MatchError::InvalidPort { .. })));
        assert!(matches!(split_host("example.com:"), Err(MatchError::InvalidPort { .. })));
        assert!(matches!(split_host("example.com:70000"), Err(MatchError::InvalidPort { .. })));
        assert_eq!(split_host("  "), Err(MatchError::EmptyHost));
        assert_eq!(split_host(":8080"), Err(MatchError::EmptyHost));
    }

    #[test]
    fn test_settings_normalization() {
        let section = HostsSection {
            cms_preview_prefix: Some("/_cmsinternal/".into()),
            default_host_name: Some(" LocalHost. ".into()),
            ..HostsSection::default()
        };
        let settings = RegistrySettings::from_config(&section);
        assert_eq!(settings.cms_preview_prefix, "_cmsinternal");
        assert_eq!(settings.default_host_name.as_deref(), Some("localhost"));
        assert_eq!(settings.channel_manager_sites, "hst:sites");
    }

    #[test]
    fn test_is_excluded() {
        let section = HostsSection {
            prefix_exclusions: vec!["/ping/".into()],
            suffix_exclusions: vec![".ico".into()],
            ..HostsSection::default()
        };
        let hosts = VirtualHosts::new(
            HostingTree::new(),
            MountIndex::default(),
            RegistrySettings::from_config(&section),
            Vec::new(),
            1,
        );
        assert!(hosts.is_excluded("/ping/status"));
        assert!(hosts.is_excluded("/favicon.ico"));
        assert!(!hosts.is_excluded("/news"));
    }

    #[test]
    fn test_empty_registry_misses_and_caches() {
        let hosts = VirtualHosts::new(
            HostingTree::new(),
            MountIndex::default(),
            RegistrySettings::from_config(&HostsSection::default()),
            Vec::new(),
            1,
        );
        assert!(hosts.match_virtual_host("www.example.com").unwrap().is_none());
        assert_eq!(hosts.cached_hosts(), 1);
        assert!(hosts.match_virtual_host("bad:port").is_err());
        assert_eq!(hosts.cached_hosts(), 1);
        assert!(hosts.mount_by_group_alias_and_type("prod", "", "live").is_err());
        assert!(hosts.mounts_by_host_group("prod").is_empty());
    }

    fn registry_with_default(default_host: &str) -> VirtualHosts {
        let section = HostsSection {
            default_host_name: Some(default_host.into()),
            ..HostsSection::default()
        };
        VirtualHosts::new(
            HostingTree::new(),
            MountIndex::default(),
            RegistrySettings::from_config(&section),
            Vec::new(),
            1,
        )
    }

    #[test]
    fn test_missing_default_host_with_trailing_dot() {
        let hosts = registry_with_default("localhost.");
        assert!(hosts.match_virtual_host("unknown.example.org").unwrap().is_none());
        assert!(hosts.match_virtual_host("unknown.example.org:8080").unwrap().is_none());
        // each raw host plus its default host lookup
        assert_eq!(hosts.cached_hosts(), 4);
    }

    /// Collects the `outcome` label of every resolution counter increment.
    #[derive(Default)]
    struct OutcomeRecorder {
        outcomes: Arc<std::sync::Mutex<Vec<String>>>,
    }

    struct OutcomeCounter {
        outcome: String,
        outcomes: Arc<std::sync::Mutex<Vec<String>>>,
    }

    impl ::metrics::CounterFn for OutcomeCounter {
        fn increment(&self, _value: u64) {
            self.outcomes.lock().unwrap().push(self.outcome.clone());
        }

        fn absolute(&self, _value: u64) {}
    }

    impl ::metrics::Recorder for OutcomeRecorder {
        fn describe_counter(&self, _: ::metrics::KeyName, _: Option<::metrics::Unit>, _: ::metrics::SharedString) {}
        fn describe_gauge(&self, _: ::metrics::KeyName, _: Option<::metrics::Unit>, _: ::metrics::SharedString) {}
        fn describe_histogram(&self, _: ::metrics::KeyName, _: Option<::metrics::Unit>, _: ::metrics::SharedString) {}

        fn register_counter(&self, key: &::metrics::Key, _: &::metrics::Metadata<'_>) -> ::metrics::Counter {
            if key.name() != "hosting_resolutions_total" {
                return ::metrics::Counter::noop();
            }
            let outcome = key
                .labels()
                .find(|label| label.key() == "outcome")
                .map(|label| label.value().to_string())
                .unwrap_or_default();
            ::metrics::Counter::from_arc(Arc::new(OutcomeCounter {
                outcome,
                outcomes: Arc::clone(&self.outcomes),
            }))
        }

        fn register_gauge(&self, _: &::metrics::Key, _: &::metrics::Metadata<'_>) -> ::metrics::Gauge {
            ::metrics::Gauge::noop()
        }

        fn register_histogram(&self, _: &::metrics::Key, _: &::metrics::Metadata<'_>) -> ::metrics::Histogram {
            ::metrics::Histogram::noop()
        }
    }

    #[test]
    fn test_fallback_counts_one_resolution() {
        let recorder = OutcomeRecorder::default();
        let hosts = registry_with_default("localhost");

        ::metrics::with_local_recorder(&recorder, || {
            assert!(hosts.match_virtual_host("www.example.com").unwrap().is_none());
            assert!(hosts.match_virtual_host("www.example.com").unwrap().is_none());
            assert!(hosts.match_virtual_host("bad:port").is_err());
        });

        let outcomes = recorder.outcomes.lock().unwrap().clone();
        assert_eq!(outcomes, vec!["not_found", "cache_hit", "error"]);
    }
}
