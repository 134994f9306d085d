//! Build pass: raw configuration → immutable [`VirtualHosts`].
//!
//! # Build Order
//! ```text
//! [hosts] defaults
//!   → host groups (declared order)
//!     → virtual hosts (declared order, dotted IP names expanded to chains)
//!       → port mounts (`root` as port 0 first, then `port_mounts`)
//!         → mounts (pre-order: registered before their children)
//!       → child virtual hosts
//! ```
//!
//! # Design Decisions
//! - Problems never escape as panics or early returns from deep inside
//!   the tree; each is reported as a [`ConfigurationIssue`] tagged with
//!   the subtree it was found in
//! - `Error` skips the offending subtree, `Fatal` aborts the pass
//! - The [`BuildPolicy`] decides afterwards whether the result is usable

use std::time::Instant;

use url::Url;

use crate::config::schema::{HostGroupConfig, HostsConfig, MountConfig, VirtualHostConfig};
use crate::hosting::error::{BuildFailure, ConfigurationError, ConfigurationIssue, Severity};
use crate::hosting::mount::{Mount, MountPlacement, SiteRoots};
use crate::hosting::port_mount::{PortMount, ANY_PORT};
use crate::hosting::properties::{HostProperties, MountProperties};
use crate::hosting::registry::{MountIndex, RegistrySettings, VirtualHosts};
use crate::hosting::tree::{HostId, HostingTree, MountId};
use crate::hosting::virtual_host::{split_ip_literal, VirtualHost};
use crate::observability::metrics;

/// Which issues reject a build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BuildPolicy {
    /// Only `Fatal` issues reject the build.
    #[default]
    Lenient,
    /// Any `Error` or `Fatal` issue rejects the build.
    Strict,
}

impl BuildPolicy {
    fn rejects(self, severity: Severity) -> bool {
        match self {
            BuildPolicy::Lenient => severity >= Severity::Fatal,
            BuildPolicy::Strict => severity >= Severity::Error,
        }
    }
}

pub struct Builder<'a> {
    config: &'a HostsConfig,
    policy: BuildPolicy,
}

impl<'a> Builder<'a> {
    pub fn new(config: &'a HostsConfig) -> Self {
        Self {
            config,
            policy: BuildPolicy::default(),
        }
    }

    pub fn policy(mut self, policy: BuildPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Build a registry tagged with `generation`.
    pub fn build(self, generation: u64) -> Result<VirtualHosts, BuildFailure> {
        let started = Instant::now();
        let mut pass = BuildPass {
            config: self.config,
            sites: SiteRoots::from_config(&self.config.sites),
            tree: HostingTree::new(),
            index: MountIndex::default(),
            issues: Vec::new(),
        };

        let aborted = pass.run().is_err();
        let rejected = aborted || pass.issues.iter().any(|i| self.policy.rejects(i.severity));
        metrics::record_build(!rejected, pass.issues.len(), started);

        if rejected {
            tracing::error!(
                generation,
                issues = pass.issues.len(),
                policy = ?self.policy,
                "Hosting configuration rejected"
            );
            return Err(BuildFailure { issues: pass.issues });
        }

        let settings = RegistrySettings::from_config(&self.config.hosts);
        tracing::info!(
            generation,
            host_groups = pass.tree.host_groups().len(),
            virtual_hosts = pass.tree.hosts().len(),
            mounts = pass.tree.mounts().len(),
            issues = pass.issues.len(),
            "Hosting configuration built"
        );
        Ok(VirtualHosts::new(pass.tree, pass.index, settings, pass.issues, generation))
    }
}

/// Marker for a fatal issue; the issue itself is already recorded.
struct Abort;

struct BuildPass<'a> {
    config: &'a HostsConfig,
    sites: SiteRoots,
    tree: HostingTree,
    index: MountIndex,
    issues: Vec<ConfigurationIssue>,
}

impl<'a> BuildPass<'a> {
    fn run(&mut self) -> Result<(), Abort> {
        let config = self.config;

        let mut warnings = Vec::new();
        let defaults = HostProperties::from_defaults(&config.hosts, &mut warnings);
        self.report_all("hosts", warnings)?;

        if config.hosts.channel_manager_host_group.is_none() {
            tracing::warn!("No channel_manager_host_group configured; channel manager hosts are unknown");
        }

        for group in &config.host_groups {
            self.build_group(group, &defaults)?;
        }
        Ok(())
    }

    fn report(&mut self, location: &str, error: ConfigurationError) -> Result<(), Abort> {
        let issue = ConfigurationIssue::new(location, error);
        match issue.severity {
            Severity::Warning => {
                tracing::warn!(location = %issue.location, error = %issue.error, "Hosting configuration warning")
            }
            Severity::Error => {
                tracing::error!(location = %issue.location, error = %issue.error, "Hosting configuration subtree skipped")
            }
            Severity::Fatal => {
                tracing::error!(location = %issue.location, error = %issue.error, "Hosting configuration unusable")
            }
        }
        let fatal = issue.severity == Severity::Fatal;
        self.issues.push(issue);
        if fatal {
            Err(Abort)
        } else {
            Ok(())
        }
    }

    fn report_all(&mut self, location: &str, errors: Vec<ConfigurationError>) -> Result<(), Abort> {
        for error in errors {
            self.report(location, error)?;
        }
        Ok(())
    }

    fn build_group(&mut self, group: &'a HostGroupConfig, defaults: &HostProperties) -> Result<(), Abort> {
        let cms_location = match group.cms_location.as_deref() {
            Some(location) if Url::parse(location).is_ok() => Some(location.to_string()),
            Some(location) => {
                let error = ConfigurationError::InvalidCmsLocation {
                    location: location.to_string(),
                };
                self.report(&group.name, error)?;
                None
            }
            None => None,
        };

        let index = match self.tree.add_host_group(&group.name, cms_location) {
            Ok(index) => index,
            Err(e) => {
                self.report(&group.name, e)?;
                return Ok(());
            }
        };

        for host in &group.hosts {
            self.build_host(index, group, None, host, defaults)?;
        }
        Ok(())
    }

    fn build_host(
        &mut self,
        group_index: usize,
        group: &'a HostGroupConfig,
        parent: Option<HostId>,
        config: &'a VirtualHostConfig,
        inherited: &HostProperties,
    ) -> Result<(), Abort> {
        let parent_host_name = parent.map(|p| self.tree.host(p).host_name().to_string());
        let location = match &parent_host_name {
            Some(parent_name) => format!("{}/{}.{}", group.name, config.name, parent_name),
            None => format!("{}/{}", group.name, config.name),
        };

        // Dotted names are only allowed for IP literals, which become a
        // chain of single child nodes, most significant segment on top.
        let labels: Vec<&str> = match split_ip_literal(&config.name) {
            Ok(Some(segments)) => segments.into_iter().rev().collect(),
            Ok(None) => vec![config.name.as_str()],
            Err(e) => return self.report(&location, e),
        };

        let mut warnings = Vec::new();
        let properties = inherited.inherit(config, &mut warnings);
        self.report_all(&location, warnings)?;

        let mut current = parent;
        for label in labels {
            let parent_name = current.map(|p| self.tree.host(p).host_name().to_string());
            let host = VirtualHost::new(
                label,
                parent_name.as_deref(),
                &group.name,
                self.tree.host_groups()[group_index].cms_location().map(str::to_string),
                properties.clone(),
            );
            let added = match current {
                Some(parent) => self.tree.add_child_host(parent, host),
                None => self.tree.add_root_host(group_index, host),
            };
            match added {
                Ok(id) => current = Some(id),
                Err(e) => return self.report(&location, e),
            }
        }
        let Some(host) = current else {
            return Ok(());
        };

        let location = format!("{}/{}", group.name, self.tree.host(host).host_name());
        tracing::debug!(host = %self.tree.host(host).host_name(), group = %group.name, "Virtual host added");

        if let Some(root) = &config.root {
            self.build_port_mount(host, &group.name, ANY_PORT, Some(root), &location)?;
        }
        for port_mount in &config.port_mounts {
            self.build_port_mount(host, &group.name, port_mount.port, port_mount.root.as_ref(), &location)?;
        }

        for child in &config.hosts {
            self.build_host(group_index, group, Some(host), child, &properties)?;
        }
        Ok(())
    }

    fn build_port_mount(
        &mut self,
        host: HostId,
        group: &'a str,
        port: u16,
        root: Option<&'a MountConfig>,
        location: &str,
    ) -> Result<(), Abort> {
        let location = format!("{}:{}", location, port);
        if self.tree.has_port_mount(host, port) {
            let error = ConfigurationError::DuplicatePortMount {
                host_name: self.tree.host(host).host_name().to_string(),
                port,
            };
            return self.report(&location, error);
        }

        let root_mount = match root {
            Some(root) => {
                let inherited = MountProperties::from_host(self.tree.host(host).properties());
                match self.build_mount(host, group, port, None, root, &inherited, &location)? {
                    Some(id) => Some(id),
                    None => return Ok(()),
                }
            }
            None => {
                let error = ConfigurationError::MissingRootMount {
                    host_name: self.tree.host(host).host_name().to_string(),
                    port,
                };
                self.report(&location, error)?;
                None
            }
        };

        match self.tree.add_port_mount(host, PortMount::new(port, root_mount)) {
            Ok(()) => Ok(()),
            Err(e) => self.report(&location, e),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build_mount(
        &mut self,
        host: HostId,
        group: &'a str,
        port: u16,
        parent: Option<MountId>,
        config: &'a MountConfig,
        inherited: &MountProperties,
        location: &str,
    ) -> Result<Option<MountId>, Abort> {
        let location = format!("{}/{}", location, config.name);
        let parent_path = parent.map(|p| self.tree.mount(p).mount_path().to_string());
        let host_name = self.tree.host(host).host_name().to_string();
        let placement = MountPlacement {
            virtual_host: host,
            host_name: &host_name,
            host_group: group,
            port,
            parent: parent.zip(parent_path.as_deref()),
        };

        let mut warnings = Vec::new();
        let built = Mount::build(config, inherited, placement, &self.sites, &mut warnings);
        self.report_all(&location, warnings)?;
        let mount = match built {
            Ok(mount) => mount,
            Err(e) => {
                self.report(&location, e)?;
                return Ok(None);
            }
        };

        let properties = mount.properties().clone();
        let id = match self.tree.add_mount(parent, mount) {
            Ok(id) => id,
            Err(e) => {
                self.report(&location, e)?;
                return Ok(None);
            }
        };

        let index_warnings = self.index.add_mount(&self.tree, id);
        self.report_all(&location, index_warnings)?;

        for child in &config.mounts {
            self.build_mount(host, group, port, Some(id), child, &properties, &location)?;
        }
        Ok(Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{PortMountConfig, SiteRootConfig};

    fn site(path: &str) -> SiteRootConfig {
        SiteRootConfig {
            path: path.into(),
            content_path: format!("/content{}", path),
            canonical_content_path: None,
        }
    }

    fn host(name: &str) -> VirtualHostConfig {
        VirtualHostConfig {
            name: name.into(),
            ..Default::default()
        }
    }

    fn root_mount() -> MountConfig {
        MountConfig {
            mount_point: Some("/sites/main".into()),
            ..MountConfig::default()
        }
    }

    fn config_with(hosts: Vec<VirtualHostConfig>) -> HostsConfig {
        HostsConfig {
            sites: vec![site("/sites/main"), site("/sites/main-preview")],
            host_groups: vec![HostGroupConfig {
                name: "prod".into(),
                cms_location: None,
                hosts,
            }],
            ..HostsConfig::default()
        }
    }

    #[test]
    fn test_duplicate_host_group_is_fatal() {
        let mut config = config_with(vec![]);
        config.host_groups.push(config.host_groups[0].clone());
        let failure = Builder::new(&config).build(1).unwrap_err();
        assert!(failure
            .issues
            .iter()
            .any(|i| i.severity == Severity::Fatal));
    }

    #[test]
    fn test_duplicate_sibling_host_is_fatal() {
        let config = config_with(vec![host("com"), host("com")]);
        assert!(Builder::new(&config).build(1).is_err());
    }

    #[test]
    fn test_ip_literal_builds_chain() {
        let localhost = VirtualHostConfig {
            root: Some(root_mount()),
            ..host("127.0.0.1")
        };
        let config = config_with(vec![localhost]);
        let hosts = Builder::new(&config).build(1).unwrap();
        let tree = hosts.tree();
        let group = tree.host_group("prod").unwrap();
        let id = tree.find_host(group, &["127", "0", "0", "1"]).unwrap();

        assert_eq!(tree.host(id).host_name(), "127.0.0.1");
        assert!(tree.host(id).port_mount(0).is_some());
    }

    #[test]
    fn test_dotted_name_skips_subtree() {
        let config = config_with(vec![host("www.example.com"), host("localhost")]);
        let hosts = Builder::new(&config).build(1).unwrap();
        assert_eq!(hosts.tree().hosts().len(), 1);
        assert!(hosts
            .issues()
            .iter()
            .any(|i| matches!(i.error, ConfigurationError::DottedHostName { .. })));
    }

    #[test]
    fn test_strict_policy_rejects_errors() {
        let config = config_with(vec![host("www.example.com")]);
        assert!(Builder::new(&config).build(1).is_ok());
        assert!(Builder::new(&config).policy(BuildPolicy::Strict).build(1).is_err());
    }

    #[test]
    fn test_bad_mount_skips_only_its_subtree() {
        let root = MountConfig {
            mounts: vec![
                MountConfig {
                    mount_point: Some("relative".into()),
                    mounts: vec![MountConfig::named("below")],
                    ..MountConfig::named("broken")
                },
                MountConfig::named("fine"),
            ],
            ..root_mount()
        };
        let localhost = VirtualHostConfig {
            root: Some(root),
            ..host("localhost")
        };
        let config = config_with(vec![localhost]);
        let hosts = Builder::new(&config).build(1).unwrap();

        let names: Vec<&str> = hosts.tree().mounts().iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["hst:root", "fine"]);
        let issue = hosts
            .issues()
            .iter()
            .find(|i| i.severity == Severity::Error)
            .unwrap();
        assert_eq!(issue.location, "prod/localhost:0/hst:root/broken");
    }

    #[test]
    fn test_duplicate_sibling_mount_first_wins() {
        let root = MountConfig {
            mounts: vec![
                MountConfig {
                    locale: Some("nl_NL".into()),
                    ..MountConfig::named("site")
                },
                MountConfig {
                    locale: Some("fr_FR".into()),
                    ..MountConfig::named("site")
                },
            ],
            ..root_mount()
        };
        let localhost = VirtualHostConfig {
            root: Some(root),
            ..host("localhost")
        };
        let config = config_with(vec![localhost]);
        let hosts = Builder::new(&config).build(1).unwrap();
        let tree = hosts.tree();
        let root_id = tree.mounts()[0].id();

        assert_eq!(tree.child_mount(root_id, "site").unwrap().locale(), Some("nl_NL"));
        assert!(hosts
            .issues()
            .iter()
            .any(|i| matches!(i.error, ConfigurationError::DuplicateMount { .. })));
    }

    #[test]
    fn test_port_zero_given_twice_keeps_first() {
        let localhost = VirtualHostConfig {
            root: Some(root_mount()),
            port_mounts: vec![
                PortMountConfig {
                    port: 0,
                    root: Some(root_mount()),
                },
                PortMountConfig { port: 8081, root: None },
            ],
            ..host("localhost")
        };
        let config = config_with(vec![localhost]);
        let hosts = Builder::new(&config).build(1).unwrap();
        let tree = hosts.tree();
        let host = &tree.hosts()[0];

        assert_eq!(tree.mounts().len(), 1);
        assert!(host.port_mount(0).unwrap().root_mount_id().is_some());
        assert!(host.port_mount(8081).unwrap().root_mount_id().is_none());
        let errors: Vec<_> = hosts
            .issues()
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .collect();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_invalid_cms_location_is_warning() {
        let mut config = config_with(vec![]);
        config.host_groups[0].cms_location = Some("not a url".into());
        let hosts = Builder::new(&config).policy(BuildPolicy::Strict).build(1).unwrap();
        assert_eq!(hosts.tree().host_groups()[0].cms_location(), None);
        assert_eq!(hosts.issues()[0].severity, Severity::Warning);
    }
}
