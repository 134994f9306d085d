//! Results of matching a request against the hosting tree.
//!
//! A [`ResolvedVirtualHost`] keeps the tree alive through its own `Arc`,
//! so a cached resolution never points back at the registry that caches it.

use std::sync::Arc;

use serde::Serialize;

use crate::hosting::mount::Mount;
use crate::hosting::port_mount::{PortMount, ANY_PORT};
use crate::hosting::tree::{HostId, HostingTree, MountId};
use crate::hosting::virtual_host::VirtualHost;

/// A virtual host and the port mount a request host matched.
#[derive(Debug)]
pub struct ResolvedVirtualHost {
    tree: Arc<HostingTree>,
    host: HostId,
    resolved_host_name: String,
    port: u16,
    port_mount: u16,
}

impl ResolvedVirtualHost {
    pub(crate) fn new(
        tree: Arc<HostingTree>,
        host: HostId,
        resolved_host_name: String,
        port: u16,
        port_mount: u16,
    ) -> Self {
        Self {
            tree,
            host,
            resolved_host_name,
            port,
            port_mount,
        }
    }

    pub fn virtual_host(&self) -> &VirtualHost {
        self.tree.host(self.host)
    }

    /// The request host name, port stripped and normalized.
    pub fn resolved_host_name(&self) -> &str {
        &self.resolved_host_name
    }

    /// Port of the request; 0 when none was given.
    pub fn port_number(&self) -> u16 {
        self.port
    }

    /// The matched port mount; the port 0 entry when the request port
    /// had none of its own.
    pub fn port_mount(&self) -> PortMount {
        let host = self.virtual_host();
        host.port_mount(self.port_mount)
            .or_else(|| host.port_mount(ANY_PORT))
            .copied()
            .unwrap_or_else(|| PortMount::new(self.port_mount, None))
    }

    pub fn tree(&self) -> &Arc<HostingTree> {
        &self.tree
    }

    /// Find the deepest mount for a request path.
    ///
    /// Descends the mount tree by path segment from the root mount. An
    /// empty context path means `/`. A mount restricted to another
    /// context path hands over to its parent.
    pub fn match_mount(self: &Arc<Self>, context_path: Option<&str>, request_path: &str) -> Option<ResolvedMount> {
        let host_name = self.virtual_host().host_name();
        let Some(mut mount) = self.port_mount().root_mount_id() else {
            tracing::warn!(host = %host_name, port = self.port, "Virtual host has no root mount for this port");
            return None;
        };

        let path = request_path.trim_matches('/');
        if !path.is_empty() {
            for segment in path.split('/') {
                match self.tree.mount(mount).child_mount_id(segment) {
                    Some(child) => mount = child,
                    None => break,
                }
            }
        }

        let context_path = context_path.map(|c| if c.is_empty() { "/" } else { c });
        let mut candidate = Some(mount);
        if let Some(context_path) = context_path {
            while let Some(id) = candidate {
                let current = self.tree.mount(id);
                match current.only_for_context_path() {
                    Some(only) if only != context_path => {
                        tracing::debug!(
                            mount = %current.mount_path(),
                            only_for_context_path = only,
                            context_path,
                            "Mount not valid for context path; trying its parent"
                        );
                        candidate = current.parent_id();
                    }
                    _ => break,
                }
            }
        }

        let Some(mount) = candidate else {
            tracing::warn!(host = %host_name, port = self.port, "No mount valid for the request context path");
            return None;
        };

        let resolved_mount_path = self.tree.mount(mount).mount_path().to_string();
        tracing::debug!(host = %host_name, mount_path = %resolved_mount_path, "Mount resolved");
        Some(ResolvedMount {
            host: Arc::clone(self),
            mount,
            resolved_mount_path,
        })
    }
}

/// A mount matched for a request path, with the host it was found on.
#[derive(Debug, Clone)]
pub struct ResolvedMount {
    host: Arc<ResolvedVirtualHost>,
    mount: MountId,
    resolved_mount_path: String,
}

impl ResolvedMount {
    pub fn mount(&self) -> &Mount {
        self.host.tree.mount(self.mount)
    }

    pub fn resolved_virtual_host(&self) -> &Arc<ResolvedVirtualHost> {
        &self.host
    }

    /// Path prefix of the request that belongs to the mount.
    pub fn resolved_mount_path(&self) -> &str {
        &self.resolved_mount_path
    }

    /// Flat view for JSON output.
    pub fn summary(&self) -> ResolvedMountSummary {
        let mount = self.mount();
        let host = self.host.virtual_host();
        ResolvedMountSummary {
            host_name: host.host_name().to_string(),
            host_group: host.host_group_name().to_string(),
            resolved_host_name: self.host.resolved_host_name().to_string(),
            port: self.host.port_number(),
            port_mount: self.host.port_mount().port_number(),
            identifier: mount.identifier().to_string(),
            name: mount.name().to_string(),
            alias: mount.alias().map(str::to_string),
            mount_path: self.resolved_mount_path.clone(),
            mount_point: mount.mount_point().map(str::to_string),
            types: mount.types().into_iter().map(str::to_string).collect(),
            locale: mount.locale().map(str::to_string),
            scheme: mount.scheme().to_string(),
            content_path: mount.content_path().map(str::to_string),
            named_pipeline: mount.named_pipeline().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedMountSummary {
    pub host_name: String,
    pub host_group: String,
    pub resolved_host_name: String,
    pub port: u16,
    pub port_mount: u16,
    pub identifier: String,
    pub name: String,
    pub alias: Option<String>,
    pub mount_path: String,
    pub mount_point: Option<String>,
    pub types: Vec<String>,
    pub locale: Option<String>,
    pub scheme: String,
    pub content_path: Option<String>,
    pub named_pipeline: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{HostGroupConfig, HostsConfig, MountConfig, VirtualHostConfig};
    use crate::hosting::Builder;

    fn hosts() -> crate::hosting::VirtualHosts {
        let root = MountConfig {
            is_mapped: Some(false),
            mounts: vec![
                MountConfig {
                    mounts: vec![MountConfig::named("deep")],
                    ..MountConfig::named("subsite")
                },
                MountConfig {
                    only_for_context_path: Some("/cms".into()),
                    ..MountConfig::named("cmsonly")
                },
            ],
            ..MountConfig::default()
        };
        let config = HostsConfig {
            host_groups: vec![HostGroupConfig {
                name: "dev".into(),
                cms_location: None,
                hosts: vec![VirtualHostConfig {
                    name: "localhost".into(),
                    root: Some(root),
                    ..Default::default()
                }],
            }],
            ..HostsConfig::default()
        };
        Builder::new(&config).build(1).unwrap()
    }

    #[test]
    fn test_match_mount_descends_by_segment() {
        let hosts = hosts();
        let host = hosts.match_virtual_host("localhost:8080").unwrap().unwrap();
        assert_eq!(host.port_mount().port_number(), 0);

        let resolved = host.match_mount(Some(""), "/subsite/deep/news/").unwrap();
        assert_eq!(resolved.mount().name(), "deep");
        assert_eq!(resolved.resolved_mount_path(), "/subsite/deep");

        let root = host.match_mount(None, "/unknown").unwrap();
        assert_eq!(root.resolved_mount_path(), "");
        assert!(root.mount().is_root());
    }

    #[test]
    fn test_only_for_context_path_falls_back_to_parent() {
        let hosts = hosts();
        let host = hosts.match_virtual_host("localhost").unwrap().unwrap();

        let site = host.match_mount(Some("/site"), "/cmsonly/page").unwrap();
        assert_eq!(site.resolved_mount_path(), "");

        let cms = host.match_mount(Some("/cms"), "/cmsonly/page").unwrap();
        assert_eq!(cms.resolved_mount_path(), "/cmsonly");

        let unchecked = host.match_mount(None, "/cmsonly").unwrap();
        assert_eq!(unchecked.mount().name(), "cmsonly");
    }
}
