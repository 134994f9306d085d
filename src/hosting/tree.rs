//! Arena holding every host group, virtual host and mount of one
//! configuration generation.
//!
//! # Responsibilities
//! - Own all nodes; nodes refer to each other by [`HostId`] / [`MountId`]
//! - Enforce sibling uniqueness while the tree is built
//! - Walk a request host name down a host group's forest
//!
//! # Design Decisions
//! - Indices instead of `Rc`/`Weak` parent links: the finished tree is
//!   plain data, `Send + Sync`, and shared behind one `Arc`
//! - Host groups keep their declared order; lookups consult them in that
//!   order
//! - Every `add_*` either links the node or returns an error and leaves
//!   the tree untouched

use std::collections::HashMap;

use crate::hosting::error::ConfigurationError;
use crate::hosting::mount::Mount;
use crate::hosting::port_mount::PortMount;
use crate::hosting::virtual_host::{VirtualHost, WILDCARD};

/// Index of a [`VirtualHost`] in its [`HostingTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostId(pub(crate) usize);

/// Index of a [`Mount`] in its [`HostingTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MountId(pub(crate) usize);

/// A named partition owning its own virtual host forest.
#[derive(Debug, Clone)]
pub struct HostGroup {
    name: String,
    cms_location: Option<String>,
    roots: HashMap<String, HostId>,
}

impl HostGroup {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cms_location(&self) -> Option<&str> {
        self.cms_location.as_deref()
    }

    /// Root virtual host for the most significant label.
    pub fn root_host_id(&self, label: &str) -> Option<HostId> {
        self.roots.get(label).copied()
    }

    pub fn root_host_ids(&self) -> impl Iterator<Item = HostId> + '_ {
        self.roots.values().copied()
    }
}

#[derive(Debug, Clone, Default)]
pub struct HostingTree {
    groups: Vec<HostGroup>,
    hosts: Vec<VirtualHost>,
    mounts: Vec<Mount>,
}

impl HostingTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(&self, id: HostId) -> &VirtualHost {
        &self.hosts[id.0]
    }

    pub fn mount(&self, id: MountId) -> &Mount {
        &self.mounts[id.0]
    }

    /// Host groups in declared order.
    pub fn host_groups(&self) -> &[HostGroup] {
        &self.groups
    }

    pub fn host_group(&self, name: &str) -> Option<&HostGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn hosts(&self) -> &[VirtualHost] {
        &self.hosts
    }

    pub fn mounts(&self) -> &[Mount] {
        &self.mounts
    }

    pub fn child_host(&self, host: HostId, label: &str) -> Option<&VirtualHost> {
        self.host(host).child_host_id(label).map(|id| self.host(id))
    }

    pub fn parent_host(&self, host: HostId) -> Option<&VirtualHost> {
        self.host(host).parent_id().map(|id| self.host(id))
    }

    pub fn child_mount(&self, mount: MountId, name: &str) -> Option<&Mount> {
        self.mount(mount).child_mount_id(name).map(|id| self.mount(id))
    }

    pub fn parent_mount(&self, mount: MountId) -> Option<&Mount> {
        self.mount(mount).parent_id().map(|id| self.mount(id))
    }

    /// Root mount of a port mount, if it has one.
    pub fn root_mount(&self, port_mount: &PortMount) -> Option<&Mount> {
        port_mount.root_mount_id().map(|id| self.mount(id))
    }

    pub(crate) fn add_host_group(
        &mut self,
        name: &str,
        cms_location: Option<String>,
    ) -> Result<usize, ConfigurationError> {
        if self.host_group(name).is_some() {
            return Err(ConfigurationError::DuplicateHostGroup(name.to_string()));
        }
        self.groups.push(HostGroup {
            name: name.to_string(),
            cms_location,
            roots: HashMap::new(),
        });
        Ok(self.groups.len() - 1)
    }

    pub(crate) fn add_root_host(
        &mut self,
        group: usize,
        mut host: VirtualHost,
    ) -> Result<HostId, ConfigurationError> {
        if self.groups[group].roots.contains_key(host.name()) {
            return Err(ConfigurationError::DuplicateHost {
                group: self.groups[group].name.clone(),
                host_name: host.host_name().to_string(),
            });
        }
        let id = HostId(self.hosts.len());
        host.id = id;
        self.groups[group].roots.insert(host.name.clone(), id);
        self.hosts.push(host);
        Ok(id)
    }

    pub(crate) fn add_child_host(
        &mut self,
        parent: HostId,
        mut host: VirtualHost,
    ) -> Result<HostId, ConfigurationError> {
        if self.host(parent).children.contains_key(host.name()) {
            return Err(ConfigurationError::DuplicateHost {
                group: host.host_group.clone(),
                host_name: host.host_name().to_string(),
            });
        }
        let id = HostId(self.hosts.len());
        host.id = id;
        host.parent = Some(parent);
        self.hosts[parent.0].children.insert(host.name.clone(), id);
        self.hosts.push(host);
        Ok(id)
    }

    pub(crate) fn add_port_mount(
        &mut self,
        host: HostId,
        port_mount: PortMount,
    ) -> Result<(), ConfigurationError> {
        let vhost = &mut self.hosts[host.0];
        if vhost.port_mounts.contains_key(&port_mount.port) {
            return Err(ConfigurationError::DuplicatePortMount {
                host_name: vhost.host_name.clone(),
                port: port_mount.port,
            });
        }
        vhost.port_mounts.insert(port_mount.port, port_mount);
        Ok(())
    }

    pub(crate) fn has_port_mount(&self, host: HostId, port: u16) -> bool {
        self.host(host).port_mount(port).is_some()
    }

    /// Attach a built mount below `parent`, or as a detached root.
    pub(crate) fn add_mount(
        &mut self,
        parent: Option<MountId>,
        mut mount: Mount,
    ) -> Result<MountId, ConfigurationError> {
        if let Some(parent) = parent {
            if self.mount(parent).children.contains_key(mount.name()) {
                return Err(ConfigurationError::DuplicateMount {
                    parent: self.mount(parent).mount_path().to_string(),
                    name: mount.name.clone(),
                });
            }
        }
        let id = MountId(self.mounts.len());
        mount.id = id;
        mount.parent = parent;
        if let Some(parent) = parent {
            self.mounts[parent.0].children.insert(mount.name.clone(), id);
        }
        self.mounts.push(mount);
        Ok(id)
    }

    /// Find the virtual host for a port-stripped, dot-split host name.
    ///
    /// `labels` is in request order (`["www", "example", "com"]`); the
    /// walk starts at the last label, which must match a root exactly.
    pub fn find_host(&self, group: &HostGroup, labels: &[&str]) -> Option<HostId> {
        let (last, rest) = labels.split_last()?;
        let root = group.root_host_id(last)?;
        self.traverse_into_host(root, rest)
    }

    /// Descend from `current` consuming `remaining` from the end.
    ///
    /// An exact child is preferred. Without one the wildcard child is
    /// taken and ends the walk, absorbing every remaining label.
    fn traverse_into_host(&self, current: HostId, remaining: &[&str]) -> Option<HostId> {
        let Some((next, rest)) = remaining.split_last() else {
            return Some(current);
        };
        let host = self.host(current);
        match host.child_host_id(next) {
            Some(child) => self.traverse_into_host(child, rest),
            None => host.child_host_id(WILDCARD),
        }
    }
}
