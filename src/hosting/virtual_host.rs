//! Virtual host nodes.
//!
//! # Responsibilities
//! - Represent one label of a reversed host name tree
//!   (`com` → `example` → `www`)
//! - Hold the resolved host properties
//! - Hold the port → [`PortMount`] table
//!
//! # Design Decisions
//! - Children are referenced by [`HostId`] into the owning
//!   [`HostingTree`](crate::hosting::HostingTree); navigation goes through the tree
//! - A node is only mutated while its tree is being built

use std::collections::HashMap;

use crate::hosting::error::ConfigurationError;
use crate::hosting::port_mount::PortMount;
use crate::hosting::properties::HostProperties;
use crate::hosting::tree::HostId;

/// Label matching any label at its position, and every label after it.
pub const WILDCARD: &str = "_default_";

/// One node of the virtual host tree.
#[derive(Debug, Clone)]
pub struct VirtualHost {
    pub(crate) id: HostId,
    pub(crate) name: String,
    pub(crate) host_name: String,
    pub(crate) host_group: String,
    pub(crate) cms_location: Option<String>,
    pub(crate) parent: Option<HostId>,
    pub(crate) children: HashMap<String, HostId>,
    pub(crate) port_mounts: HashMap<u16, PortMount>,
    pub(crate) properties: HostProperties,
}

impl VirtualHost {
    /// Create a detached node. `parent_host_name` is the fully qualified
    /// name of the node it will be attached under.
    pub fn new(
        name: &str,
        parent_host_name: Option<&str>,
        host_group: &str,
        cms_location: Option<String>,
        properties: HostProperties,
    ) -> Self {
        let name = name.to_lowercase();
        let host_name = match parent_host_name {
            Some(parent) => format!("{}.{}", name, parent),
            None => name.clone(),
        };
        Self {
            id: HostId(usize::MAX),
            name,
            host_name,
            host_group: host_group.to_string(),
            cms_location,
            parent: None,
            children: HashMap::new(),
            port_mounts: HashMap::new(),
            properties,
        }
    }

    pub fn id(&self) -> HostId {
        self.id
    }

    /// The label of this node.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// This label followed by every ancestor label, joined by `.`.
    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    pub fn host_group_name(&self) -> &str {
        &self.host_group
    }

    pub fn cms_location(&self) -> Option<&str> {
        self.cms_location.as_deref()
    }

    pub fn parent_id(&self) -> Option<HostId> {
        self.parent
    }

    pub fn properties(&self) -> &HostProperties {
        &self.properties
    }

    pub fn scheme(&self) -> &str {
        &self.properties.scheme
    }

    pub fn locale(&self) -> Option<&str> {
        self.properties.locale.as_deref()
    }

    pub fn is_wildcard(&self) -> bool {
        self.name == WILDCARD
    }

    /// Child node for an exact label.
    pub fn child_host_id(&self, label: &str) -> Option<HostId> {
        self.children.get(label).copied()
    }

    pub fn child_names(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    /// The port mount registered for exactly this port.
    pub fn port_mount(&self, port: u16) -> Option<&PortMount> {
        self.port_mounts.get(&port)
    }

    pub fn port_mounts(&self) -> impl Iterator<Item = &PortMount> {
        self.port_mounts.values()
    }
}

/// Split a configured host node name into labels, most significant last.
///
/// Only IP literals may contain dots; any other dotted name must be
/// configured as a hierarchy of nodes. Returns `None` for an undotted name.
pub fn split_ip_literal(name: &str) -> Result<Option<Vec<&str>>, ConfigurationError> {
    if !name.contains('.') {
        return Ok(None);
    }
    let segments: Vec<&str> = name.split('.').collect();
    if segments.iter().all(|s| s.parse::<u8>().is_ok()) {
        Ok(Some(segments))
    } else {
        Err(ConfigurationError::DottedHostName {
            name: name.to_string(),
        })
    }
}
