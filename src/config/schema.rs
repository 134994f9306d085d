//! Configuration schema definitions.
//!
//! This module defines the raw hosting configuration tree:
//! host groups → virtual hosts → (virtual hosts | port mounts) → mounts.
//! All types derive Serde traits for deserialization from TOML.
//!
//! Inheritable properties are `Option`s: an absent key means "not set
//! here, inherit from the enclosing node".

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Name given to a mount node that does not declare one.
pub const ROOT_MOUNT_NAME: &str = "hst:root";

/// Root of a hosting configuration document.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HostsConfig {
    /// Registry-wide defaults and settings.
    pub hosts: HostsSection,

    /// Site roots a mount point can target.
    pub sites: Vec<SiteRootConfig>,

    /// Host groups, consulted in declared order during resolution.
    pub host_groups: Vec<HostGroupConfig>,

    /// Admin / inspection API.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Registry-wide settings. These are the last step of every
/// inheritance chain.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HostsSection {
    /// Host tried when a request host matches nothing.
    pub default_host_name: Option<String>,

    pub scheme: Option<String>,
    pub locale: Option<String>,
    pub homepage: Option<String>,
    pub page_not_found: Option<String>,

    /// Whether generated URLs carry the context path.
    pub show_context_path: bool,

    /// Whether generated URLs carry the port.
    pub show_port: bool,

    /// Context path the webapp is reachable on. Root hosts use it as
    /// their `only_for_context_path` default.
    pub default_context_path: Option<String>,

    pub version_in_preview_header: bool,
    pub cacheable: bool,
    pub default_resource_bundle_id: Option<String>,
    pub scheme_not_matching_response_code: u16,

    /// Prefix of all URLs when accessed through the CMS.
    pub cms_preview_prefix: Option<String>,

    /// Host group the channel manager loads channels for.
    pub channel_manager_host_group: Option<String>,

    /// Sites node managed by the channel manager.
    pub channel_manager_sites: Option<String>,

    /// Request paths starting with one of these are not handled.
    pub prefix_exclusions: Vec<String>,

    /// Request paths ending with one of these are not handled.
    pub suffix_exclusions: Vec<String>,

    /// Maximum number of raw host strings kept in the resolution cache.
    pub max_cached_hosts: usize,
}

impl Default for HostsSection {
    fn default() -> Self {
        Self {
            default_host_name: None,
            scheme: None,
            locale: None,
            homepage: None,
            page_not_found: None,
            show_context_path: true,
            show_port: true,
            default_context_path: None,
            version_in_preview_header: true,
            cacheable: false,
            default_resource_bundle_id: None,
            scheme_not_matching_response_code: 301,
            cms_preview_prefix: None,
            channel_manager_host_group: None,
            channel_manager_sites: None,
            prefix_exclusions: Vec::new(),
            suffix_exclusions: Vec::new(),
            max_cached_hosts: 10_000,
        }
    }
}

/// A site root: the target of a mount point.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteRootConfig {
    /// Absolute path mount points refer to.
    pub path: String,

    /// Content the site renders.
    pub content_path: String,

    /// Location `content_path` mirrors, if it is a mirror.
    #[serde(default)]
    pub canonical_content_path: Option<String>,
}

/// A named partition of the virtual host forest.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostGroupConfig {
    pub name: String,

    /// Location of the CMS serving this group.
    #[serde(default)]
    pub cms_location: Option<String>,

    #[serde(default)]
    pub hosts: Vec<VirtualHostConfig>,
}

/// One virtual host node. `name` is a single DNS label, the `_default_`
/// wildcard, or an IP literal such as `127.0.0.1`.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct VirtualHostConfig {
    pub name: String,

    pub scheme: Option<String>,
    pub locale: Option<String>,
    pub homepage: Option<String>,
    pub page_not_found: Option<String>,
    pub show_context_path: Option<bool>,
    pub show_port: Option<bool>,
    pub only_for_context_path: Option<String>,
    pub version_in_preview_header: Option<bool>,
    pub cacheable: Option<bool>,
    pub default_resource_bundle_id: Option<String>,
    pub scheme_not_matching_response_code: Option<u16>,

    /// Port agnostic root mount (registered under port 0).
    pub root: Option<MountConfig>,

    pub port_mounts: Vec<PortMountConfig>,

    /// Child hosts, one label further from the top-level domain.
    pub hosts: Vec<VirtualHostConfig>,
}

/// Binds a port to a root mount.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PortMountConfig {
    /// 0 means "any port".
    pub port: u16,

    #[serde(default)]
    pub root: Option<MountConfig>,
}

/// One mount node.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MountConfig {
    pub name: String,
    pub identifier: Option<String>,
    pub alias: Option<String>,
    pub mount_point: Option<String>,

    pub show_context_path: Option<bool>,
    pub show_port: Option<bool>,
    pub only_for_context_path: Option<String>,
    pub scheme: Option<String>,
    pub scheme_not_matching_response_code: Option<u16>,
    pub homepage: Option<String>,
    pub locale: Option<String>,
    pub page_not_found: Option<String>,
    pub version_in_preview_header: Option<bool>,

    /// Primary type, `live` when never set along the chain.
    #[serde(rename = "type")]
    pub mount_type: Option<String>,
    pub types: Option<Vec<String>>,

    pub is_mapped: Option<bool>,
    pub is_site: Option<bool>,
    pub named_pipeline: Option<String>,
    pub embedded_mount_path: Option<String>,
    pub authenticated: Option<bool>,
    pub roles: Option<Vec<String>>,
    pub users: Option<Vec<String>>,
    pub subject_based_session: Option<bool>,
    pub session_stateful: Option<bool>,
    pub form_login_page: Option<String>,
    pub cacheable: Option<bool>,
    pub default_resource_bundle_id: Option<String>,
    pub default_sitemap_item_handler_ids: Option<Vec<String>>,

    /// Free-form mount properties.
    pub properties: BTreeMap<String, String>,

    pub mounts: Vec<MountConfig>,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            name: ROOT_MOUNT_NAME.to_string(),
            identifier: None,
            alias: None,
            mount_point: None,
            show_context_path: None,
            show_port: None,
            only_for_context_path: None,
            scheme: None,
            scheme_not_matching_response_code: None,
            homepage: None,
            locale: None,
            page_not_found: None,
            version_in_preview_header: None,
            mount_type: None,
            types: None,
            is_mapped: None,
            is_site: None,
            named_pipeline: None,
            embedded_mount_path: None,
            authenticated: None,
            roles: None,
            users: None,
            subject_based_session: None,
            session_stateful: None,
            form_login_page: None,
            cacheable: None,
            default_resource_bundle_id: None,
            default_sitemap_item_handler_ids: None,
            properties: BTreeMap::new(),
            mounts: Vec::new(),
        }
    }
}

impl MountConfig {
    /// A mount node with the given name and nothing else set.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Admin dashboard configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
            request_timeout_secs: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// `pretty` or `json`.
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_document() {
        let doc = r#"
            [hosts]
            default_host_name = "localhost"
            locale = "en_US"

            [[sites]]
            path = "/sites/example"
            content_path = "/content/example"

            [[host_groups]]
            name = "prod"

            [[host_groups.hosts]]
            name = "com"

            [[host_groups.hosts.hosts]]
            name = "example"
            show_port = false

            [host_groups.hosts.hosts.root]
            mount_point = "/sites/example"
            type = "live"

            [[host_groups.hosts.hosts.root.mounts]]
            name = "subsite"
            locale = "nl_NL"

            [[host_groups.hosts.hosts.port_mounts]]
            port = 8443
        "#;

        let config: HostsConfig = toml::from_str(doc).unwrap();
        assert_eq!(config.hosts.default_host_name.as_deref(), Some("localhost"));
        assert!(config.hosts.show_context_path);
        assert_eq!(config.hosts.max_cached_hosts, 10_000);

        let example = &config.host_groups[0].hosts[0].hosts[0];
        assert_eq!(example.name, "example");
        assert_eq!(example.show_port, Some(false));
        assert_eq!(example.show_context_path, None);

        let root = example.root.as_ref().unwrap();
        assert_eq!(root.name, ROOT_MOUNT_NAME);
        assert_eq!(root.mount_type.as_deref(), Some("live"));
        assert_eq!(root.mounts[0].name, "subsite");
        assert_eq!(root.mounts[0].locale.as_deref(), Some("nl_NL"));

        assert_eq!(example.port_mounts[0].port, 8443);
        assert!(example.port_mounts[0].root.is_none());
    }

    #[test]
    fn test_defaults() {
        let config = HostsConfig::default();
        assert!(config.host_groups.is_empty());
        assert!(!config.admin.enabled);
        assert_eq!(config.hosts.scheme_not_matching_response_code, 301);
        assert!(config.hosts.version_in_preview_header);
        assert_eq!(config.observability.log_format, "pretty");
    }
}
