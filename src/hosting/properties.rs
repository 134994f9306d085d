//! Inherited host and mount properties.
//!
//! # Inheritance chain
//! ```text
//! [hosts] defaults → root virtual host → child virtual host → …
//!                                   └→ root mount → child mount → …
//! ```
//! Every node resolves its properties once, at construction, by
//! overlaying its own configured values on the already resolved values
//! of its parent. Reads never walk the chain.
//!
//! Mount properties that have no virtual host counterpart start from
//! fixed defaults (`type = live`, `is_mapped = true`, `is_site = true`).

use std::collections::BTreeSet;

use serde::Serialize;

use crate::config::schema::{HostsSection, MountConfig, VirtualHostConfig};
use crate::hosting::error::ConfigurationError;

pub const DEFAULT_SCHEME: &str = "http";
pub const LIVE_TYPE: &str = "live";
pub const PREVIEW_TYPE: &str = "preview";

/// Response codes a mount may answer with when the request scheme does
/// not match its configured scheme.
pub const SUPPORTED_SCHEME_NOT_MATCHING_RESPONSE_CODES: [u16; 7] = [200, 301, 302, 303, 307, 403, 404];

/// Properties of a virtual host, fully resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostProperties {
    pub scheme: String,
    pub locale: Option<String>,
    pub homepage: Option<String>,
    pub page_not_found: Option<String>,
    pub context_path_in_url: bool,
    pub port_in_url: bool,
    pub only_for_context_path: Option<String>,
    pub version_in_preview_header: bool,
    pub cacheable: bool,
    pub default_resource_bundle_id: Option<String>,
    pub scheme_not_matching_response_code: u16,
}

impl HostProperties {
    /// Registry-wide defaults; the "parent" of every root virtual host.
    pub fn from_defaults(section: &HostsSection, warnings: &mut Vec<ConfigurationError>) -> Self {
        let scheme_not_matching_response_code =
            if is_supported_response_code(section.scheme_not_matching_response_code) {
                section.scheme_not_matching_response_code
            } else {
                warnings.push(ConfigurationError::UnsupportedResponseCode {
                    code: section.scheme_not_matching_response_code,
                });
                301
            };

        Self {
            scheme: scheme_or_default(section.scheme.as_deref()),
            locale: section.locale.clone(),
            homepage: section.homepage.clone(),
            page_not_found: section.page_not_found.clone(),
            context_path_in_url: section.show_context_path,
            port_in_url: section.show_port,
            only_for_context_path: checked_context_path(section.default_context_path.as_deref(), warnings),
            version_in_preview_header: section.version_in_preview_header,
            cacheable: section.cacheable,
            default_resource_bundle_id: section.default_resource_bundle_id.clone(),
            scheme_not_matching_response_code,
        }
    }

    /// Overlay the values configured on `config` on top of `self`.
    pub fn inherit(&self, config: &VirtualHostConfig, warnings: &mut Vec<ConfigurationError>) -> Self {
        let only_for_context_path = match config.only_for_context_path.as_deref() {
            Some(own) => checked_context_path(Some(own), warnings),
            None => self.only_for_context_path.clone(),
        };

        Self {
            scheme: match config.scheme.as_deref() {
                Some(own) => scheme_or_default(Some(own)),
                None => self.scheme.clone(),
            },
            locale: pick(&config.locale, &self.locale),
            homepage: pick(&config.homepage, &self.homepage),
            page_not_found: pick(&config.page_not_found, &self.page_not_found),
            context_path_in_url: config.show_context_path.unwrap_or(self.context_path_in_url),
            port_in_url: config.show_port.unwrap_or(self.port_in_url),
            only_for_context_path,
            version_in_preview_header: config
                .version_in_preview_header
                .unwrap_or(self.version_in_preview_header),
            cacheable: config.cacheable.unwrap_or(self.cacheable),
            default_resource_bundle_id: pick(
                &config.default_resource_bundle_id,
                &self.default_resource_bundle_id,
            ),
            scheme_not_matching_response_code: pick_response_code(
                config.scheme_not_matching_response_code,
                self.scheme_not_matching_response_code,
                warnings,
            ),
        }
    }
}

/// Properties of a mount, fully resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountProperties {
    pub context_path_in_url: bool,
    pub port_in_url: bool,
    pub only_for_context_path: Option<String>,
    pub scheme: String,
    pub scheme_not_matching_response_code: u16,
    pub homepage: Option<String>,
    pub locale: Option<String>,
    pub page_not_found: Option<String>,
    pub version_in_preview_header: bool,
    pub mount_type: String,
    /// Additional types as configured; may repeat `mount_type`.
    pub extra_types: Vec<String>,
    pub is_mapped: bool,
    pub is_site: bool,
    pub named_pipeline: Option<String>,
    pub embedded_mount_path: Option<String>,
    pub mount_point: Option<String>,
    pub authenticated: bool,
    pub roles: BTreeSet<String>,
    pub users: BTreeSet<String>,
    pub subject_based_session: bool,
    pub session_stateful: bool,
    pub form_login_page: Option<String>,
    pub cacheable: bool,
    pub default_resource_bundle_id: Option<String>,
    pub default_sitemap_item_handler_ids: Vec<String>,
}

impl MountProperties {
    /// Starting point for a root mount of a host with `host` properties.
    pub fn from_host(host: &HostProperties) -> Self {
        Self {
            context_path_in_url: host.context_path_in_url,
            port_in_url: host.port_in_url,
            only_for_context_path: host.only_for_context_path.clone(),
            scheme: host.scheme.clone(),
            scheme_not_matching_response_code: host.scheme_not_matching_response_code,
            homepage: host.homepage.clone(),
            locale: host.locale.clone(),
            page_not_found: host.page_not_found.clone(),
            version_in_preview_header: host.version_in_preview_header,
            mount_type: LIVE_TYPE.to_string(),
            extra_types: Vec::new(),
            is_mapped: true,
            is_site: true,
            named_pipeline: None,
            embedded_mount_path: None,
            mount_point: None,
            authenticated: false,
            roles: BTreeSet::new(),
            users: BTreeSet::new(),
            subject_based_session: false,
            session_stateful: false,
            form_login_page: None,
            cacheable: host.cacheable,
            default_resource_bundle_id: host.default_resource_bundle_id.clone(),
            default_sitemap_item_handler_ids: Vec::new(),
        }
    }

    /// Overlay the values configured on `config` on top of `self`.
    pub fn inherit(&self, config: &MountConfig, warnings: &mut Vec<ConfigurationError>) -> Self {
        let only_for_context_path = match config.only_for_context_path.as_deref() {
            Some(own) => checked_context_path(Some(own), warnings),
            None => self.only_for_context_path.clone(),
        };

        // A blank scheme on a mount means "inherit".
        let scheme = match config.scheme.as_deref().map(str::trim) {
            Some(own) if !own.is_empty() => own.to_string(),
            _ => self.scheme.clone(),
        };

        // An explicitly empty mount point clears the inherited one.
        let mount_point = match config.mount_point.as_deref() {
            Some("") => None,
            Some(own) => Some(own.to_string()),
            None => self.mount_point.clone(),
        };

        Self {
            context_path_in_url: config.show_context_path.unwrap_or(self.context_path_in_url),
            port_in_url: config.show_port.unwrap_or(self.port_in_url),
            only_for_context_path,
            scheme,
            scheme_not_matching_response_code: pick_response_code(
                config.scheme_not_matching_response_code,
                self.scheme_not_matching_response_code,
                warnings,
            ),
            homepage: pick(&config.homepage, &self.homepage),
            locale: pick(&config.locale, &self.locale),
            page_not_found: pick(&config.page_not_found, &self.page_not_found),
            version_in_preview_header: config
                .version_in_preview_header
                .unwrap_or(self.version_in_preview_header),
            mount_type: config
                .mount_type
                .clone()
                .unwrap_or_else(|| self.mount_type.clone()),
            extra_types: config
                .types
                .clone()
                .unwrap_or_else(|| self.extra_types.clone()),
            is_mapped: config.is_mapped.unwrap_or(self.is_mapped),
            is_site: config.is_site.unwrap_or(self.is_site),
            named_pipeline: pick(&config.named_pipeline, &self.named_pipeline),
            embedded_mount_path: pick(&config.embedded_mount_path, &self.embedded_mount_path),
            mount_point,
            authenticated: config.authenticated.unwrap_or(self.authenticated),
            roles: pick_set(&config.roles, &self.roles),
            users: pick_set(&config.users, &self.users),
            subject_based_session: config.subject_based_session.unwrap_or(self.subject_based_session),
            session_stateful: config.session_stateful.unwrap_or(self.session_stateful),
            form_login_page: pick(&config.form_login_page, &self.form_login_page),
            cacheable: config.cacheable.unwrap_or(self.cacheable),
            default_resource_bundle_id: pick(
                &config.default_resource_bundle_id,
                &self.default_resource_bundle_id,
            ),
            default_sitemap_item_handler_ids: config
                .default_sitemap_item_handler_ids
                .clone()
                .unwrap_or_else(|| self.default_sitemap_item_handler_ids.clone()),
        }
    }

    /// Primary type first, then the additional types without repeating it.
    pub fn types(&self) -> Vec<&str> {
        let mut combined = vec![self.mount_type.as_str()];
        for extra in &self.extra_types {
            if !combined.contains(&extra.as_str()) {
                combined.push(extra.as_str());
            }
        }
        combined
    }
}

pub fn is_supported_response_code(code: u16) -> bool {
    SUPPORTED_SCHEME_NOT_MATCHING_RESPONSE_CODES.contains(&code)
}

/// `/segment` is the only accepted shape for a context path.
pub fn is_valid_context_path(value: &str) -> bool {
    match value.strip_prefix('/') {
        Some(rest) => !rest.contains('/'),
        None => false,
    }
}

fn pick(own: &Option<String>, inherited: &Option<String>) -> Option<String> {
    own.as_ref().or(inherited.as_ref()).cloned()
}

fn pick_set(own: &Option<Vec<String>>, inherited: &BTreeSet<String>) -> BTreeSet<String> {
    match own {
        Some(values) => values.iter().cloned().collect(),
        None => inherited.clone(),
    }
}

fn pick_response_code(own: Option<u16>, inherited: u16, warnings: &mut Vec<ConfigurationError>) -> u16 {
    match own {
        Some(code) if is_supported_response_code(code) => code,
        Some(code) => {
            warnings.push(ConfigurationError::UnsupportedResponseCode { code });
            inherited
        }
        None => inherited,
    }
}

fn scheme_or_default(scheme: Option<&str>) -> String {
    match scheme.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => DEFAULT_SCHEME.to_string(),
    }
}

/// Empty means unset; malformed values are dropped with a warning.
fn checked_context_path(value: Option<&str>, warnings: &mut Vec<ConfigurationError>) -> Option<String> {
    match value {
        None | Some("") => None,
        Some(v) if is_valid_context_path(v) => Some(v.to_string()),
        Some(v) => {
            warnings.push(ConfigurationError::MalformedContextPath { value: v.to_string() });
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> HostProperties {
        let section = HostsSection {
            locale: Some("en_US".into()),
            ..HostsSection::default()
        };
        HostProperties::from_defaults(&section, &mut Vec::new())
    }

    #[test]
    fn test_host_inherits_unset_values() {
        let parent = defaults();
        let config = VirtualHostConfig {
            name: "com".into(),
            show_port: Some(false),
            ..Default::default()
        };
        let mut warnings = Vec::new();
        let child = parent.inherit(&config, &mut warnings);

        assert!(warnings.is_empty());
        assert_eq!(child.scheme, "http");
        assert_eq!(child.locale.as_deref(), Some("en_US"));
        assert!(!child.port_in_url);
        assert!(child.context_path_in_url);
    }

    #[test]
    fn test_empty_host_scheme_means_http() {
        let mut parent = defaults();
        parent.scheme = "https".into();
        let config = VirtualHostConfig {
            scheme: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(parent.inherit(&config, &mut Vec::new()).scheme, "http");
    }

    #[test]
    fn test_mount_chain_locale() {
        let root = MountProperties::from_host(&defaults());
        let subsite_config = MountConfig {
            locale: Some("nl_NL".into()),
            ..MountConfig::named("subsite")
        };
        let subsite = root.inherit(&subsite_config, &mut Vec::new());
        let deep = subsite.inherit(&MountConfig::named("deep"), &mut Vec::new());

        assert_eq!(root.locale.as_deref(), Some("en_US"));
        assert_eq!(subsite.locale.as_deref(), Some("nl_NL"));
        assert_eq!(deep.locale.as_deref(), Some("nl_NL"));
        assert_eq!(deep.mount_type, LIVE_TYPE);
        assert!(deep.is_mapped);
    }

    #[test]
    fn test_malformed_context_path_is_dropped() {
        let root = MountProperties::from_host(&defaults());
        let config = MountConfig {
            only_for_context_path: Some("/a/b".into()),
            ..MountConfig::named("x")
        };
        let mut warnings = Vec::new();
        let props = root.inherit(&config, &mut warnings);
        assert_eq!(props.only_for_context_path, None);
        assert_eq!(warnings.len(), 1);

        assert!(is_valid_context_path("/site"));
        assert!(!is_valid_context_path("site"));
    }

    #[test]
    fn test_unsupported_response_code_inherits() {
        let root = MountProperties::from_host(&defaults());
        let config = MountConfig {
            scheme_not_matching_response_code: Some(500),
            ..MountConfig::named("x")
        };
        let mut warnings = Vec::new();
        let props = root.inherit(&config, &mut warnings);
        assert_eq!(props.scheme_not_matching_response_code, 301);
        assert!(matches!(
            warnings[0],
            ConfigurationError::UnsupportedResponseCode { code: 500 }
        ));
    }

    #[test]
    fn test_types_put_primary_first() {
        let mut props = MountProperties::from_host(&defaults());
        props.mount_type = "preview".into();
        props.extra_types = vec!["composer".into(), "preview".into()];
        assert_eq!(props.types(), vec!["preview", "composer"]);
    }

    #[test]
    fn test_blank_mount_scheme_inherits() {
        let mut host = defaults();
        host.scheme = "https".into();
        let root = MountProperties::from_host(&host);
        let config = MountConfig {
            scheme: Some("  ".into()),
            ..MountConfig::named("x")
        };
        assert_eq!(root.inherit(&config, &mut Vec::new()).scheme, "https");
    }
}
