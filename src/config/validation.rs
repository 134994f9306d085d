//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (schemes, response codes, log formats)
//! - Catch names the host and mount trees cannot represent
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: HostsConfig → Result<(), Vec<ValidationError>>
//! - Structural problems inside the tree (duplicates, bad mount points)
//!   are reported by the build pass, which can skip just the subtree

use std::collections::HashSet;
use std::fmt;

use crate::config::schema::{HostsConfig, MountConfig, VirtualHostConfig};
use crate::hosting::properties::is_supported_response_code;

/// A single semantic problem in a configuration document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending value, e.g. `host_groups[0].name`.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &HostsConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let hosts = &config.hosts;
    if let Some(scheme) = hosts.scheme.as_deref() {
        if !scheme.is_empty() && scheme != "http" && scheme != "https" {
            errors.push(ValidationError::new("hosts.scheme", format!("unsupported scheme '{}'", scheme)));
        }
    }
    if !is_supported_response_code(hosts.scheme_not_matching_response_code) {
        errors.push(ValidationError::new(
            "hosts.scheme_not_matching_response_code",
            format!("unsupported response code {}", hosts.scheme_not_matching_response_code),
        ));
    }
    if let Some(default_host) = hosts.default_host_name.as_deref() {
        let malformed = default_host.trim().is_empty()
            || default_host.contains(|c: char| c == ':' || c == '/' || c.is_whitespace());
        if malformed {
            errors.push(ValidationError::new(
                "hosts.default_host_name",
                format!("'{}' is not a host name", default_host),
            ));
        }
    }

    let mut site_paths = HashSet::new();
    for (i, site) in config.sites.iter().enumerate() {
        if !site.path.starts_with('/') {
            errors.push(ValidationError::new(format!("sites[{}].path", i), "must be absolute"));
        }
        if !site_paths.insert(site.path.as_str()) {
            errors.push(ValidationError::new(
                format!("sites[{}].path", i),
                format!("duplicate site root '{}'", site.path),
            ));
        }
    }

    for (i, group) in config.host_groups.iter().enumerate() {
        let field = format!("host_groups[{}]", i);
        check_name(&format!("{}.name", field), &group.name, &mut errors);
        for (j, host) in group.hosts.iter().enumerate() {
            validate_host(&format!("{}.hosts[{}]", field, j), host, &mut errors);
        }
    }

    if config.admin.enabled && config.admin.api_key.trim().is_empty() {
        errors.push(ValidationError::new("admin.api_key", "must not be empty when admin is enabled"));
    }

    let format = config.observability.log_format.as_str();
    if format != "pretty" && format != "json" {
        errors.push(ValidationError::new(
            "observability.log_format",
            format!("expected 'pretty' or 'json', got '{}'", format),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_host(field: &str, host: &VirtualHostConfig, errors: &mut Vec<ValidationError>) {
    check_name(&format!("{}.name", field), &host.name, errors);
    if let Some(root) = &host.root {
        validate_mount(&format!("{}.root", field), root, errors);
    }
    for (i, port_mount) in host.port_mounts.iter().enumerate() {
        if let Some(root) = &port_mount.root {
            validate_mount(&format!("{}.port_mounts[{}].root", field, i), root, errors);
        }
    }
    for (i, child) in host.hosts.iter().enumerate() {
        validate_host(&format!("{}.hosts[{}]", field, i), child, errors);
    }
}

fn validate_mount(field: &str, mount: &MountConfig, errors: &mut Vec<ValidationError>) {
    check_name(&format!("{}.name", field), &mount.name, errors);
    for (i, child) in mount.mounts.iter().enumerate() {
        validate_mount(&format!("{}.mounts[{}]", field, i), child, errors);
    }
}

fn check_name(field: &str, name: &str, errors: &mut Vec<ValidationError>) {
    if name.trim().is_empty() {
        errors.push(ValidationError::new(field, "must not be empty"));
    } else if name.contains('/') {
        errors.push(ValidationError::new(field, format!("'{}' must not contain '/'", name)));
    }
}
