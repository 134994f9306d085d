//! Error taxonomy for the hosting model.
//!
//! Three categories are kept apart:
//! - configuration problems found while building a registry
//!   ([`ConfigurationError`], collected as [`ConfigurationIssue`]s),
//! - malformed match input or a missing registry ([`MatchError`]),
//! - editorial lock conflicts ([`LockError`]).
//!
//! A resolution miss is none of these: it is an `Ok(None)`.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// How bad a configuration problem is for the build that found it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Value ignored or defaulted; the node itself is kept.
    Warning,
    /// The offending subtree is skipped; the rest of the tree builds.
    Error,
    /// The tree would be unusable; the build is aborted.
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Fatal => write!(f, "fatal"),
        }
    }
}

/// Problems found in the raw hosting configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("duplicate host group '{0}'")]
    DuplicateHostGroup(String),

    #[error("duplicate virtual host '{host_name}' in host group '{group}'")]
    DuplicateHost { group: String, host_name: String },

    #[error("virtual host name '{name}' contains dots but is not an ip address; configure it hierarchically")]
    DottedHostName { name: String },

    #[error("duplicate mount '{name}' below '{parent}'")]
    DuplicateMount { parent: String, name: String },

    #[error("duplicate port mount for port {port} on host '{host_name}'")]
    DuplicatePortMount { host_name: String, port: u16 },

    #[error("port mount for port {port} on host '{host_name}' has no root mount")]
    MissingRootMount { host_name: String, port: u16 },

    #[error("mount point '{mount_point}' is not absolute")]
    RelativeMountPoint { mount_point: String },

    #[error("mount point '{mount_point}' does not point to a site root; fix it or set is_mapped = false")]
    UnknownSiteRoot { mount_point: String },

    #[error("no preview site root '{preview_mount_point}'; the live site is used for preview")]
    MissingPreviewSite { preview_mount_point: String },

    #[error("only_for_context_path '{value}' must be a single segment starting with '/'; ignored")]
    MalformedContextPath { value: String },

    #[error("scheme_not_matching_response_code {code} is not supported; inherited value used")]
    UnsupportedResponseCode { code: u16 },

    #[error("alias '{alias}' with type '{mount_type}' is already used in host group '{group}' by '{existing}'")]
    AliasConflict {
        group: String,
        alias: String,
        mount_type: String,
        existing: String,
    },

    #[error("mount identifier '{identifier}' is used more than once; last one wins")]
    DuplicateIdentifier { identifier: String },

    #[error("cms location '{location}' is not a valid url; ignored")]
    InvalidCmsLocation { location: String },
}

impl ConfigurationError {
    /// Severity this problem carries in a build.
    pub fn severity(&self) -> Severity {
        match self {
            ConfigurationError::DuplicateHostGroup(_) | ConfigurationError::DuplicateHost { .. } => {
                Severity::Fatal
            }
            ConfigurationError::DottedHostName { .. }
            | ConfigurationError::DuplicateMount { .. }
            | ConfigurationError::DuplicatePortMount { .. }
            | ConfigurationError::MissingRootMount { .. }
            | ConfigurationError::RelativeMountPoint { .. }
            | ConfigurationError::UnknownSiteRoot { .. } => Severity::Error,
            ConfigurationError::MissingPreviewSite { .. }
            | ConfigurationError::MalformedContextPath { .. }
            | ConfigurationError::UnsupportedResponseCode { .. }
            | ConfigurationError::AliasConflict { .. }
            | ConfigurationError::DuplicateIdentifier { .. }
            | ConfigurationError::InvalidCmsLocation { .. } => Severity::Warning,
        }
    }
}

/// A configuration problem tagged with the subtree it was found in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigurationIssue {
    pub severity: Severity,
    /// Slash separated location, e.g. `prod/www.example.com/hst:root/subsite`.
    pub location: String,
    #[serde(serialize_with = "serialize_display")]
    pub error: ConfigurationError,
}

impl ConfigurationIssue {
    pub fn new(location: impl Into<String>, error: ConfigurationError) -> Self {
        Self {
            severity: error.severity(),
            location: location.into(),
            error,
        }
    }
}

impl fmt::Display for ConfigurationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.location, self.error)
    }
}

fn serialize_display<S: serde::Serializer>(
    error: &ConfigurationError,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// A build that was rejected under its [`BuildPolicy`](crate::hosting::BuildPolicy).
#[derive(Debug, Clone)]
pub struct BuildFailure {
    /// Every issue found, in discovery order.
    pub issues: Vec<ConfigurationIssue>,
}

impl BuildFailure {
    /// Issues at or above the given severity.
    pub fn at_least(&self, severity: Severity) -> impl Iterator<Item = &ConfigurationIssue> {
        self.issues.iter().filter(move |i| i.severity >= severity)
    }
}

impl fmt::Display for BuildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hosting configuration rejected: ")?;
        for (i, issue) in self.at_least(Severity::Error).enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", issue)?;
        }
        Ok(())
    }
}

impl std::error::Error for BuildFailure {}

/// Failures of a match request that are not simply "not found".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    /// No registry has been built successfully yet.
    #[error("no correct virtual hosts configured")]
    NotConfigured,

    #[error("empty host name")]
    EmptyHost,

    #[error("host '{host}' contains an invalid port number")]
    InvalidPort { host: String },

    /// Programmer error in a lookup call.
    #[error("invalid lookup: {reason}")]
    InvalidLookup { reason: &'static str },
}

impl MatchError {
    /// HTTP status class a request pipeline should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            MatchError::NotConfigured => 503,
            MatchError::EmptyHost | MatchError::InvalidPort { .. } => 400,
            MatchError::InvalidLookup { .. } => 500,
        }
    }
}

/// Editorial lock conflicts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    #[error("mount '{0}' is unknown")]
    UnknownMount(String),

    #[error("mount '{identifier}' is already locked by '{locked_by}'")]
    AlreadyLocked { identifier: String, locked_by: String },

    #[error("mount '{identifier}' is not locked by '{user}'")]
    NotLockedBy { identifier: String, user: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_mapping() {
        assert_eq!(
            ConfigurationError::DuplicateHostGroup("prod".into()).severity(),
            Severity::Fatal
        );
        assert_eq!(
            ConfigurationError::RelativeMountPoint { mount_point: "x".into() }.severity(),
            Severity::Error
        );
        assert_eq!(
            ConfigurationError::MalformedContextPath { value: "site".into() }.severity(),
            Severity::Warning
        );
    }

    #[test]
    fn test_build_failure_lists_errors_only() {
        let failure = BuildFailure {
            issues: vec![
                ConfigurationIssue::new("prod", ConfigurationError::InvalidCmsLocation {
                    location: "::".into(),
                }),
                ConfigurationIssue::new("prod/com", ConfigurationError::DuplicateHost {
                    group: "prod".into(),
                    host_name: "com".into(),
                }),
            ],
        };
        let text = failure.to_string();
        assert!(text.contains("duplicate virtual host 'com'"));
        assert!(!text.contains("cms location"));
    }

    #[test]
    fn test_match_error_status() {
        assert_eq!(MatchError::NotConfigured.status_code(), 503);
        assert_eq!(MatchError::InvalidPort { host: "a:b".into() }.status_code(), 400);
    }
}
