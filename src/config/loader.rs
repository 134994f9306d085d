//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::HostsConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::hosting::BuildFailure;

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
    /// The document validated but its hosting tree did not build.
    Rejected(BuildFailure),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
            ConfigError::Rejected(failure) => write!(f, "{}", failure),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<BuildFailure> for ConfigError {
    fn from(failure: BuildFailure) -> Self {
        ConfigError::Rejected(failure)
    }
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<HostsConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content)
}

/// Parse and validate a TOML document.
pub fn parse_config(content: &str) -> Result<HostsConfig, ConfigError> {
    let config: HostsConfig = toml::from_str(content).map_err(ConfigError::Parse)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_is_reported() {
        let err = parse_config("[hosts\nscheme = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_lists_every_problem() {
        let toml = r#"
            [hosts]
            scheme = "ftp"

            [[host_groups]]
            name = ""
        "#;
        let err = parse_config(toml).unwrap_err();
        match &err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {}", other),
        }
        assert!(err.to_string().starts_with("Validation failed: "));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/hosts.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
