//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::DispatchConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<DispatchConfig, ConfigError> {
    let config: DispatchConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<DispatchConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config = parse_config(&content)?;

    tracing::info!(
        path = %path.display(),
        not_found = config.not_found.status,
        unhandled = config.unhandled.status,
        log_listings = config.log_listings,
        "Configuration loaded"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = parse_config(
            r#"
            log_listings = true

            [unhandled]
            status = 503
            body = "try later"
            "#,
        )
        .unwrap();

        assert!(config.log_listings);
        assert_eq!(config.unhandled.status, 503);
        assert_eq!(config.unhandled.body, "try later");
        assert_eq!(config.not_found.status, 404);
    }

    #[test]
    fn test_invalid_status_rejected() {
        let err = parse_config("[not_found]\nstatus = 7").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref errors) if errors.len() == 1));
        assert!(err.to_string().contains("not_found.status"));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(parse_config("log_listings = ["), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/dispatch.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
