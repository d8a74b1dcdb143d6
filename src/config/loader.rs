//! Configuration loading from disk or the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable holding a JSON configuration document.
pub const CONFIG_ENV_VAR: &str = "GATEWAY_CONFIGURATION";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Json(serde_json::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Json(e) => write!(f, "Invalid {} JSON: {}", CONFIG_ENV_VAR, e),
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
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_toml(&content)
}

/// Parse and validate a TOML document.
pub fn parse_toml(content: &str) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Parse and validate a JSON document.
pub fn parse_json(content: &str) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = serde_json::from_str(content).map_err(ConfigError::Json)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Resolve the startup configuration: an explicit file wins, then the
/// environment variable, then built-in defaults.
pub fn resolve_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    if let Some(path) = path {
        return load_config(path);
    }
    match std::env::var(CONFIG_ENV_VAR) {
        Ok(json) if !json.trim().is_empty() => parse_json(&json),
        _ => Ok(GatewayConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_documents_are_validated() {
        let config = parse_json(r#"{"load": {"low_watermark": 1, "high_watermark": 2}}"#).unwrap();
        assert_eq!(config.load.high_watermark, 2);

        let err = parse_json(r#"{"load": {"low_watermark": 3, "high_watermark": 2}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("load.low_watermark"));
    }

    #[test]
    fn toml_syntax_errors_are_parse_errors() {
        assert!(matches!(parse_toml("[load"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/gateway.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
