use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/pagevault-config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

/// Loads `path` if it exists, otherwise returns the built-in defaults.
pub fn load_config_or_default<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::default());
    }
    load_config(path)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if !(72..=1200).contains(&config.raster.dpi) {
        return Err(ConfigError::Validation {
            message: format!("raster.dpi must be between 72 and 1200, got {}", config.raster.dpi),
        });
    }

    let threshold = config.ingest.similarity_threshold;
    if !(threshold > 0.0 && threshold <= 1.0) {
        return Err(ConfigError::Validation {
            message: format!(
                "ingest.similarity_threshold must be in (0, 1], got {}",
                threshold
            ),
        });
    }

    if config.ingest.max_concurrent_jobs == 0 {
        return Err(ConfigError::Validation {
            message: "ingest.max_concurrent_jobs must be at least 1".to_string(),
        });
    }

    if config.ingest.max_upload_bytes == 0 {
        return Err(ConfigError::Validation {
            message: "ingest.max_upload_bytes must be positive".to_string(),
        });
    }

    if config.ocr.backends.is_empty() {
        return Err(ConfigError::Validation {
            message: "ocr.backends must name at least one backend".to_string(),
        });
    }

    let mut seen = std::collections::HashSet::new();
    for kind in &config.ocr.backends {
        if !seen.insert(kind) {
            return Err(ConfigError::Validation {
                message: format!("ocr.backends lists '{}' more than once", kind),
            });
        }
    }

    Ok(())
}
