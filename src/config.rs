//! Configuration management for gantry
//!
//! Settings load from environment variables with sensible defaults.
//!
//! # Environment Variables
//!
//! - `GANTRY_VARIANT`: default build variant (alpine-full|slim|slim-single|alpine-minimal) - default: "slim"
//! - `GANTRY_MANIFEST`: dependency manifest path - default: "requirements.txt"
//! - `GANTRY_APP_MODULE`: module holding the WSGI callable - default: "app"
//! - `GANTRY_APP_CALLABLE`: WSGI callable attribute - default: "app"
//! - `GANTRY_SOURCE_DIR`: application source tree - default: "."
//! - `GANTRY_LOG_LEVEL`: logging level - default: "info"
//! - `GANTRY_BUILD_TIMEOUT`: build timeout in seconds - default: "600"

use crate::plan::{AppSpec, Variant};
use std::env;
use std::path::PathBuf;
use thiserror::Error;

const DEFAULT_MANIFEST: &str = "requirements.txt";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_BUILD_TIMEOUT_SECS: u64 = 600;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Variant name not in the catalog
    #[error("Invalid variant: {0}. Valid options: alpine-full, slim, slim-single, alpine-minimal")]
    InvalidVariant(String),

    /// Failed to parse a configuration value
    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Main configuration structure for gantry
#[derive(Debug, Clone)]
pub struct GantryConfig {
    /// Default build variant
    pub variant: Variant,

    /// Dependency manifest path, relative to the source tree
    pub manifest_path: String,

    /// WSGI application description
    pub app: AppSpec,

    /// Build timeout in seconds
    pub build_timeout_secs: u64,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for GantryConfig {
    /// Load configuration from environment variables with defaults
    fn default() -> Self {
        let variant = env::var("GANTRY_VARIANT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(Variant::SlimMultiStage);

        let manifest_path =
            env::var("GANTRY_MANIFEST").unwrap_or_else(|_| DEFAULT_MANIFEST.to_string());

        let app = AppSpec {
            module: env::var("GANTRY_APP_MODULE").unwrap_or_else(|_| "app".to_string()),
            callable: env::var("GANTRY_APP_CALLABLE").unwrap_or_else(|_| "app".to_string()),
            source_dir: env::var("GANTRY_SOURCE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
        };

        let build_timeout_secs = env::var("GANTRY_BUILD_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_BUILD_TIMEOUT_SECS);

        let log_level =
            env::var("GANTRY_LOG_LEVEL").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());

        Self {
            variant,
            manifest_path,
            app,
            build_timeout_secs,
            log_level,
        }
    }
}

impl GantryConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.manifest_path.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Manifest path cannot be empty".to_string(),
            ));
        }
        if self.app.module.is_empty() || self.app.callable.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "WSGI module and callable cannot be empty".to_string(),
            ));
        }
        if self.build_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Build timeout must be greater than zero".to_string(),
            ));
        }
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ParseError {
                field: "GANTRY_LOG_LEVEL".to_string(),
                error: format!("invalid level '{}'", self.log_level),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = GantryConfig {
            variant: Variant::SlimMultiStage,
            manifest_path: DEFAULT_MANIFEST.to_string(),
            app: AppSpec::default(),
            build_timeout_secs: DEFAULT_BUILD_TIMEOUT_SECS,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_manifest_rejected() {
        let config = GantryConfig {
            manifest_path: String::new(),
            ..test_config()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = GantryConfig {
            build_timeout_secs: 0,
            ..test_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let config = GantryConfig {
            log_level: "loud".to_string(),
            ..test_config()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ParseError { .. })
        ));
    }

    fn test_config() -> GantryConfig {
        GantryConfig {
            variant: Variant::SlimMultiStage,
            manifest_path: DEFAULT_MANIFEST.to_string(),
            app: AppSpec::default(),
            build_timeout_secs: DEFAULT_BUILD_TIMEOUT_SECS,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}
