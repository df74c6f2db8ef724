//! Unified configuration management for go-core services
//!
//! This library provides:
//! - The authentication section consumed by the JWT middleware
//! - The logging section and subscriber initialization
//! - Layered loading: `.env`, optional TOML file, `APP_` environment variables

use std::path::Path;

use error_types::StatusError;
use serde::Deserialize;
use thiserror::Error;
use validator::Validate;

pub mod auth;
pub mod observability;

pub use auth::AuthConfig;
pub use observability::{init_logging, LogFormat, LoggingConfig};

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "APP";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Sources could not be read or merged
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A value failed validation
    #[error("Configuration validation failed: {0}")]
    Invalid(String),

    /// The global subscriber could not be installed
    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

impl From<validator::ValidationErrors> for ConfigError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Invalid(errors.to_string())
    }
}

impl From<ConfigError> for StatusError {
    fn from(error: ConfigError) -> Self {
        StatusError::internal(error.to_string())
    }
}

/// Base service configuration
///
/// # Environment Variables
/// Uses the pattern `APP_<SECTION>__<KEY>`, for example
/// `APP_AUTH__REQUIRED=true` or `APP_LOGGING__LEVEL=info`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ServiceConfig {
    /// Application name
    #[validate(length(min = 1))]
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// JWT authentication section
    #[serde(default)]
    #[validate(nested)]
    pub auth: AuthConfig,

    /// Logging section
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_app_name() -> String {
    "go-core".to_string()
}

impl ServiceConfig {
    /// Load configuration from environment and files
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. Configuration file (if provided and present)
    /// 3. Environment variables (highest priority)
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        // Load .env file if it exists (for local development)
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: ServiceConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        tracing::debug!(app_name = %config.app_name, "Configuration loaded");
        Ok(config)
    }
}
