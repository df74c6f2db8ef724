//! Logging configuration and subscriber setup

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::Deserialize;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

use crate::ConfigError;

/// Level used when the configured one cannot be parsed
const FALLBACK_LEVEL: &str = "debug";

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `info,jwt_auth=debug`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format
    #[serde(default)]
    pub format: LogFormat,

    /// Append to this file instead of stdout
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    FALLBACK_LEVEL.to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

/// Log format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format (for log aggregation)
    #[default]
    Json,
    /// Human-readable text
    Text,
}

/// Build the filter, falling back to `debug` on an invalid directive
fn resolve_filter(level: &str) -> (EnvFilter, Option<String>) {
    match EnvFilter::try_new(level) {
        Ok(filter) => (filter, None),
        Err(e) => (EnvFilter::new(FALLBACK_LEVEL), Some(e.to_string())),
    }
}

/// Open the configured log file, falling back to stdout
fn resolve_writer(config: &LoggingConfig) -> (BoxMakeWriter, Option<String>) {
    let Some(path) = &config.file else {
        return (BoxMakeWriter::new(std::io::stdout), None);
    };

    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => (BoxMakeWriter::new(Mutex::new(file)), None),
        Err(e) => (
            BoxMakeWriter::new(std::io::stdout),
            Some(format!("{}: {}", path.display(), e)),
        ),
    }
}

/// Install the global tracing subscriber
///
/// Fallbacks (bad level, unopenable file) are reported once the subscriber
/// is live so they end up in the same log stream.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ConfigError> {
    let (filter, level_error) = resolve_filter(&config.level);
    let (writer, file_error) = resolve_writer(config);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(true);

    let result = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    result.map_err(|e| ConfigError::Logging(e.to_string()))?;

    if let Some(error) = level_error {
        tracing::warn!(level = %config.level, %error, "Invalid log level, falling back to debug");
    }
    if let Some(error) = file_error {
        tracing::warn!(%error, "Failed to open log file, using stdout");
    }

    Ok(())
}
