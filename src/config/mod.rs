//! Configuration management
//!
//! Configuration is loaded from several sources:
//! - Configuration file (TOML format)
//! - Environment variables
//! - Command-line arguments
//!
//! Configuration precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::encoder::ExportFormat;
use crate::error::{ConfigurationError, Result};
use crate::sink::{ChannelSink, ExportReceiver};
use crate::transform::RecordErrorPolicy;

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "SUBMISSION_EXPORT_";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Connection configuration
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Export pipeline configuration
    #[serde(default)]
    pub export: ExportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection-related configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// MongoDB connection URI
    #[serde(default = "default_uri")]
    pub uri: String,

    /// Database holding forms and submissions
    #[serde(default = "default_database")]
    pub database: String,

    /// Collection holding submissions
    #[serde(default = "default_submissions_collection")]
    pub submissions_collection: String,

    /// Collection holding form definitions
    #[serde(default = "default_forms_collection")]
    pub forms_collection: String,

    /// Connection timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

/// Export pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Base URL prefixed to link paths
    #[serde(default)]
    pub api_host: String,

    /// Documents fetched per server round trip
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Maximum record nesting depth
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// What to do with records that fail to transform
    #[serde(default)]
    pub on_record_error: RecordErrorPolicy,

    /// Chunks buffered between the pipeline and an in-process consumer
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Format used when a request names none
    #[serde(default = "default_format")]
    pub default_format: ExportFormat,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_uri() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_database() -> String {
    "formio".to_string()
}

fn default_submissions_collection() -> String {
    "submissions".to_string()
}

fn default_forms_collection() -> String {
    "forms".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_batch_size() -> u32 {
    100
}

fn default_max_depth() -> usize {
    32
}

fn default_channel_capacity() -> usize {
    16
}

fn default_format() -> ExportFormat {
    ExportFormat::Json
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    true
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            database: default_database(),
            submissions_collection: default_submissions_collection(),
            forms_collection: default_forms_collection(),
            timeout: default_timeout(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            api_host: String::new(),
            batch_size: default_batch_size(),
            max_depth: default_max_depth(),
            on_record_error: RecordErrorPolicy::default(),
            channel_capacity: default_channel_capacity(),
            default_format: default_format(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigurationError::FileNotFound(path.display().to_string()).into());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ConfigurationError::InvalidConfig(e.to_string()).into())
    }

    /// Load configuration with proper precedence (file, then environment)
    ///
    /// An explicit path must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::default_path();
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env(|key| std::env::var(format!("{ENV_PREFIX}{key}")).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides
    ///
    /// Variables are prefixed with `SUBMISSION_EXPORT_`, for example
    /// `SUBMISSION_EXPORT_BATCH_SIZE=500`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(uri) = lookup("URI") {
            self.connection.uri = uri;
        }
        if let Some(database) = lookup("DATABASE") {
            self.connection.database = database;
        }
        if let Some(host) = lookup("API_HOST") {
            self.export.api_host = host;
        }
        if let Some(value) = lookup("BATCH_SIZE") {
            self.export.batch_size = parse_value("BATCH_SIZE", &value)?;
        }
        if let Some(value) = lookup("MAX_DEPTH") {
            self.export.max_depth = parse_value("MAX_DEPTH", &value)?;
        }
        if let Some(value) = lookup("ON_RECORD_ERROR") {
            self.export.on_record_error = match value.to_ascii_lowercase().as_str() {
                "skip" => RecordErrorPolicy::Skip,
                "abort" => RecordErrorPolicy::Abort,
                _ => return Err(invalid("ON_RECORD_ERROR", &value)),
            };
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".submission-export")
            .join("config.toml")
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.export.batch_size == 0 {
            return Err(invalid("export.batch_size", "0"));
        }
        if self.export.max_depth == 0 {
            return Err(invalid("export.max_depth", "0"));
        }
        if self.export.channel_capacity == 0 {
            return Err(invalid("export.channel_capacity", "0"));
        }
        if !self.connection.uri.starts_with("mongodb://")
            && !self.connection.uri.starts_with("mongodb+srv://")
        {
            return Err(invalid("connection.uri", &self.connection.uri));
        }
        Ok(())
    }
}

impl ConnectionConfig {
    /// Timeout for connecting and selecting a server
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl ExportConfig {
    /// Bounded sink/receiver pair sized by `channel_capacity`, for serving
    /// an export to an in-process consumer.
    pub fn channel(&self) -> (ChannelSink, ExportReceiver) {
        crate::sink::channel(self.channel_capacity)
    }
}

fn invalid(field: &str, value: &str) -> crate::error::ExportError {
    ConfigurationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
    .into()
}

fn parse_value<T: std::str::FromStr>(field: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| invalid(field, value))
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}
