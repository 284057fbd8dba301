//! Command-line interface
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and CLI overrides
//! - Turning arguments into an [`ExportRequest`] and an output target

use clap::Parser;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::encoder::ExportFormat;
use crate::error::{ConfigurationError, Result};
use crate::export::ExportRequest;
use crate::query::derive_filter;

/// Extract database name from MongoDB connection URI
///
/// Format: mongodb://[username:password@]host[:port][/database][?options]
fn extract_database_from_uri(uri: &str) -> Option<String> {
    let after_scheme = uri.split("://").nth(1)?;
    let path_part = after_scheme.split('/').nth(1)?;
    let db_name = path_part.split('?').next().unwrap_or("");
    (!db_name.is_empty()).then(|| db_name.to_string())
}

/// Parse a `key=value` filter argument
fn parse_filter_pair(arg: &str) -> std::result::Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{arg}'")),
    }
}

/// Stream form submissions out of MongoDB as JSON, JSON Lines or CSV
#[derive(Parser, Debug)]
#[command(
    name = "submission-export",
    version,
    about = "Streaming export of form submissions",
    long_about = "Streams every submission of a form out of MongoDB, adds reference URLs to
linked submissions, removes protected fields, and writes JSON, JSON Lines or CSV."
)]
pub struct CliArgs {
    /// MongoDB connection URI
    ///
    /// Format: mongodb://[username:password@]host[:port][/database][?options]
    #[arg(value_name = "URI")]
    pub uri: Option<String>,

    /// Database holding forms and submissions
    #[arg(long, value_name = "NAME")]
    pub database: Option<String>,

    /// Form whose submissions are exported
    #[arg(short = 'f', long, value_name = "ID")]
    pub form: String,

    /// Output format (json, jsonl, csv)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JSON filter replacing the --filter parameters
    #[arg(long, value_name = "JSON")]
    pub query: Option<String>,

    /// Filter parameter, e.g. `data.age__gte=18` (repeatable)
    #[arg(long = "filter", value_name = "KEY=VALUE", value_parser = parse_filter_pair)]
    pub filters: Vec<(String, String)>,

    /// Identity of the caller; records are limited to this owner
    #[arg(long, value_name = "ID")]
    pub owner: Option<String>,

    /// Export every owner's records
    #[arg(long)]
    pub privileged: bool,

    /// Output file, or `-` for stdout
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<String>,

    /// Base URL for reference links
    #[arg(long, value_name = "URL")]
    pub api_host: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Verbose mode (detailed logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv")]
    pub very_verbose: bool,

    /// Disable the progress spinner
    #[arg(long = "no-progress")]
    pub no_progress: bool,
}

/// Where export bytes go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    File(PathBuf),
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Loaded configuration
    config: Config,
}

impl CliInterface {
    /// Parse process arguments and load configuration
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    pub fn from_args(args: CliArgs) -> Result<Self> {
        let config = Self::load_config(&args)?;
        Ok(Self { args, config })
    }

    /// Load configuration from file and environment, then apply arguments
    fn load_config(args: &CliArgs) -> Result<Config> {
        let mut config = Config::load(args.config_file.as_deref())?;
        Self::apply_args_to_config(&mut config, args);
        config.validate()?;
        Ok(config)
    }

    /// Overrides configuration values with CLI arguments where provided
    fn apply_args_to_config(config: &mut Config, args: &CliArgs) {
        if let Some(ref uri) = args.uri {
            config.connection.uri = uri.clone();
            if let Some(db) = extract_database_from_uri(uri) {
                config.connection.database = db;
            }
        }
        if let Some(ref db) = args.database {
            config.connection.database = db.clone();
        }
        if let Some(ref host) = args.api_host {
            config.export.api_host = host.clone();
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Sanitize URI by hiding credentials
    pub fn sanitize_uri(uri: &str) -> String {
        if let Some(proto_end) = uri.find("://")
            && let Some(host_start) = uri.rfind('@')
        {
            let proto = &uri[..proto_end + 3];
            let host = &uri[host_start..];
            return format!("{}***{}", proto, host);
        }
        uri.to_string()
    }

    /// Build the export request described by the arguments
    pub fn export_request(&self) -> ExportRequest {
        ExportRequest {
            form_id: self.args.form.clone(),
            raw_filter: self.args.query.clone(),
            derived_filter: derive_filter(&self.args.filters),
            format: self.args.format.clone(),
            privileged: self.args.privileged,
            owner_id: self.args.owner.clone(),
        }
    }

    /// Format the output will be written in, for naming the output file.
    pub fn resolved_format(&self) -> Result<ExportFormat> {
        match self.args.format {
            Some(ref name) => Ok(name.parse::<ExportFormat>()?),
            None => Ok(self.config.export.default_format),
        }
    }

    /// Reject requests that cannot succeed before any connection is made:
    /// an unknown format, or no identity without `--privileged`.
    pub fn check_request(&self) -> Result<ExportFormat> {
        let format = self.resolved_format()?;
        if !self.args.privileged && self.args.owner.is_none() {
            return Err(ConfigurationError::MissingIdentity.into());
        }
        Ok(format)
    }

    /// Resolve the output target. Without `--output` a timestamped file is
    /// created in the current directory.
    pub fn output_target(&self) -> Result<OutputTarget> {
        match self.args.output.as_deref() {
            Some("-") => Ok(OutputTarget::Stdout),
            Some(path) if path.trim().is_empty() => Err(ConfigurationError::InvalidValue {
                field: "output".to_string(),
                value: path.to_string(),
            }
            .into()),
            Some(path) => Ok(OutputTarget::File(PathBuf::from(path))),
            None => {
                let format = self.resolved_format()?;
                Ok(OutputTarget::File(default_output_path(
                    Path::new("."),
                    format,
                    chrono::Local::now(),
                )))
            }
        }
    }

    pub fn show_progress(&self) -> bool {
        !self.args.no_progress && self.output_target().ok() != Some(OutputTarget::Stdout)
    }
}

/// `export-YYYYmmdd-HHMMSS.<ext>` under `dir`
fn default_output_path<Tz>(dir: &Path, format: ExportFormat, now: chrono::DateTime<Tz>) -> PathBuf
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    dir.join(format!(
        "export-{}.{}",
        now.format("%Y%m%d-%H%M%S"),
        format.extension()
    ))
}
