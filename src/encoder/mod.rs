//! Export encoders
//!
//! An encoder owns the framing of one output format and writes each chunk
//! straight to the sink:
//! - `init`: validation plus any preamble (`[`, CSV header). Failing here
//!   aborts the export before a cursor is opened.
//! - `write_record`: one record's bytes, including separators.
//! - `finish`: closing framing, then the sink's end-of-stream signal.

pub mod convert;
pub mod csv;
pub mod json;
pub mod jsonl;

pub use csv::CsvEncoder;
pub use json::JsonEncoder;
pub use jsonl::JsonLinesEncoder;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, Result};
use crate::form::Form;
use crate::record::Record;
use crate::sink::ExportSink;

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// A single JSON array
    Json,
    /// One JSON document per line
    Jsonl,
    /// Comma-separated values with a header row
    Csv,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Jsonl => "application/x-ndjson",
            ExportFormat::Csv => "text/csv",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Jsonl => "jsonl",
            ExportFormat::Csv => "csv",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "jsonl" | "ndjson" => Ok(ExportFormat::Jsonl),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(ConfigurationError::UnknownFormat(s.to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Format-specific record encoder
#[async_trait]
pub trait Encoder: Send {
    fn format(&self) -> ExportFormat;

    /// Validate and write any preamble.
    async fn init(&mut self, sink: &mut dyn ExportSink) -> Result<()>;

    /// Encode one record.
    async fn write_record(&mut self, record: &Record, sink: &mut dyn ExportSink) -> Result<()>;

    /// Write closing framing and signal end-of-stream.
    async fn finish(&mut self, sink: &mut dyn ExportSink) -> Result<()>;

    /// Records encoded so far.
    fn records_written(&self) -> u64;
}

/// Create the encoder for a format.
pub fn create_encoder(format: ExportFormat, form: &Form) -> Box<dyn Encoder> {
    match format {
        ExportFormat::Json => Box::new(JsonEncoder::new()),
        ExportFormat::Jsonl => Box::new(JsonLinesEncoder::new()),
        ExportFormat::Csv => Box::new(CsvEncoder::new(form)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing_is_case_insensitive() {
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!(" Csv ".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("ndjson".parse::<ExportFormat>().unwrap(), ExportFormat::Jsonl);
    }

    #[test]
    fn test_unknown_format() {
        match "xml".parse::<ExportFormat>() {
            Err(ConfigurationError::UnknownFormat(name)) => assert_eq!(name, "xml"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_format_metadata() {
        assert_eq!(ExportFormat::Csv.content_type(), "text/csv");
        assert_eq!(ExportFormat::Jsonl.extension(), "jsonl");
        assert_eq!(ExportFormat::Json.to_string(), "json");
    }
}
