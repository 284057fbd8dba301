//! Streaming bulk export of form submissions
//!
//! The pipeline pulls one record at a time from a store cursor, rewrites it
//! (reference links in, protected fields out), encodes it, and pushes the
//! bytes into a sink that can apply backpressure. Memory use does not grow
//! with the size of the result set.
//!
//! # Modules
//!
//! - `cli`: Command-line interface and argument parsing
//! - `config`: Configuration management
//! - `encoder`: JSON, JSON Lines and CSV encoders
//! - `error`: Error types and handling
//! - `export`: Export coordinator, sessions and progress
//! - `form`: Form definitions and their data fields
//! - `hooks`: Extension hooks
//! - `query`: Query construction
//! - `record`: In-memory record model
//! - `sink`: Output sinks
//! - `store`: Record store abstractions and the MongoDB implementation
//! - `transform`: Link injection and redaction
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use submission_export::{
//!     config::Config,
//!     export::{ExportCoordinator, ExportRequest, ExportSettings},
//!     sink::FileSink,
//!     store::{MongoFormStore, MongoSource, connect},
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let database = connect(&config.connection).await?;
//!
//!     let coordinator = ExportCoordinator::new(
//!         Arc::new(MongoFormStore::new(&database, "forms")),
//!         Arc::new(MongoSource::new(&database, "submissions", 100)),
//!     )
//!     .with_settings(ExportSettings::from(&config.export));
//!
//!     let mut sink = FileSink::create("export.csv")?;
//!     let request = ExportRequest::new("5f0c3e0a9d1b2c0012345678")
//!         .with_owner("5e1a2b3c4d5e6f0012345678")
//!         .with_format("csv");
//!     let summary = coordinator.export(request, &mut sink).await?;
//!
//!     println!("Exported {} records", summary.records_written);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod encoder;
pub mod error;
pub mod export;
pub mod form;
pub mod hooks;
pub mod query;
pub mod record;
pub mod sink;
pub mod store;
pub mod transform;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::Config;
pub use encoder::{Encoder, ExportFormat};
pub use error::{ExportError, Result, ResultCode};
pub use export::{ExportCoordinator, ExportRequest, ExportSettings, ExportSummary};
pub use hooks::{ExportHook, HookRegistry};
pub use query::{Query, QueryBuilder};
pub use record::{FieldValue, Record};
pub use sink::ExportSink;
pub use store::{FormResolver, RecordCursor, RecordSource};
pub use transform::RowTransformer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
