//! submission-export
//!
//! Streams the submissions of one form out of MongoDB into a file or stdout.
//!
//! # Usage
//!
//! ```bash
//! # All of one owner's submissions as CSV
//! submission-export mongodb://localhost:27017/formio -f 5f0c... --owner 5e1a... --format csv
//!
//! # Everything, filtered, as JSON Lines on stdout
//! submission-export -f 5f0c... --privileged --filter data.age__gte=18 --format jsonl -o -
//! ```

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use submission_export::cli::{CliInterface, OutputTarget};
use submission_export::error::Result;
use submission_export::export::{ExportCoordinator, ExportSettings, ExportSummary};
use submission_export::sink::{ExportSink, FileSink, WriterSink};
use submission_export::store::{MongoFormStore, MongoSource, connect};

/// Exit status when the export was interrupted
const EXIT_CANCELLED: i32 = 130;

/// Application entry point
#[tokio::main]
async fn main() {
    match run().await {
        Ok(summary) if summary.cancelled => {
            eprintln!(
                "Export cancelled after {} records",
                summary.records_written
            );
            std::process::exit(EXIT_CANCELLED);
        }
        Ok(_) => {}
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Main application logic
///
/// 1. Parse command-line arguments and load configuration
/// 2. Initialize logging
/// 3. Check the request and output target without touching the store
/// 4. Connect and build the coordinator
/// 5. Stream the export into the output target
async fn run() -> Result<ExportSummary> {
    let cli = CliInterface::new()?;
    initialize_logging(&cli);

    cli.check_request()?;
    let target = cli.output_target()?;
    let mut file_sink = match target {
        OutputTarget::File(ref path) => Some(FileSink::create(path)?),
        OutputTarget::Stdout => None,
    };

    let config = cli.config();
    info!(
        "Connecting to {}",
        CliInterface::sanitize_uri(&config.connection.uri)
    );
    let database = connect(&config.connection).await?;

    let source = MongoSource::new(
        &database,
        &config.connection.submissions_collection,
        config.export.batch_size,
    );
    let forms = MongoFormStore::new(&database, &config.connection.forms_collection);

    let cancel_token = CancellationToken::new();
    let coordinator = ExportCoordinator::new(Arc::new(forms), Arc::new(source))
        .with_settings(ExportSettings::from(&config.export))
        .with_cancellation(cancel_token.clone())
        .with_progress(cli.show_progress());

    // Ctrl+C stops the export at the next record boundary
    let ctrl_c_handle = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_token.cancel();
        }
    });

    let request = cli.export_request();
    let summary = match file_sink.as_mut() {
        None => {
            let mut sink = WriterSink::new(tokio::io::stdout());
            coordinator.export(request, &mut sink).await
        }
        Some(sink) => {
            let result = coordinator.export(request, sink).await;
            if let Ok(ref summary) = result
                && !summary.cancelled
            {
                eprintln!(
                    "Wrote {} bytes to {}",
                    sink.bytes_written(),
                    sink.path().display()
                );
            }
            result
        }
    };
    ctrl_c_handle.abort();

    let summary = summary?;
    info!(
        "Exported {} records ({} skipped) in {} ms",
        summary.records_written, summary.records_skipped, summary.elapsed_ms
    );
    Ok(summary)
}

/// Initialize logging based on verbosity flags and configuration
///
/// Logs go to stderr so stdout can carry export output. `RUST_LOG`
/// overrides the computed level.
fn initialize_logging(cli: &CliInterface) {
    let level = if cli.args().very_verbose {
        Level::TRACE
    } else if cli.args().verbose {
        Level::DEBUG
    } else {
        cli.config().logging.level.to_tracing_level()
    };

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
