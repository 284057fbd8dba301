//! JSON array encoder
//!
//! Output is a single well-formed array: `[` on init, comma-separated
//! records, `]` on finish. An export with no records yields `[]`.

use async_trait::async_trait;
use tracing::debug;

use crate::error::{EncodingError, Result};
use crate::record::Record;
use crate::sink::ExportSink;

use super::{Encoder, ExportFormat};

/// Encoder for the `json` format
#[derive(Debug, Default)]
pub struct JsonEncoder {
    started: bool,
    written: u64,
}

impl JsonEncoder {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Encoder for JsonEncoder {
    fn format(&self) -> ExportFormat {
        ExportFormat::Json
    }

    async fn init(&mut self, sink: &mut dyn ExportSink) -> Result<()> {
        sink.send(b"[".to_vec()).await?;
        self.started = true;
        Ok(())
    }

    async fn write_record(&mut self, record: &Record, sink: &mut dyn ExportSink) -> Result<()> {
        if !self.started {
            return Err(EncodingError::InvalidState("write before init").into());
        }

        let mut buf = Vec::with_capacity(256);
        if self.written > 0 {
            buf.push(b',');
        }
        serde_json::to_writer(&mut buf, record).map_err(EncodingError::from)?;

        sink.send(buf).await?;
        self.written += 1;
        Ok(())
    }

    async fn finish(&mut self, sink: &mut dyn ExportSink) -> Result<()> {
        if !self.started {
            return Err(EncodingError::InvalidState("finish before init").into());
        }
        sink.send(b"]".to_vec()).await?;
        sink.finish().await?;
        debug!("Finished JSON output ({} records)", self.written);
        Ok(())
    }

    fn records_written(&self) -> u64 {
        self.written
    }
}
