//! JSON Lines encoder
//!
//! One compact JSON document per line, no surrounding framing.

use async_trait::async_trait;
use tracing::debug;

use crate::error::{EncodingError, Result};
use crate::record::Record;
use crate::sink::ExportSink;

use super::{Encoder, ExportFormat};

/// Encoder for the `jsonl` format
#[derive(Debug, Default)]
pub struct JsonLinesEncoder {
    written: u64,
}

impl JsonLinesEncoder {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Encoder for JsonLinesEncoder {
    fn format(&self) -> ExportFormat {
        ExportFormat::Jsonl
    }

    async fn init(&mut self, _sink: &mut dyn ExportSink) -> Result<()> {
        Ok(())
    }

    async fn write_record(&mut self, record: &Record, sink: &mut dyn ExportSink) -> Result<()> {
        let mut line = serde_json::to_vec(record).map_err(EncodingError::from)?;
        line.push(b'\n');
        sink.send(line).await?;
        self.written += 1;
        Ok(())
    }

    async fn finish(&mut self, sink: &mut dyn ExportSink) -> Result<()> {
        sink.finish().await?;
        debug!("Finished JSON Lines output ({} records)", self.written);
        Ok(())
    }

    fn records_written(&self) -> u64 {
        self.written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{StreamOutcome, channel};
    use mongodb::bson::doc;

    #[tokio::test]
    async fn test_one_document_per_line() {
        let (mut sink, receiver) = channel(8);
        let mut encoder = JsonLinesEncoder::new();
        encoder.init(&mut sink).await.unwrap();
        for id in ["a", "b"] {
            let record = Record::from_document(doc! { "_id": id }, 4).unwrap();
            encoder.write_record(&record, &mut sink).await.unwrap();
        }
        encoder.finish(&mut sink).await.unwrap();
        drop(sink);

        let StreamOutcome::Completed(body) = receiver.read_to_end().await else {
            panic!("stream did not complete");
        };
        let text = String::from_utf8(body).unwrap();
        assert_eq!(text, "{\"_id\":\"a\"}\n{\"_id\":\"b\"}\n");
    }

    #[tokio::test]
    async fn test_empty_output() {
        let (mut sink, receiver) = channel(8);
        let mut encoder = JsonLinesEncoder::new();
        encoder.init(&mut sink).await.unwrap();
        encoder.finish(&mut sink).await.unwrap();
        drop(sink);

        assert_eq!(receiver.read_to_end().await, StreamOutcome::Completed(Vec::new()));
    }
}
