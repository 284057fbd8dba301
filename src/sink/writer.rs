//! Sink over any async writer (files, stdout, sockets)

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, warn};

use crate::error::{ExportError, Result, SinkError};

use super::ExportSink;

/// Buffer size for writer sinks
const BUFFER_CAPACITY: usize = 1024 * 1024;

/// Buffered sink writing straight to an `AsyncWrite`.
///
/// A broken pipe marks the sink closed, which the coordinator treats as the
/// consumer going away.
pub struct WriterSink<W: AsyncWrite + Unpin + Send> {
    writer: BufWriter<W>,
    bytes_written: u64,
    closed: bool,
    finished: bool,
}

impl<W: AsyncWrite + Unpin + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(BUFFER_CAPACITY, writer),
            bytes_written: 0,
            closed: false,
            finished: false,
        }
    }

    fn check(&mut self, result: std::io::Result<()>) -> Result<()> {
        result.map_err(|e| {
            let err = SinkError::from(e);
            if matches!(err, SinkError::Closed) {
                self.closed = true;
            }
            ExportError::Sink(err)
        })
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> ExportSink for WriterSink<W> {
    async fn send(&mut self, chunk: Vec<u8>) -> Result<()> {
        if self.closed || self.finished {
            return Err(SinkError::Closed.into());
        }
        let result = self.writer.write_all(&chunk).await;
        self.check(result)?;
        self.bytes_written += chunk.len() as u64;
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        let result = self.writer.flush().await;
        self.check(result)?;
        let result = self.writer.shutdown().await;
        self.check(result)
    }

    async fn abort(&mut self, reason: &str) {
        if self.finished {
            return;
        }
        self.finished = true;
        warn!("Output aborted after {} bytes: {}", self.bytes_written, reason);
        // Keep what was produced; the missing closing framing marks it incomplete.
        let result = self.writer.flush().await;
        if let Err(e) = self.check(result) {
            debug!("Flush during abort failed: {}", e);
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}
