//! Output sinks
//!
//! A sink accepts byte chunks and has two distinct ways to stop:
//! - `finish`: the export completed and nothing else will follow.
//! - `abort`: the export failed after streaming started; whatever the
//!   consumer already received is an incomplete document.
//!
//! A consumer that goes away shows up as [`SinkError::Closed`] from `send`
//! and as `is_closed() == true`, which tells the coordinator to stop pulling
//! records.
//!
//! [`SinkError::Closed`]: crate::error::SinkError::Closed

pub mod channel;
pub mod file;
pub mod writer;

pub use channel::{ChannelSink, ExportReceiver, StreamEvent, StreamOutcome, channel};
pub use file::FileSink;
pub use writer::WriterSink;

use async_trait::async_trait;

use crate::error::Result;

/// Destination of encoded export bytes.
#[async_trait]
pub trait ExportSink: Send {
    /// Deliver one chunk, waiting while the consumer is behind.
    async fn send(&mut self, chunk: Vec<u8>) -> Result<()>;

    /// Signal successful end-of-stream.
    async fn finish(&mut self) -> Result<()>;

    /// Signal that the stream is terminated and incomplete.
    async fn abort(&mut self, reason: &str);

    /// Whether the consumer has gone away.
    fn is_closed(&self) -> bool;

    /// Bytes accepted so far.
    fn bytes_written(&self) -> u64;
}
