//! Channel-backed sink for in-process consumers (HTTP bodies, tests)

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{Result, SinkError};

use super::ExportSink;

/// Message delivered to the consumer side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Chunk(Vec<u8>),
    End,
    Aborted(String),
}

/// How a stream ended, as seen by the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// `End` received: the document is complete.
    Completed(Vec<u8>),
    /// The producer reported a failure after sending `partial`.
    Aborted { partial: Vec<u8>, reason: String },
    /// The producer vanished without an end marker.
    Disconnected(Vec<u8>),
}

/// Create a bounded sink/receiver pair.
///
/// `capacity` is the number of chunks that may be queued before `send`
/// suspends.
pub fn channel(capacity: usize) -> (ChannelSink, ExportReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        ChannelSink {
            tx,
            bytes_written: 0,
            finished: false,
        },
        ExportReceiver { rx },
    )
}

/// Producer half of [`channel`].
pub struct ChannelSink {
    tx: mpsc::Sender<StreamEvent>,
    bytes_written: u64,
    finished: bool,
}

/// Consumer half of [`channel`]. Dropping it closes the sink.
pub struct ExportReceiver {
    rx: mpsc::Receiver<StreamEvent>,
}

#[async_trait]
impl ExportSink for ChannelSink {
    async fn send(&mut self, chunk: Vec<u8>) -> Result<()> {
        if self.finished {
            return Err(SinkError::Closed.into());
        }
        let len = chunk.len() as u64;
        self.tx
            .send(StreamEvent::Chunk(chunk))
            .await
            .map_err(|_| SinkError::Closed)?;
        self.bytes_written += len;
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.tx
            .send(StreamEvent::End)
            .await
            .map_err(|_| SinkError::Closed)?;
        Ok(())
    }

    async fn abort(&mut self, reason: &str) {
        if self.finished {
            return;
        }
        self.finished = true;
        if self
            .tx
            .send(StreamEvent::Aborted(reason.to_string()))
            .await
            .is_err()
        {
            debug!("Consumer gone before abort could be delivered");
        }
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

impl ExportReceiver {
    /// Receive the next event; `None` means the producer is gone.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }

    /// Drain the stream and report how it ended.
    pub async fn read_to_end(mut self) -> StreamOutcome {
        let mut body = Vec::new();
        while let Some(event) = self.rx.recv().await {
            match event {
                StreamEvent::Chunk(chunk) => body.extend_from_slice(&chunk),
                StreamEvent::End => return StreamOutcome::Completed(body),
                StreamEvent::Aborted(reason) => {
                    return StreamOutcome::Aborted {
                        partial: body,
                        reason,
                    };
                }
            }
        }
        StreamOutcome::Disconnected(body)
    }
}
