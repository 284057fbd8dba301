//! Per-export bookkeeping

use std::fmt;
use std::time::Instant;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::encoder::ExportFormat;

/// Lifecycle of one export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    /// Validating the request and preparing query, encoder and redactions
    Initializing,
    /// Cursor open, records flowing to the sink
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

impl ExportState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExportState::Completed | ExportState::Cancelled | ExportState::Failed
        )
    }
}

impl fmt::Display for ExportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportState::Idle => "idle",
            ExportState::Initializing => "initializing",
            ExportState::Streaming => "streaming",
            ExportState::Completed => "completed",
            ExportState::Cancelled => "cancelled",
            ExportState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// State and counters of a single export. Owned by the task running it.
#[derive(Debug)]
pub struct ExportSession {
    id: Uuid,
    form_id: String,
    /// Whether the export ignores record ownership
    privileged: bool,
    /// Known once the request is validated
    format: Option<ExportFormat>,
    state: ExportState,
    started: Instant,
    records_read: u64,
    records_written: u64,
    records_skipped: u64,
}

impl ExportSession {
    pub fn new(form_id: impl Into<String>, privileged: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            form_id: form_id.into(),
            privileged,
            format: None,
            state: ExportState::Idle,
            started: Instant::now(),
            records_read: 0,
            records_written: 0,
            records_skipped: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> ExportState {
        self.state
    }

    pub fn privileged(&self) -> bool {
        self.privileged
    }

    pub fn format(&self) -> Option<ExportFormat> {
        self.format
    }

    pub fn set_format(&mut self, format: ExportFormat) {
        self.format = Some(format);
    }

    /// Move to `next`. Leaving a terminal state is ignored.
    pub fn transition(&mut self, next: ExportState) {
        if self.state.is_terminal() {
            warn!(
                session = %self.id,
                "Ignoring transition {} -> {}", self.state, next
            );
            return;
        }
        debug!(session = %self.id, form = %self.form_id, "{} -> {}", self.state, next);
        self.state = next;

        if next.is_terminal() {
            let format = self.format.map(|f| f.to_string()).unwrap_or_default();
            info!(
                session = %self.id,
                form = %self.form_id,
                %format,
                privileged = self.privileged,
                read = self.records_read,
                written = self.records_written,
                skipped = self.records_skipped,
                elapsed_ms = self.elapsed_ms(),
                "Export {}",
                next
            );
        }
    }

    pub fn record_read(&mut self) {
        self.records_read += 1;
    }

    pub fn record_written(&mut self) {
        self.records_written += 1;
    }

    pub fn record_skipped(&mut self) {
        self.records_skipped += 1;
    }

    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    pub fn records_skipped(&self) -> u64 {
        self.records_skipped
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_stop_at_terminal_state() {
        let mut session = ExportSession::new("5", false);
        assert_eq!(session.state(), ExportState::Idle);

        session.transition(ExportState::Initializing);
        session.transition(ExportState::Streaming);
        session.transition(ExportState::Completed);
        session.transition(ExportState::Failed);

        assert_eq!(session.state(), ExportState::Completed);
    }

    #[test]
    fn test_counters() {
        let mut session = ExportSession::new("5", false);
        session.record_read();
        session.record_read();
        session.record_written();
        session.record_skipped();

        assert_eq!(session.records_read(), 2);
        assert_eq!(session.records_written(), 1);
        assert_eq!(session.records_skipped(), 1);
    }

    #[test]
    fn test_sessions_have_distinct_ids() {
        assert_ne!(ExportSession::new("a", false).id(), ExportSession::new("a", false).id());
    }

    #[test]
    fn test_session_records_request_shape() {
        let mut session = ExportSession::new("5", true);
        assert!(session.privileged());
        assert_eq!(session.format(), None);

        session.set_format(ExportFormat::Csv);
        session.transition(ExportState::Initializing);
        session.transition(ExportState::Completed);

        assert_eq!(session.format(), Some(ExportFormat::Csv));
        assert!(!ExportSession::new("5", false).privileged());
    }
}
