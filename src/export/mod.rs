//! Export pipeline orchestration
//!
//! [`ExportCoordinator`] ties the stages together for one request:
//! request validation, query building, the `alter_export` hook, encoder
//! initialisation, then a record-at-a-time loop from cursor through
//! transformer and encoder into the sink.

pub mod coordinator;
pub mod progress;
pub mod session;

pub use coordinator::{ExportCoordinator, ExportRequest, ExportSettings, ExportSummary};
pub use progress::ProgressTracker;
pub use session::{ExportSession, ExportState};
