//! Record store abstractions
//!
//! The pipeline never runs queries itself: it asks a [`RecordSource`] to
//! open a [`RecordCursor`] over an already-built [`Query`], then pulls one
//! record at a time. Forms are looked up through a [`FormResolver`].

pub mod mongo;

pub use mongo::{MongoFormStore, MongoRecordCursor, MongoSource, connect};

use async_trait::async_trait;
use mongodb::bson::Document;

use crate::error::Result;
use crate::form::Form;
use crate::query::Query;

/// Lazy, pull-based sequence of raw records.
///
/// Implementations hold at most one record on the pipeline side. Driver
/// level prefetching (one server batch) is allowed.
#[async_trait]
pub trait RecordCursor: Send {
    /// Fetch the next record, or `None` once the sequence is exhausted.
    async fn next(&mut self) -> Result<Option<Document>>;

    /// Release server-side resources. Safe to call more than once.
    async fn close(&mut self) -> Result<()>;

    /// Number of records handed out so far.
    fn fetched(&self) -> u64;
}

/// Opens cursors over the record store.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn open(&self, query: &Query) -> Result<Box<dyn RecordCursor>>;
}

/// Looks up form definitions.
#[async_trait]
pub trait FormResolver: Send + Sync {
    /// Load a non-deleted form by identifier.
    async fn load_form(&self, form_id: &str) -> Result<Option<Form>>;
}
