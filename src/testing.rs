//! In-memory collaborators for pipeline tests

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mongodb::bson::Document;

use crate::error::{Result, SinkError, StoreError};
use crate::form::Form;
use crate::query::Query;
use crate::sink::ExportSink;
use crate::store::{FormResolver, RecordCursor, RecordSource};

/// Shared counters observed by tests after an export.
#[derive(Debug, Default)]
pub(crate) struct SourceStats {
    pub opens: AtomicUsize,
    pub reads: AtomicU64,
    pub closes: AtomicUsize,
    pub last_query: Mutex<Option<Document>>,
}

impl SourceStats {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Whether any cursor was closed.
    pub fn closed(&self) -> bool {
        self.closes.load(Ordering::SeqCst) > 0
    }

    pub fn last_query(&self) -> Option<Document> {
        self.last_query.lock().ok().and_then(|q| q.clone())
    }
}

/// Record source serving a fixed list of documents.
pub(crate) struct MockSource {
    docs: Vec<Document>,
    fail_at: Option<u64>,
    pub stats: Arc<SourceStats>,
}

impl MockSource {
    pub fn new(docs: Vec<Document>) -> Self {
        Self {
            docs,
            fail_at: None,
            stats: Arc::new(SourceStats::default()),
        }
    }

    /// Fail the read with this zero-based index.
    pub fn failing_at(mut self, index: u64) -> Self {
        self.fail_at = Some(index);
        self
    }
}

#[async_trait]
impl RecordSource for MockSource {
    async fn open(&self, query: &Query) -> Result<Box<dyn RecordCursor>> {
        self.stats.opens.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.stats.last_query.lock() {
            *last = Some(query.filter().clone());
        }
        Ok(Box::new(MockCursor {
            docs: self.docs.iter().cloned().collect(),
            fail_at: self.fail_at,
            fetched: 0,
            closed: false,
            stats: Arc::clone(&self.stats),
        }))
    }
}

struct MockCursor {
    docs: VecDeque<Document>,
    fail_at: Option<u64>,
    fetched: u64,
    closed: bool,
    stats: Arc<SourceStats>,
}

#[async_trait]
impl RecordCursor for MockCursor {
    async fn next(&mut self) -> Result<Option<Document>> {
        if self.closed {
            return Ok(None);
        }
        if self.fail_at == Some(self.fetched) {
            return Err(StoreError::Decode("connection reset".into()).into());
        }
        let next = self.docs.pop_front();
        if next.is_some() {
            self.fetched += 1;
            self.stats.reads.fetch_add(1, Ordering::SeqCst);
        }
        Ok(next)
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.stats.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn fetched(&self) -> u64 {
        self.fetched
    }
}

/// Form lookup backed by a map.
#[derive(Default)]
pub(crate) struct MockForms {
    forms: HashMap<String, Form>,
}

impl MockForms {
    pub fn with(form: Form) -> Self {
        let mut forms = HashMap::new();
        forms.insert(form.id_string(), form);
        Self { forms }
    }
}

#[async_trait]
impl FormResolver for MockForms {
    async fn load_form(&self, form_id: &str) -> Result<Option<Form>> {
        Ok(self.forms.get(form_id).cloned())
    }
}

/// Sink collecting chunks in memory. With a limit it reports itself closed
/// once that many chunks were accepted, like a client that disconnects.
#[derive(Debug, Default)]
pub(crate) struct MemorySink {
    pub chunks: Vec<Vec<u8>>,
    pub finished: bool,
    pub aborted: Option<String>,
    limit: Option<usize>,
    bytes: u64,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn closing_after(chunks: usize) -> Self {
        Self {
            limit: Some(chunks),
            ..Self::default()
        }
    }

    pub fn body(&self) -> Vec<u8> {
        self.chunks.concat()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body()).into_owned()
    }
}

#[async_trait]
impl ExportSink for MemorySink {
    async fn send(&mut self, chunk: Vec<u8>) -> Result<()> {
        if self.is_closed() || self.finished {
            return Err(SinkError::Closed.into());
        }
        self.bytes += chunk.len() as u64;
        self.chunks.push(chunk);
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }

    async fn abort(&mut self, reason: &str) {
        self.aborted = Some(reason.to_string());
    }

    fn is_closed(&self) -> bool {
        self.limit.is_some_and(|limit| self.chunks.len() >= limit)
    }

    fn bytes_written(&self) -> u64 {
        self.bytes
    }
}
