//! Export coordinator
//!
//! Drives one export from request to finished stream. Everything up to and
//! including `Encoder::init` happens before a cursor exists; failures there
//! leave the store untouched. After the cursor opens, the only way to report
//! a failure to the consumer is `ExportSink::abort`.

use std::sync::Arc;

use mongodb::bson::{Bson, Document};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ExportConfig;
use crate::encoder::{Encoder, ExportFormat, create_encoder};
use crate::error::{ConfigurationError, ExportError, Result, SinkError};
use crate::form::Form;
use crate::hooks::HookRegistry;
use crate::query::{Query, QueryBuilder, coerce_id};
use crate::record::Record;
use crate::sink::ExportSink;
use crate::store::{FormResolver, RecordCursor, RecordSource};
use crate::transform::{
    FieldContext, LinkResolver, ProtectedFieldSet, RecordErrorPolicy, RowTransformer,
};

use super::progress::ProgressTracker;
use super::session::{ExportSession, ExportState};

/// Pipeline settings shared by every export a coordinator runs
#[derive(Debug, Clone)]
pub struct ExportSettings {
    /// Base URL for link injection
    pub api_host: String,
    /// Maximum record nesting depth
    pub max_depth: usize,
    pub on_record_error: RecordErrorPolicy,
    /// Format used when the request names none
    pub default_format: ExportFormat,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self::from(&ExportConfig::default())
    }
}

impl From<&ExportConfig> for ExportSettings {
    fn from(config: &ExportConfig) -> Self {
        Self {
            api_host: config.api_host.clone(),
            max_depth: config.max_depth,
            on_record_error: config.on_record_error,
            default_format: config.default_format,
        }
    }
}

/// One export request
#[derive(Debug, Clone, Default)]
pub struct ExportRequest {
    /// Form whose submissions are exported
    pub form_id: String,
    /// JSON filter that replaces the derived filter when well-formed
    pub raw_filter: Option<String>,
    /// Filter derived from request parameters
    pub derived_filter: Document,
    /// Requested format name; `None` uses the configured default
    pub format: Option<String>,
    /// Whether the caller may read every owner's records
    pub privileged: bool,
    /// Caller identity
    pub owner_id: Option<String>,
}

impl ExportRequest {
    pub fn new(form_id: impl Into<String>) -> Self {
        Self {
            form_id: form_id.into(),
            ..Self::default()
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_raw_filter(mut self, filter: impl Into<String>) -> Self {
        self.raw_filter = Some(filter.into());
        self
    }

    pub fn with_derived_filter(mut self, filter: Document) -> Self {
        self.derived_filter = filter;
        self
    }

    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }
}

/// Result of an export operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub session_id: Uuid,
    pub format: ExportFormat,
    /// Records pulled from the cursor
    pub records_read: u64,
    /// Records handed to the encoder
    pub records_written: u64,
    /// Records dropped by the skip policy
    pub records_skipped: u64,
    pub bytes_written: u64,
    pub elapsed_ms: u64,
    /// Whether the consumer went away or the export was cancelled
    pub cancelled: bool,
}

/// How the streaming loop ended without an error
enum StreamEnd {
    Exhausted,
    Cancelled,
}

/// Everything prepared before the cursor opens
struct Prepared {
    form: Form,
    query: Query,
    encoder: Box<dyn Encoder>,
    protected: ProtectedFieldSet,
}

/// Coordinator for export operations
///
/// Holds only read-only collaborators, so one coordinator can serve many
/// concurrent exports; each call to [`export`](Self::export) owns its own
/// cursor, encoder and session.
pub struct ExportCoordinator {
    forms: Arc<dyn FormResolver>,
    source: Arc<dyn RecordSource>,
    hooks: HookRegistry,
    settings: ExportSettings,
    cancel_token: Option<CancellationToken>,
    show_progress: bool,
}

impl ExportCoordinator {
    pub fn new(forms: Arc<dyn FormResolver>, source: Arc<dyn RecordSource>) -> Self {
        Self {
            forms,
            source,
            hooks: HookRegistry::new(),
            settings: ExportSettings::default(),
            cancel_token: None,
            show_progress: false,
        }
    }

    pub fn with_settings(mut self, settings: ExportSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    /// Set cancellation token checked before every record
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Show a progress spinner on stderr
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Run one export into `sink`.
    ///
    /// Errors returned before anything was sent leave the sink untouched.
    /// Errors after streaming started have already been reported to the
    /// sink through `abort`.
    pub async fn export(
        &self,
        request: ExportRequest,
        sink: &mut dyn ExportSink,
    ) -> Result<ExportSummary> {
        let mut session = ExportSession::new(&request.form_id, request.privileged);
        session.transition(ExportState::Initializing);

        let result = self.run(&request, sink, &mut session).await;
        match &result {
            Ok(summary) if summary.cancelled => session.transition(ExportState::Cancelled),
            Ok(_) => session.transition(ExportState::Completed),
            Err(e) => {
                warn!(session = %session.id(), "Export failed: {}", e);
                session.transition(ExportState::Failed);
            }
        }
        result
    }

    async fn run(
        &self,
        request: &ExportRequest,
        sink: &mut dyn ExportSink,
        session: &mut ExportSession,
    ) -> Result<ExportSummary> {
        let Prepared {
            form,
            query,
            mut encoder,
            protected,
        } = self.prepare(request).await?;
        session.set_format(encoder.format());

        // Preamble goes out before the cursor opens; a refusal here is clean.
        encoder.init(sink).await.map_err(|e| match e {
            ExportError::Encoding(inner) => ExportError::EncoderInit(inner),
            other => other,
        })?;

        let format = encoder.format();
        let mut cursor = match self.source.open(&query).await {
            Ok(cursor) => cursor,
            Err(e) => {
                sink.abort(&e.to_string()).await;
                return Err(e);
            }
        };
        session.transition(ExportState::Streaming);

        let transformer = RowTransformer::new(
            &form,
            &protected,
            LinkResolver::new(&self.settings.api_host, &self.hooks),
            self.settings.max_depth,
        );
        let tracker = ProgressTracker::new(self.show_progress);

        let streamed = self
            .stream(
                cursor.as_mut(),
                &transformer,
                encoder.as_mut(),
                sink,
                session,
                &tracker,
            )
            .await;

        if let Err(e) = cursor.close().await {
            warn!(session = %session.id(), "Failed to close cursor: {}", e);
        }
        tracker.finish();

        let cancelled = match streamed {
            Ok(StreamEnd::Exhausted) => {
                if let Err(e) = encoder.finish(sink).await {
                    sink.abort(&e.to_string()).await;
                    return Err(e);
                }
                false
            }
            Ok(StreamEnd::Cancelled) => {
                sink.abort("export cancelled").await;
                true
            }
            Err(e) => {
                sink.abort(&e.to_string()).await;
                return Err(e);
            }
        };

        Ok(ExportSummary {
            session_id: session.id(),
            format,
            records_read: session.records_read(),
            records_written: session.records_written(),
            records_skipped: session.records_skipped(),
            bytes_written: sink.bytes_written(),
            elapsed_ms: session.elapsed_ms(),
            cancelled,
        })
    }

    /// Validate the request and build query, encoder and redaction set.
    async fn prepare(&self, request: &ExportRequest) -> Result<Prepared> {
        let owner = match (&request.owner_id, request.privileged) {
            (Some(id), _) => coerce_id(id),
            (None, true) => Bson::Null,
            (None, false) => return Err(ConfigurationError::MissingIdentity.into()),
        };

        let format = match &request.format {
            Some(name) => name.parse::<ExportFormat>()?,
            None => self.settings.default_format,
        };

        let form = self
            .forms
            .load_form(&request.form_id)
            .await?
            .ok_or_else(|| ExportError::FormNotFound(request.form_id.clone()))?;

        let builder = QueryBuilder::new(form.id.clone(), request.privileged, owner);
        let mut query = builder.build(
            request.raw_filter.as_deref(),
            request.derived_filter.clone(),
        );

        let mut encoder = create_encoder(format, &form);
        self.hooks.alter_export(&mut query, &form, encoder.as_mut())?;
        builder.enforce(&mut query);

        let protected = ProtectedFieldSet::resolve(&form, FieldContext::Export, &self.hooks);
        debug!(
            form = %form.id_string(),
            %format,
            protected = protected.len(),
            "Export prepared"
        );

        Ok(Prepared {
            form,
            query,
            encoder,
            protected,
        })
    }

    async fn stream(
        &self,
        cursor: &mut dyn RecordCursor,
        transformer: &RowTransformer<'_>,
        encoder: &mut dyn Encoder,
        sink: &mut dyn ExportSink,
        session: &mut ExportSession,
        tracker: &ProgressTracker,
    ) -> Result<StreamEnd> {
        loop {
            if sink.is_closed() {
                info!(session = %session.id(), "Consumer went away, stopping export");
                return Ok(StreamEnd::Cancelled);
            }
            if let Some(ref token) = self.cancel_token
                && token.is_cancelled()
            {
                info!(session = %session.id(), "Export cancelled");
                return Ok(StreamEnd::Cancelled);
            }

            let Some(doc) = cursor.next().await? else {
                debug!(session = %session.id(), fetched = cursor.fetched(), "Cursor exhausted");
                return Ok(StreamEnd::Exhausted);
            };
            session.record_read();

            let transformed = Record::from_document(doc, self.settings.max_depth)
                .and_then(|record| transformer.transform(record));
            let record = match transformed {
                Ok(record) => record,
                Err(e) => match self.settings.on_record_error {
                    RecordErrorPolicy::Skip => {
                        warn!(session = %session.id(), "Skipping record: {}", e);
                        session.record_skipped();
                        continue;
                    }
                    RecordErrorPolicy::Abort => return Err(e.into()),
                },
            };

            match encoder.write_record(&record, sink).await {
                Ok(()) => {}
                Err(ExportError::Sink(SinkError::Closed)) => {
                    info!(session = %session.id(), "Consumer closed the stream");
                    return Ok(StreamEnd::Cancelled);
                }
                Err(e) => return Err(e),
            }

            session.record_written();
            tracker.update(session.records_written());
        }
    }
}
