//! Extension hooks
//!
//! Hooks are registered once and invoked at fixed pipeline stages:
//! - `alter_export`: once per export, before any record is read. May rewrite
//!   the query, inspect the encoder, or veto the export. Scope and owner
//!   constraints are re-applied afterwards, so a hook cannot widen access.
//! - `alter_field_url`: once per linked sub-record, returning the path or
//!   URL to attach.
//! - `protected_fields`: once per export, to add context-specific redactions.

use std::sync::Arc;

use tracing::debug;

use crate::encoder::Encoder;
use crate::error::VetoError;
use crate::form::Form;
use crate::query::Query;
use crate::record::Record;
use crate::transform::{FieldContext, ProtectedFieldSet};

/// A pipeline extension. Every method defaults to a no-op.
pub trait ExportHook: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str {
        "anonymous"
    }

    fn alter_export(
        &self,
        _query: &mut Query,
        _form: &Form,
        _encoder: &mut dyn Encoder,
    ) -> Result<(), VetoError> {
        Ok(())
    }

    fn alter_field_url(&self, url: String, _form: &Form, _field: &Record) -> String {
        url
    }

    fn protected_fields(
        &self,
        _form: &Form,
        _context: FieldContext,
        _fields: &mut ProtectedFieldSet,
    ) {
    }
}

/// Ordered set of registered hooks.
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: Vec<Arc<dyn ExportHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: Arc<dyn ExportHook>) {
        debug!("Registered export hook: {}", hook.name());
        self.hooks.push(hook);
    }

    pub fn with(mut self, hook: Arc<dyn ExportHook>) -> Self {
        self.register(hook);
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run every `alter_export` hook in order; the first veto stops the chain.
    pub fn alter_export(
        &self,
        query: &mut Query,
        form: &Form,
        encoder: &mut dyn Encoder,
    ) -> Result<(), VetoError> {
        for hook in &self.hooks {
            hook.alter_export(query, form, encoder).inspect_err(|e| {
                debug!("Export vetoed by hook {}: {}", hook.name(), e);
            })?;
        }
        Ok(())
    }

    /// Thread a default URL through every `alter_field_url` hook.
    pub fn field_url(&self, default_url: String, form: &Form, field: &Record) -> String {
        self.hooks
            .iter()
            .fold(default_url, |url, hook| hook.alter_field_url(url, form, field))
    }

    pub fn protected_fields(
        &self,
        form: &Form,
        context: FieldContext,
        fields: &mut ProtectedFieldSet,
    ) {
        for hook in &self.hooks {
            hook.protected_fields(form, context, fields);
        }
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.hooks.iter().map(|h| h.name()).collect();
        f.debug_struct("HookRegistry").field("hooks", &names).finish()
    }
}
