//! Reference URL resolution for linked sub-records

use crate::form::Form;
use crate::hooks::HookRegistry;
use crate::record::{Record, id_to_string};

/// Field naming the collection a sub-record belongs to.
pub const COLLECTION_FIELD: &str = "form";

/// Builds the `url` attribute for linked sub-records.
#[derive(Debug, Clone, Copy)]
pub struct LinkResolver<'a> {
    api_host: &'a str,
    hooks: &'a HookRegistry,
}

impl<'a> LinkResolver<'a> {
    pub fn new(api_host: &'a str, hooks: &'a HookRegistry) -> Self {
        Self { api_host, hooks }
    }

    /// Canonical retrieval path for a stored record.
    pub fn default_path(collection_id: &str, record_id: &str) -> String {
        format!("/form/{collection_id}/submission/{record_id}")
    }

    /// URL for a sub-record, or `None` when it lacks an identity or a
    /// collection to resolve against.
    pub fn resolve(&self, parent_form: &Form, field: &Record) -> Option<String> {
        let id = id_to_string(field.identity()?);
        let collection = id_to_string(field.get(COLLECTION_FIELD)?.as_scalar()?);

        let path = self.hooks.field_url(
            Self::default_path(&collection, &id),
            parent_form,
            field,
        );
        Some(join_url(self.api_host, &path))
    }
}

/// Join a host and a path, keeping any path already on the host. Absolute
/// URLs and an empty host leave `path` unchanged.
pub fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") || base.is_empty() {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
