//! Export query construction
//!
//! The final filter is assembled in a fixed order:
//! 1. The caller's raw filter override, if present and valid, otherwise the
//!    filter derived from request parameters.
//! 2. Identifier coercion for `_id`, `form` and `owner` keys.
//! 3. A "not deleted" constraint unless the filter already has one.
//! 4. The form scope and, for unprivileged callers, the owner constraint.
//!    These overwrite caller values and are re-applied after hooks run.

pub mod params;

pub use params::derive_filter;

use mongodb::bson::{Bson, Document, doc, oid::ObjectId};
use tracing::{debug, warn};

/// Field holding the owning form of a submission.
pub const SCOPE_FIELD: &str = "form";
/// Field holding the soft-delete timestamp.
pub const DELETED_FIELD: &str = "deleted";
/// Field holding the submitting user.
pub const OWNER_FIELD: &str = "owner";

/// A resolved record filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    filter: Document,
}

impl Query {
    pub fn new(filter: Document) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> &Document {
        &self.filter
    }

    pub fn get(&self, key: &str) -> Option<&Bson> {
        self.filter.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Bson>) {
        self.filter.insert(key, value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Bson> {
        self.filter.remove(key)
    }

    pub fn into_document(self) -> Document {
        self.filter
    }
}

/// Builds export queries with non-overridable scope and owner constraints.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    scope: Bson,
    privileged: bool,
    owner: Bson,
}

impl QueryBuilder {
    /// # Arguments
    /// * `scope` - Form identifier every record must belong to
    /// * `privileged` - Whether the caller may read other owners' records
    /// * `owner` - Caller identity used for the owner constraint
    pub fn new(scope: impl Into<Bson>, privileged: bool, owner: impl Into<Bson>) -> Self {
        Self {
            scope: scope.into(),
            privileged,
            owner: owner.into(),
        }
    }

    /// Merge caller input into a final query.
    ///
    /// A malformed `raw_filter` is logged and ignored; the derived filter is
    /// used instead.
    pub fn build(&self, raw_filter: Option<&str>, derived: Document) -> Query {
        let mut filter = match raw_filter.map(parse_raw_filter) {
            Some(Ok(raw)) => raw,
            Some(Err(e)) => {
                warn!("Ignoring malformed query override: {}", e);
                derived
            }
            None => derived,
        };

        coerce_ids(&mut filter);

        if !filter.contains_key(DELETED_FIELD) {
            filter.insert(DELETED_FIELD, doc! { "$eq": Bson::Null });
        }

        let mut query = Query::new(filter);
        self.enforce(&mut query);
        query
    }

    /// Write the scope and owner constraints, overwriting whatever is there.
    pub fn enforce(&self, query: &mut Query) {
        query.insert(SCOPE_FIELD, self.scope.clone());
        if !self.privileged {
            query.insert(OWNER_FIELD, self.owner.clone());
        }
        debug!("Export query: {}", query.filter());
    }
}

/// Parse a JSON filter override. It must be a JSON object.
pub fn parse_raw_filter(text: &str) -> Result<Document, String> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    if !value.is_object() {
        return Err("query override must be a JSON object".to_string());
    }
    mongodb::bson::to_document(&value).map_err(|e| e.to_string())
}

/// Turn an identifier string into an ObjectId when it looks like one.
pub fn coerce_id(id: &str) -> Bson {
    match ObjectId::parse_str(id) {
        Ok(oid) => Bson::ObjectId(oid),
        Err(_) => Bson::String(id.to_string()),
    }
}

fn is_id_key(key: &str) -> bool {
    let last = key.rsplit('.').next().unwrap_or(key);
    matches!(last, "_id" | "form" | "owner")
}

/// Convert identifier strings to ObjectIds under `_id`, `form` and `owner`
/// keys, including inside operators and logical combinators.
fn coerce_ids(filter: &mut Document) {
    for (key, value) in filter.iter_mut() {
        if is_id_key(key) {
            coerce_id_value(value);
        } else if key.starts_with('$')
            && let Bson::Array(clauses) = value
        {
            for clause in clauses {
                if let Bson::Document(nested) = clause {
                    coerce_ids(nested);
                }
            }
        }
    }
}

fn coerce_id_value(value: &mut Bson) {
    match value {
        Bson::String(s) => {
            if let Ok(oid) = ObjectId::parse_str(s.as_str()) {
                *value = Bson::ObjectId(oid);
            }
        }
        Bson::Array(items) => items.iter_mut().for_each(coerce_id_value),
        Bson::Document(ops) => {
            for (op, operand) in ops.iter_mut() {
                if op.starts_with('$') {
                    coerce_id_value(operand);
                }
            }
        }
        _ => {}
    }
}
