//! Protected field redaction

use std::fmt;

use tracing::debug;

use crate::form::Form;
use crate::hooks::HookRegistry;
use crate::record::{FieldValue, Record};

/// Context a redaction set is resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldContext {
    Export,
}

impl fmt::Display for FieldContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldContext::Export => write!(f, "export"),
        }
    }
}

/// Paths, relative to the record root, that must never reach an encoder.
///
/// A path step that lands on a sequence applies the rest of the path to
/// every element, so a protected grid column is removed from each row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtectedFieldSet {
    paths: Vec<Vec<String>>,
}

impl ProtectedFieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the form's protected components plus whatever hooks add.
    pub fn resolve(form: &Form, context: FieldContext, hooks: &HookRegistry) -> Self {
        let mut set = Self::new();
        for field in form.data_fields().into_iter().filter(|f| f.protected) {
            set.insert(std::iter::once("data".to_string()).chain(field.path));
        }
        hooks.protected_fields(form, context, &mut set);

        debug!(
            "Resolved {} protected field(s) for form {} ({})",
            set.len(),
            form.id_string(),
            context
        );
        set
    }

    pub fn insert<I, S>(&mut self, path: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let path: Vec<String> = path.into_iter().map(Into::into).collect();
        if path.is_empty() || self.paths.contains(&path) {
            return;
        }
        // A protected parent already covers its children.
        self.paths.retain(|p| !p.starts_with(&path));
        if self.paths.iter().any(|p| path.starts_with(p)) {
            return;
        }
        self.paths.push(path);
    }

    pub fn contains<S: AsRef<str>>(&self, path: &[S]) -> bool {
        self.paths.iter().any(|p| {
            p.len() == path.len() && p.iter().zip(path).all(|(a, b)| a == b.as_ref())
        })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Remove every protected path from the record.
    pub fn apply(&self, record: &mut Record) {
        for path in &self.paths {
            remove_path(record, path);
        }
    }
}

fn remove_path(record: &mut Record, path: &[String]) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };

    if rest.is_empty() {
        record.remove(first);
        return;
    }

    if let Some(value) = record.get_mut(first) {
        remove_from_value(value, rest);
    }
}

fn remove_from_value(value: &mut FieldValue, path: &[String]) {
    match value {
        FieldValue::Record(nested) => remove_path(nested, path),
        FieldValue::Sequence(items) => {
            for item in items {
                remove_from_value(item, path);
            }
        }
        FieldValue::Scalar(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::tests::sample_form;
    use mongodb::bson::doc;

    #[test]
    fn test_resolve_from_form() {
        let set = ProtectedFieldSet::resolve(&sample_form(), FieldContext::Export, &HookRegistry::new());

        assert_eq!(set.len(), 3);
        assert!(set.contains(&["data", "secret"]));
        assert!(set.contains(&["data", "address", "pin"]));
        assert!(set.contains(&["data", "items", "cost"]));
    }

    #[test]
    fn test_apply_at_every_level() {
        let set = ProtectedFieldSet::resolve(&sample_form(), FieldContext::Export, &HookRegistry::new());
        let mut record = Record::from_document(
            doc! {
                "_id": "1",
                "data": {
                    "name": "Alice",
                    "secret": "hunter2",
                    "address": { "city": "Oslo", "pin": "1234" },
                    "items": [ { "sku": "A", "cost": 3 }, { "sku": "B", "cost": 4 } ],
                }
            },
            8,
        )
        .unwrap();

        set.apply(&mut record);

        assert_eq!(
            record.into_document(),
            doc! {
                "_id": "1",
                "data": {
                    "name": "Alice",
                    "address": { "city": "Oslo" },
                    "items": [ { "sku": "A" }, { "sku": "B" } ],
                }
            }
        );
    }

    #[test]
    fn test_apply_tolerates_missing_and_scalar_paths() {
        let mut set = ProtectedFieldSet::new();
        set.insert(["data", "address", "pin"]);

        let mut record = Record::from_document(doc! { "data": { "address": "n/a" } }, 8).unwrap();
        set.apply(&mut record);
        assert_eq!(record.into_document(), doc! { "data": { "address": "n/a" } });

        let mut record = Record::from_document(doc! { "other": 1 }, 8).unwrap();
        set.apply(&mut record);
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_parent_path_subsumes_children() {
        let mut set = ProtectedFieldSet::new();
        set.insert(["data", "address", "pin"]);
        set.insert(["data", "address"]);
        set.insert(["data", "address", "city"]);
        set.insert(["data", "address"]);

        assert_eq!(set.len(), 1);
        assert!(set.contains(&["data", "address"]));
    }
}
