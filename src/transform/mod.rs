//! Per-record transformation
//!
//! Each record passes through two stages, in order:
//! 1. Link injection: every nested record with an identity gets a `url`
//!    attribute pointing at its canonical retrieval endpoint. Parents are
//!    linked before their children (pre-order).
//! 2. Redaction: fields protected in the export context are removed.
//!
//! Nesting is bounded by `max_depth`; deeper records fail with
//! [`TransformError::DepthExceeded`] instead of recursing further.

pub mod links;
pub mod redact;

pub use links::{LinkResolver, join_url};
pub use redact::{FieldContext, ProtectedFieldSet};

use serde::{Deserialize, Serialize};

use crate::error::TransformError;
use crate::form::Form;
use crate::record::{FieldValue, Record};

/// Name of the attribute link injection adds.
pub const URL_FIELD: &str = "url";

/// What to do with a record that fails to transform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordErrorPolicy {
    /// Log the failure and continue with the next record.
    #[default]
    Skip,
    /// Stop the export.
    Abort,
}

/// Applies link injection and redaction to one record at a time.
///
/// The transformer only borrows export-wide state (form, redaction set,
/// hooks), so one instance serves a whole export and the borrowed parts can
/// be shared read-only across concurrent exports.
pub struct RowTransformer<'a> {
    form: &'a Form,
    protected: &'a ProtectedFieldSet,
    links: LinkResolver<'a>,
    max_depth: usize,
}

impl<'a> RowTransformer<'a> {
    pub fn new(
        form: &'a Form,
        protected: &'a ProtectedFieldSet,
        links: LinkResolver<'a>,
        max_depth: usize,
    ) -> Self {
        Self {
            form,
            protected,
            links,
            max_depth,
        }
    }

    /// Transform a record. Ownership passes in and back out.
    pub fn transform(&self, mut record: Record) -> Result<Record, TransformError> {
        self.inject_links(&mut record, 0)?;
        self.protected.apply(&mut record);
        Ok(record)
    }

    fn inject_links(&self, record: &mut Record, depth: usize) -> Result<(), TransformError> {
        if depth > self.max_depth {
            return Err(TransformError::DepthExceeded {
                limit: self.max_depth,
            });
        }

        for (_, value) in record.iter_mut() {
            self.visit(value, depth + 1)?;
        }
        Ok(())
    }

    fn visit(&self, value: &mut FieldValue, depth: usize) -> Result<(), TransformError> {
        match value {
            FieldValue::Record(nested) => {
                if let Some(url) = self.links.resolve(self.form, nested) {
                    nested.insert(URL_FIELD, mongodb::bson::Bson::String(url));
                }
                self.inject_links(nested, depth)
            }
            FieldValue::Sequence(items) => {
                if depth > self.max_depth {
                    return Err(TransformError::DepthExceeded {
                        limit: self.max_depth,
                    });
                }
                items.iter_mut().try_for_each(|item| self.visit(item, depth + 1))
            }
            FieldValue::Scalar(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::tests::sample_form;
    use crate::hooks::HookRegistry;
    use mongodb::bson::{Document, doc};

    fn run(doc: Document, max_depth: usize) -> Result<Document, TransformError> {
        let form = sample_form();
        let hooks = HookRegistry::new();
        let protected = ProtectedFieldSet::resolve(&form, FieldContext::Export, &hooks);
        let transformer = RowTransformer::new(
            &form,
            &protected,
            LinkResolver::new("http://api.test", &hooks),
            max_depth,
        );
        let record = Record::from_document(doc, 64).unwrap();
        transformer.transform(record).map(Record::into_document)
    }

    #[test]
    fn test_links_nested_sub_record() {
        let out = run(
            doc! {
                "_id": "1",
                "data": { "customer": { "_id": "42", "form": "5", "data": { "name": "Bob" } } }
            },
            8,
        )
        .unwrap();

        assert_eq!(
            out,
            doc! {
                "_id": "1",
                "data": {
                    "customer": {
                        "_id": "42",
                        "form": "5",
                        "data": { "name": "Bob" },
                        "url": "http://api.test/form/5/submission/42",
                    }
                }
            }
        );
    }

    #[test]
    fn test_links_recurse_into_linked_data_and_sequences() {
        let out = run(
            doc! {
                "data": {
                    "order": {
                        "_id": "10", "form": "7",
                        "data": { "buyer": { "_id": "11", "form": "8" } }
                    },
                    "tags": [ { "_id": "12", "form": "9" }, "plain" ],
                }
            },
            8,
        )
        .unwrap();

        let data = out.get_document("data").unwrap();
        let order = data.get_document("order").unwrap();
        assert_eq!(order.get_str("url").unwrap(), "http://api.test/form/7/submission/10");
        let buyer = order.get_document("data").unwrap().get_document("buyer").unwrap();
        assert_eq!(buyer.get_str("url").unwrap(), "http://api.test/form/8/submission/11");
        let tags = data.get_array("tags").unwrap();
        assert_eq!(
            tags[0].as_document().unwrap().get_str("url").unwrap(),
            "http://api.test/form/9/submission/12"
        );
        assert_eq!(tags[1].as_str(), Some("plain"));
    }

    #[test]
    fn test_root_is_not_linked() {
        let out = run(doc! { "_id": "1", "form": "5", "data": {} }, 8).unwrap();
        assert!(!out.contains_key("url"));
    }

    #[test]
    fn test_redaction_after_linking() {
        let out = run(
            doc! { "data": { "name": "A", "secret": { "_id": "3", "form": "5" } } },
            8,
        )
        .unwrap();
        assert_eq!(out, doc! { "data": { "name": "A" } });
    }

    #[test]
    fn test_depth_exceeded() {
        let mut doc = doc! { "leaf": 1 };
        for _ in 0..10 {
            doc = doc! { "child": doc };
        }

        assert_eq!(
            run(doc.clone(), 4).unwrap_err(),
            TransformError::DepthExceeded { limit: 4 }
        );
        assert!(run(doc, 10).is_ok());
    }

    #[test]
    fn test_policy_deserializes_lowercase() {
        let policy: RecordErrorPolicy = serde_json::from_str("\"abort\"").unwrap();
        assert_eq!(policy, RecordErrorPolicy::Abort);
        assert_eq!(RecordErrorPolicy::default(), RecordErrorPolicy::Skip);
    }
}
