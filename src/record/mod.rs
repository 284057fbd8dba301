//! Dynamically-shaped submission records
//!
//! Stored submissions have no compile-time schema: any field may hold a
//! scalar, a nested sub-resource, or a list of either. Records are
//! converted from raw BSON once, with a depth cap, so every later pass
//! (link injection, redaction, encoding) walks a bounded tree.

use mongodb::bson::{Bson, Document};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::encoder::convert::{BsonConverter, JsonConverter};
use crate::error::TransformError;

/// Name of the identity attribute that makes a record linkable.
pub const IDENTITY_FIELD: &str = "_id";

/// A single field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Any non-document, non-array BSON value.
    Scalar(Bson),
    /// A nested record (sub-resource, container, ...).
    Record(Record),
    /// A list of values, typically records from a grid or multi-select.
    Sequence(Vec<FieldValue>),
}

/// An insertion-ordered mapping of field name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, FieldValue)>,
}

impl FieldValue {
    /// Nested record, if this is one.
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            FieldValue::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Bson> {
        match self {
            FieldValue::Scalar(value) => Some(value),
            _ => None,
        }
    }

    fn from_bson(value: Bson, depth: usize, max_depth: usize) -> Result<Self, TransformError> {
        match value {
            Bson::Document(doc) => Ok(FieldValue::Record(Record::from_document_at(
                doc,
                depth + 1,
                max_depth,
            )?)),
            Bson::Array(items) => {
                if depth + 1 > max_depth {
                    return Err(TransformError::DepthExceeded { limit: max_depth });
                }
                items
                    .into_iter()
                    .map(|item| FieldValue::from_bson(item, depth + 1, max_depth))
                    .collect::<Result<Vec<_>, _>>()
                    .map(FieldValue::Sequence)
            }
            scalar => Ok(FieldValue::Scalar(scalar)),
        }
    }

    fn into_bson(self) -> Bson {
        match self {
            FieldValue::Scalar(value) => value,
            FieldValue::Record(record) => Bson::Document(record.into_document()),
            FieldValue::Sequence(items) => {
                Bson::Array(items.into_iter().map(FieldValue::into_bson).collect())
            }
        }
    }
}

impl From<Bson> for FieldValue {
    /// Wrap a scalar. Documents and arrays should go through
    /// [`Record::from_document`] so the depth cap applies.
    fn from(value: Bson) -> Self {
        FieldValue::Scalar(value)
    }
}

impl From<Record> for FieldValue {
    fn from(record: Record) -> Self {
        FieldValue::Record(record)
    }
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a raw store document, failing when nesting goes past `max_depth`.
    pub fn from_document(doc: Document, max_depth: usize) -> Result<Self, TransformError> {
        Self::from_document_at(doc, 0, max_depth)
    }

    fn from_document_at(
        doc: Document,
        depth: usize,
        max_depth: usize,
    ) -> Result<Self, TransformError> {
        if depth > max_depth {
            return Err(TransformError::DepthExceeded { limit: max_depth });
        }

        let mut fields = Vec::with_capacity(doc.len());
        for (key, value) in doc {
            fields.push((key, FieldValue::from_bson(value, depth, max_depth)?));
        }
        Ok(Self { fields })
    }

    pub fn into_document(self) -> Document {
        self.fields
            .into_iter()
            .map(|(key, value)| (key, value.into_bson()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut FieldValue> {
        self.fields
            .iter_mut()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Follow a path of field names through nested records.
    pub fn get_path<S: AsRef<str>>(&self, path: &[S]) -> Option<&FieldValue> {
        let (first, rest) = path.split_first()?;
        let value = self.get(first.as_ref())?;
        if rest.is_empty() {
            Some(value)
        } else {
            value.as_record()?.get_path(rest)
        }
    }

    /// Set a field, replacing an existing value in place or appending.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        let name = name.into();
        let value = value.into();
        match self.get_mut(&name) {
            Some(slot) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        let index = self.fields.iter().position(|(k, _)| k == name)?;
        Some(self.fields.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut FieldValue)> {
        self.fields.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    /// The identity attribute, if this record has a non-null one.
    pub fn identity(&self) -> Option<&Bson> {
        match self.get(IDENTITY_FIELD)?.as_scalar()? {
            Bson::Null | Bson::Undefined => None,
            id => Some(id),
        }
    }
}

/// Render an identifier the way it appears in URLs.
pub fn id_to_string(value: &Bson) -> String {
    match value {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s.clone(),
        other => JsonConverter.convert(other).to_string(),
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Scalar(value) => JsonConverter.convert(value).serialize(serializer),
            FieldValue::Record(record) => record.serialize(serializer),
            FieldValue::Sequence(items) => serializer.collect_seq(items),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{doc, oid::ObjectId};

    fn nested(levels: usize) -> Document {
        let mut doc = doc! { "leaf": true };
        for _ in 0..levels {
            doc = doc! { "child": doc };
        }
        doc
    }

    #[test]
    fn test_from_document_preserves_order() {
        let record = Record::from_document(doc! { "b": 1, "a": 2, "c": 3 }, 8).unwrap();
        let keys: Vec<&str> = record.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_depth_cap() {
        assert!(Record::from_document(nested(4), 4).is_ok());
        assert_eq!(
            Record::from_document(nested(5), 4).unwrap_err(),
            TransformError::DepthExceeded { limit: 4 }
        );
    }

    #[test]
    fn test_arrays_count_toward_depth() {
        let doc = doc! { "grid": [ { "row": [ { "x": 1 } ] } ] };
        assert!(Record::from_document(doc.clone(), 4).is_ok());
        assert!(Record::from_document(doc, 3).is_err());
    }

    #[test]
    fn test_document_round_trip() {
        let original = doc! {
            "_id": ObjectId::new(),
            "data": { "name": "Alice", "tags": ["a", "b"], "items": [{ "qty": 2 }] },
        };
        let record = Record::from_document(original.clone(), 8).unwrap();
        assert_eq!(record.into_document(), original);
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut record = Record::from_document(doc! { "a": 1, "b": 2 }, 8).unwrap();
        record.insert("a", Bson::from(10));
        record.insert("c", Bson::from(3));

        assert_eq!(record.into_document(), doc! { "a": 10, "b": 2, "c": 3 });
    }

    #[test]
    fn test_identity() {
        let record = Record::from_document(doc! { "_id": "42" }, 8).unwrap();
        assert_eq!(record.identity(), Some(&Bson::from("42")));

        let record = Record::from_document(doc! { "_id": Bson::Null }, 8).unwrap();
        assert!(record.identity().is_none());
    }

    #[test]
    fn test_get_path() {
        let record =
            Record::from_document(doc! { "data": { "address": { "city": "Oslo" } } }, 8).unwrap();
        let city = record.get_path(&["data", "address", "city"]);
        assert_eq!(city.and_then(|v| v.as_scalar()), Some(&Bson::from("Oslo")));
        assert!(record.get_path(&["data", "missing"]).is_none());
    }

    #[test]
    fn test_serialize_simplified_json() {
        let oid = ObjectId::parse_str("507f1f77bcf86cd799439011").unwrap();
        let record = Record::from_document(doc! { "_id": oid, "n": 1, "list": [true] }, 8).unwrap();
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"_id":"507f1f77bcf86cd799439011","n":1,"list":[true]}"#);
    }
}
