//! BSON scalar conversion for encoders
//!
//! Two strategies share the [`BsonConverter`] trait:
//! - `JsonConverter`: simplified JSON values (no extended JSON wrappers)
//! - `PlainTextConverter`: flat strings suitable for CSV cells

use base64::Engine;
use mongodb::bson::{Binary, Bson, DateTime, Document};
use serde_json::Value as JsonValue;

/// Core trait for BSON value conversion
pub trait BsonConverter {
    /// Output type of the conversion
    type Output;

    /// Convert a BSON value to the output type
    fn convert(&self, value: &Bson) -> Self::Output;

    /// Convert an optional BSON value, falling back to the output's default
    fn convert_optional(&self, value: Option<&Bson>) -> Self::Output
    where
        Self::Output: Default,
    {
        value.map(|v| self.convert(v)).unwrap_or_default()
    }
}

/// Converts BSON into plain `serde_json` values.
///
/// ObjectIds become hex strings, dates RFC 3339 strings, binaries base64,
/// and 64-bit integers stay numbers.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonConverter;

impl JsonConverter {
    pub fn new() -> Self {
        Self
    }

    fn convert_document(&self, doc: &Document) -> JsonValue {
        let map = doc
            .iter()
            .map(|(k, v)| (k.clone(), self.convert(v)))
            .collect::<serde_json::Map<_, _>>();
        JsonValue::Object(map)
    }
}

impl BsonConverter for JsonConverter {
    type Output = JsonValue;

    fn convert(&self, value: &Bson) -> JsonValue {
        match value {
            Bson::String(s) => JsonValue::String(s.clone()),
            Bson::Int32(n) => JsonValue::Number((*n).into()),
            Bson::Int64(n) => JsonValue::Number((*n).into()),
            Bson::Double(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Bson::Boolean(b) => JsonValue::Bool(*b),
            Bson::Null | Bson::Undefined => JsonValue::Null,
            Bson::ObjectId(oid) => JsonValue::String(oid.to_hex()),
            Bson::DateTime(dt) => JsonValue::String(datetime_to_iso_string(dt)),
            Bson::Decimal128(d) => JsonValue::String(d.to_string()),
            Bson::Array(arr) => JsonValue::Array(arr.iter().map(|v| self.convert(v)).collect()),
            Bson::Document(doc) => self.convert_document(doc),
            Bson::Binary(bin) => JsonValue::String(binary_to_base64(bin)),
            Bson::RegularExpression(regex) => {
                JsonValue::String(format!("/{}/{}", regex.pattern, regex.options))
            }
            Bson::Timestamp(ts) => {
                serde_json::json!({ "t": ts.time, "i": ts.increment })
            }
            Bson::MinKey => JsonValue::String("MinKey".to_string()),
            Bson::MaxKey => JsonValue::String("MaxKey".to_string()),
            _ => JsonValue::String(format!("{:?}", value)),
        }
    }
}

/// Plain text converter for CSV cells
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextConverter;

impl PlainTextConverter {
    pub fn new() -> Self {
        Self
    }
}

impl BsonConverter for PlainTextConverter {
    type Output = String;

    fn convert(&self, value: &Bson) -> String {
        match value {
            Bson::String(s) => s.clone(),
            Bson::Int32(n) => n.to_string(),
            Bson::Int64(n) => n.to_string(),
            Bson::Double(f) => format_double_smart(*f),
            Bson::Boolean(b) => b.to_string(),
            Bson::Null | Bson::Undefined => String::new(),
            Bson::ObjectId(oid) => oid.to_hex(),
            Bson::DateTime(dt) => datetime_to_iso_string(dt),
            Bson::Decimal128(d) => d.to_string(),
            Bson::Array(arr) => arr
                .iter()
                .map(|v| self.convert(v))
                .collect::<Vec<_>>()
                .join(", "),
            Bson::Document(_) => JsonConverter.convert(value).to_string(),
            Bson::Binary(bin) => binary_to_hex(bin),
            Bson::RegularExpression(regex) => format!("/{}/{}", regex.pattern, regex.options),
            Bson::Timestamp(ts) => format!("{}:{}", ts.time, ts.increment),
            Bson::MinKey => "MinKey".to_string(),
            Bson::MaxKey => "MaxKey".to_string(),
            _ => format!("{:?}", value),
        }
    }
}

/// Convert DateTime to ISO 8601 string, falling back to epoch millis
pub fn datetime_to_iso_string(dt: &DateTime) -> String {
    dt.try_to_rfc3339_string()
        .unwrap_or_else(|_| format!("{}", dt.timestamp_millis()))
}

/// Convert Binary data to hexadecimal string
pub fn binary_to_hex(bin: &Binary) -> String {
    hex::encode(&bin.bytes)
}

/// Convert Binary data to Base64 string
pub fn binary_to_base64(bin: &Binary) -> String {
    base64::engine::general_purpose::STANDARD.encode(&bin.bytes)
}

/// Format double without a trailing `.0` for whole numbers
pub fn format_double_smart(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e10 {
        format!("{:.0}", f)
    } else {
        format!("{}", f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{doc, oid::ObjectId, spec::BinarySubtype};

    #[test]
    fn test_json_converter_scalars() {
        let converter = JsonConverter::new();
        let oid = ObjectId::parse_str("507f1f77bcf86cd799439011").unwrap();

        assert_eq!(
            converter.convert(&Bson::ObjectId(oid)),
            JsonValue::String("507f1f77bcf86cd799439011".into())
        );
        assert_eq!(converter.convert(&Bson::Int64(7)), serde_json::json!(7));
        assert_eq!(converter.convert(&Bson::Double(f64::NAN)), JsonValue::Null);
        assert_eq!(
            converter.convert(&Bson::DateTime(DateTime::from_millis(0))),
            JsonValue::String("1970-01-01T00:00:00Z".into())
        );
    }

    #[test]
    fn test_json_converter_nested_document() {
        let converter = JsonConverter::new();
        let value = converter.convert(&Bson::Document(doc! { "a": { "b": [1, 2] } }));
        assert_eq!(value, serde_json::json!({ "a": { "b": [1, 2] } }));
    }

    #[test]
    fn test_plain_text_converter() {
        let converter = PlainTextConverter::new();
        assert_eq!(converter.convert(&Bson::Double(3.0)), "3");
        assert_eq!(converter.convert(&Bson::Double(3.5)), "3.5");
        assert_eq!(converter.convert(&Bson::Null), "");
        assert_eq!(
            converter.convert(&Bson::Array(vec![Bson::from("a"), Bson::from("b")])),
            "a, b"
        );
        assert_eq!(converter.convert_optional(None), "");
    }

    #[test]
    fn test_binary_helpers() {
        let bin = Binary {
            subtype: BinarySubtype::Generic,
            bytes: vec![0x01, 0x02, 0x03, 0xff],
        };
        assert_eq!(binary_to_hex(&bin), "010203ff");
        assert_eq!(binary_to_base64(&bin), "AQID/w==");
    }
}
