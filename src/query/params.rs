//! Filters derived from request query parameters
//!
//! `field=value` matches equality; `field__op=value` applies a comparison
//! operator. Paging, sorting and output parameters are not filters.

use mongodb::bson::{Bson, Document, Regex};
use tracing::debug;

/// Parameters that control the request rather than filter records.
const RESERVED_PARAMS: &[&str] = &["limit", "skip", "sort", "select", "populate", "format"];

/// Operator suffixes understood after a double underscore.
const OPERATORS: &[&str] = &[
    "eq", "ne", "gt", "gte", "lt", "lte", "in", "nin", "exists", "regex",
];

/// Build a filter document from `(name, value)` request parameters.
pub fn derive_filter<K, V>(params: &[(K, V)]) -> Document
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut filter = Document::new();

    for (key, raw) in params {
        let (key, raw) = (key.as_ref(), raw.as_ref());
        if key.is_empty() || RESERVED_PARAMS.contains(&key) {
            continue;
        }

        let (field, op) = match key.rsplit_once("__") {
            Some((field, op)) if !field.is_empty() && OPERATORS.contains(&op) => (field, Some(op)),
            _ => (key, None),
        };

        match op {
            None | Some("eq") => {
                filter.insert(field, Bson::String(raw.to_string()));
            }
            Some(op) => {
                let operator = format!("${op}");
                let value = operator_value(op, raw);
                match filter.get_mut(field) {
                    Some(Bson::Document(ops)) => {
                        ops.insert(operator, value);
                    }
                    _ => {
                        let mut ops = Document::new();
                        ops.insert(operator, value);
                        filter.insert(field, ops);
                    }
                }
            }
        }
    }

    debug!("Derived filter from {} parameter(s): {}", params.len(), filter);
    filter
}

fn operator_value(op: &str, raw: &str) -> Bson {
    match op {
        "in" | "nin" => Bson::Array(
            raw.split(',')
                .map(|item| Bson::String(item.trim().to_string()))
                .collect(),
        ),
        "exists" => Bson::Boolean(matches!(raw, "true" | "1")),
        "regex" => Bson::RegularExpression(Regex {
            pattern: raw.to_string(),
            options: String::new(),
        }),
        "gt" | "gte" | "lt" | "lte" => numeric_or_string(raw),
        _ => Bson::String(raw.to_string()),
    }
}

fn numeric_or_string(raw: &str) -> Bson {
    if let Ok(n) = raw.parse::<i64>() {
        Bson::Int64(n)
    } else if let Ok(f) = raw.parse::<f64>()
        && f.is_finite()
    {
        Bson::Double(f)
    } else {
        Bson::String(raw.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn test_equality_and_reserved() {
        let filter = derive_filter(&[
            ("data.name", "Alice"),
            ("limit", "10"),
            ("sort", "-created"),
            ("format", "csv"),
        ]);
        assert_eq!(filter, doc! { "data.name": "Alice" });
    }

    #[test]
    fn test_operators_merge_per_field() {
        let filter = derive_filter(&[
            ("data.age__gte", "18"),
            ("data.age__lt", "65.5"),
            ("data.tag__in", "a, b,c"),
            ("data.photo__exists", "false"),
        ]);
        assert_eq!(
            filter,
            doc! {
                "data.age": { "$gte": 18_i64, "$lt": 65.5 },
                "data.tag": { "$in": ["a", "b", "c"] },
                "data.photo": { "$exists": false },
            }
        );
    }

    #[test]
    fn test_regex_and_string_comparison() {
        let filter = derive_filter(&[("data.name__regex", "^Al"), ("created__gt", "2024-01-01")]);
        assert_eq!(
            filter.get_document("created").unwrap(),
            &doc! { "$gt": "2024-01-01" }
        );
        match filter.get_document("data.name").unwrap().get("$regex") {
            Some(Bson::RegularExpression(regex)) => assert_eq!(regex.pattern, "^Al"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unknown_suffix_is_a_field_name() {
        let filter = derive_filter(&[("data.first__name", "x")]);
        assert_eq!(filter, doc! { "data.first__name": "x" });
    }
}
