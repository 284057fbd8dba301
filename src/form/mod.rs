//! Form definitions
//!
//! A form owns a tree of components. Only input components carry data;
//! layout components (panels, columns, fieldsets) are transparent, while
//! `tree` components (containers, grids) nest their children's data under
//! their own key.

use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};

use crate::record::id_to_string;

/// A stored form definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Form {
    #[serde(rename = "_id")]
    pub id: Bson,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub path: String,

    #[serde(default)]
    pub components: Vec<Component>,
}

/// A single form component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Component {
    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default)]
    pub key: String,

    #[serde(default)]
    pub label: Option<String>,

    /// Whether the component stores a value.
    #[serde(default)]
    pub input: bool,

    /// Whether the value must never leave the server.
    #[serde(default)]
    pub protected: bool,

    /// Whether the component nests its children's data under its key.
    #[serde(default)]
    pub tree: bool,

    #[serde(default)]
    pub components: Vec<Component>,

    #[serde(default)]
    pub columns: Vec<Column>,
}

/// One column of a layout `columns` component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Column {
    #[serde(default)]
    pub components: Vec<Component>,
}

/// A data-bearing field, located by its path below `data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataField {
    pub path: Vec<String>,
    pub label: String,
    pub protected: bool,
}

impl Form {
    pub fn id_string(&self) -> String {
        id_to_string(&self.id)
    }

    /// Every input component, with containers flattened into dotted paths.
    ///
    /// Grids (`tree` components holding sequences) are reported as a single
    /// field at the grid's path; their children are reported too, at the
    /// same path plus their key, so redaction reaches each row.
    pub fn data_fields(&self) -> Vec<DataField> {
        let mut fields = Vec::new();
        collect_fields(&self.components, &mut Vec::new(), false, &mut fields);
        fields
    }

    /// Columns for tabular export: non-protected leaf inputs and whole grids.
    pub fn data_columns(&self) -> Vec<DataField> {
        let mut columns = Vec::new();
        collect_columns(&self.components, &mut Vec::new(), &mut columns);
        columns
    }
}

impl Component {
    fn label_or_key(&self) -> String {
        match &self.label {
            Some(label) if !label.is_empty() => label.clone(),
            _ => self.key.clone(),
        }
    }

    fn children(&self) -> impl Iterator<Item = &Component> {
        self.components
            .iter()
            .chain(self.columns.iter().flat_map(|c| c.components.iter()))
    }

    fn is_container(&self) -> bool {
        self.tree && self.kind == "container"
    }
}

fn collect_fields(
    components: &[Component],
    prefix: &mut Vec<String>,
    inherited_protection: bool,
    out: &mut Vec<DataField>,
) {
    for component in components {
        let protected = inherited_protection || component.protected;
        let nests = component.input && component.tree && !component.key.is_empty();

        if component.input && !component.key.is_empty() {
            let mut path = prefix.clone();
            path.push(component.key.clone());
            out.push(DataField {
                path,
                label: component.label_or_key(),
                protected,
            });
        }

        let children: Vec<Component> = component.children().cloned().collect();
        if nests {
            prefix.push(component.key.clone());
            collect_fields(&children, prefix, protected, out);
            prefix.pop();
        } else {
            collect_fields(&children, prefix, protected, out);
        }
    }
}

fn collect_columns(components: &[Component], prefix: &mut Vec<String>, out: &mut Vec<DataField>) {
    for component in components {
        // Buttons are inputs but never carry submission data.
        if component.protected || component.kind == "button" {
            continue;
        }

        let children: Vec<Component> = component.children().cloned().collect();
        if component.input && !component.key.is_empty() {
            if component.is_container() {
                prefix.push(component.key.clone());
                collect_columns(&children, prefix, out);
                prefix.pop();
                continue;
            }

            let mut path = prefix.clone();
            path.push(component.key.clone());
            out.push(DataField {
                path,
                label: component.label_or_key(),
                protected: false,
            });
            // Grids export as one cell per row.
            continue;
        }

        collect_columns(&children, prefix, out);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn sample_form() -> Form {
        serde_json::from_value(json!({
            "_id": "5",
            "title": "Customer",
            "name": "customer",
            "path": "customer",
            "components": [
                { "type": "textfield", "key": "name", "label": "Name", "input": true },
                { "type": "password", "key": "secret", "label": "Secret", "input": true, "protected": true },
                { "type": "panel", "key": "panel1", "input": false, "components": [
                    { "type": "email", "key": "email", "label": "Email", "input": true }
                ]},
                { "type": "columns", "key": "cols", "input": false, "columns": [
                    { "components": [ { "type": "number", "key": "age", "input": true } ] }
                ]},
                { "type": "container", "key": "address", "input": true, "tree": true, "components": [
                    { "type": "textfield", "key": "city", "label": "City", "input": true },
                    { "type": "textfield", "key": "pin", "label": "PIN", "input": true, "protected": true }
                ]},
                { "type": "datagrid", "key": "items", "label": "Items", "input": true, "tree": true, "components": [
                    { "type": "textfield", "key": "sku", "input": true },
                    { "type": "textfield", "key": "cost", "input": true, "protected": true }
                ]},
                { "type": "select", "key": "customer", "label": "Customer", "input": true }
            ]
        }))
        .unwrap()
    }

    fn paths(fields: &[DataField]) -> Vec<String> {
        fields.iter().map(|f| f.path.join(".")).collect()
    }

    #[test]
    fn test_buttons_are_not_columns() {
        let form: Form = serde_json::from_value(json!({
            "_id": "7",
            "components": [
                { "type": "textfield", "key": "name", "label": "Name", "input": true },
                { "type": "button", "key": "submit", "label": "Submit", "input": true }
            ]
        }))
        .unwrap();

        assert_eq!(paths(&form.data_columns()), vec!["name"]);
    }

    #[test]
    fn test_form_deserializes_with_defaults() {
        let form: Form = serde_json::from_value(json!({ "_id": "1" })).unwrap();
        assert!(form.components.is_empty());
        assert_eq!(form.id_string(), "1");
    }

    #[test]
    fn test_data_fields_flatten_layout() {
        let form = sample_form();
        let fields = form.data_fields();
        assert_eq!(
            paths(&fields),
            vec![
                "name",
                "secret",
                "email",
                "age",
                "address",
                "address.city",
                "address.pin",
                "items",
                "items.sku",
                "items.cost",
                "customer",
            ]
        );

        let protected: Vec<String> = paths(
            &fields
                .into_iter()
                .filter(|f| f.protected)
                .collect::<Vec<_>>(),
        );
        assert_eq!(protected, vec!["secret", "address.pin", "items.cost"]);
    }

    #[test]
    fn test_data_columns() {
        let form = sample_form();
        let columns = form.data_columns();
        assert_eq!(
            paths(&columns),
            vec!["name", "email", "age", "address.city", "items", "customer"]
        );
        assert_eq!(columns[2].label, "age");
        assert_eq!(columns[3].label, "City");
    }
}
