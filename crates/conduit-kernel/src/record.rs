//! Per-item input records: coercion into an element's declared shape plus
//! the constructor-defaults merge.
//!
//! For every upstream item the executor builds a [`Record`] holding the raw
//! item and the coerced field map, then merges the stage's captured defaults
//! field-by-field. Merge law: a field is `item[f]` when the item set it,
//! else `defaults[f]` when captured, else absent. Fields replace whole —
//! there is no deep merge.

use conduit_types::value::type_name;
use conduit_types::{ConduitError, ConduitResult, FieldSchema, Value};
use serde_json::Map;

/// The per-item view an element consumes.
#[derive(Debug, Clone)]
pub struct Record {
    item: Value,
    fields: Map<String, Value>,
}

impl Record {
    /// Coerce an upstream item into the declared shape and merge defaults.
    ///
    /// Coercion rules, in order:
    /// 1. Mapping item: keys matched against declared field names.
    /// 2. Mapping item with no matching key, `input` declared: whole item
    ///    binds to `input`.
    /// 3. Non-mapping item, exactly one declared field: binds to it.
    /// 4. Non-mapping item, `input` declared: binds to `input`.
    ///
    /// Unstructured elements (no declared fields) get the raw item only.
    pub fn coerce(item: Value, fields: &[FieldSchema], defaults: &Map<String, Value>) -> Record {
        let mut bound = Map::new();

        if !fields.is_empty() {
            match &item {
                Value::Object(map) => {
                    for field in fields {
                        if let Some(v) = map.get(&field.name) {
                            bound.insert(field.name.clone(), v.clone());
                        }
                    }
                    if bound.is_empty() && fields.iter().any(|f| f.name == "input") {
                        bound.insert("input".to_string(), item.clone());
                    }
                }
                other => {
                    if fields.len() == 1 {
                        bound.insert(fields[0].name.clone(), other.clone());
                    } else if fields.iter().any(|f| f.name == "input") {
                        bound.insert("input".to_string(), other.clone());
                    }
                }
            }
        }

        // Defaults merge: per field, item value wins; replacement is whole.
        for (name, default) in defaults {
            if !bound.contains_key(name) {
                bound.insert(name.clone(), default.clone());
            }
        }

        Record {
            item,
            fields: bound,
        }
    }

    /// A record with no declared fields (unstructured elements).
    pub fn raw(item: Value) -> Record {
        Record {
            item,
            fields: Map::new(),
        }
    }

    /// The raw upstream item.
    pub fn item(&self) -> &Value {
        &self.item
    }

    /// Consume the record, returning the raw item.
    pub fn into_item(self) -> Value {
        self.item
    }

    /// The merged field map.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Get a merged field, `None` when absent or null.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    /// String view of a field. Numbers and bools stringify; other shapes
    /// don't.
    pub fn get_str(&self, name: &str) -> Option<String> {
        self.get(name).and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
    }

    /// Integer view of a field (numeric strings parse).
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|v| match v {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    /// Float view of a field (numeric strings parse).
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    /// Boolean view of a field ("true"/"false"/"1"/"0" strings parse).
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(|v| match v {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            Value::Number(n) => n.as_i64().map(|i| i != 0),
            _ => None,
        })
    }

    /// Array view of a field.
    pub fn get_array(&self, name: &str) -> Option<&Vec<Value>> {
        self.get(name).and_then(|v| v.as_array())
    }

    /// Object view of a field.
    pub fn get_object(&self, name: &str) -> Option<&Map<String, Value>> {
        self.get(name).and_then(|v| v.as_object())
    }

    /// A field that must be set after the merge.
    pub fn require(&self, name: &str) -> ConduitResult<&Value> {
        self.get(name).ok_or_else(|| {
            ConduitError::Item(format!(
                "field '{name}' is required (set it on the stage or per item)"
            ))
        })
    }

    /// A required string field.
    pub fn require_str(&self, name: &str) -> ConduitResult<String> {
        let value = self.require(name)?;
        self.get_str(name).ok_or_else(|| {
            ConduitError::Item(format!(
                "field '{name}' must be a string, got {}",
                type_name(value)
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_types::FieldSchema;
    use serde_json::json;

    fn fields(names: &[&str]) -> Vec<FieldSchema> {
        names
            .iter()
            .map(|n| FieldSchema::optional(*n, "any", ""))
            .collect()
    }

    fn defaults(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn mapping_keys_match_declared_fields() {
        let rec = Record::coerce(
            json!({"condition": "input.a > 1", "other": 9}),
            &fields(&["input", "condition"]),
            &Map::new(),
        );
        assert_eq!(rec.get_str("condition").unwrap(), "input.a > 1");
        // "other" is not declared, so it does not bind.
        assert!(rec.get("other").is_none());
    }

    #[test]
    fn unmatched_mapping_binds_whole_item_to_input() {
        let rec = Record::coerce(
            json!({"message": "hi"}),
            &fields(&["input", "format"]),
            &Map::new(),
        );
        assert_eq!(rec.get("input").unwrap(), &json!({"message": "hi"}));
        assert!(rec.get("format").is_none());
    }

    #[test]
    fn scalar_binds_to_single_field() {
        let rec = Record::coerce(json!("path.csv"), &fields(&["filename"]), &Map::new());
        assert_eq!(rec.get_str("filename").unwrap(), "path.csv");
    }

    #[test]
    fn scalar_binds_to_input_when_declared() {
        let rec = Record::coerce(json!(42), &fields(&["input", "format"]), &Map::new());
        assert_eq!(rec.get("input").unwrap(), &json!(42));
    }

    #[test]
    fn merge_law_item_wins_per_field() {
        let d = defaults(&[("format", json!("{{input}}")), ("sep", json!(","))]);
        let rec = Record::coerce(
            json!({"format": "custom", "input": 1}),
            &fields(&["input", "format", "sep"]),
            &d,
        );
        assert_eq!(rec.get_str("format").unwrap(), "custom");
        assert_eq!(rec.get_str("sep").unwrap(), ",");
    }

    #[test]
    fn merge_replaces_whole_fields_never_deep() {
        let d = defaults(&[("headers", json!({"a": 1, "b": 2}))]);
        let rec = Record::coerce(
            json!({"headers": {"c": 3}}),
            &fields(&["headers"]),
            &d,
        );
        // The default mapping is replaced wholesale, not merged into.
        assert_eq!(rec.get("headers").unwrap(), &json!({"c": 3}));
    }

    #[test]
    fn absent_fields_stay_absent() {
        let rec = Record::coerce(json!({}), &fields(&["input", "format"]), &Map::new());
        assert!(rec.get("format").is_none());
        assert!(rec.require("format").is_err());
    }

    #[test]
    fn typed_views_coerce_strings() {
        let d = defaults(&[("n", json!("7")), ("flag", json!("true"))]);
        let rec = Record::coerce(json!({}), &fields(&["n", "flag"]), &d);
        assert_eq!(rec.get_i64("n"), Some(7));
        assert_eq!(rec.get_bool("flag"), Some(true));
    }
}
