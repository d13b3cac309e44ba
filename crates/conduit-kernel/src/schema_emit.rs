//! JSON Schema emission for editor assistance and pre-run validation.
//!
//! Walks the registry and produces a single draft-07 document: a top-level
//! array of `PipelineElement` objects, with an `id` enum over every
//! registered element and one `if`/`then` branch per element constraining
//! the union of its constructor-param and input-field keys.

use conduit_types::{ElementSpec, Value};
use serde_json::{json, Map};

use crate::registry::Registry;

/// Emit the pipeline JSON Schema for every registered element.
pub fn emit_schema(registry: &Registry) -> Value {
    let ids: Vec<&str> = registry.specs().map(|s| s.id.as_str()).collect();

    let mut branches = Vec::new();
    for spec in registry.specs() {
        branches.push(element_branch(spec));
    }

    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": "Conduit Pipeline Configuration",
        "description": "Schema for conduit data pipeline YAML/JSON documents",
        "type": "array",
        "items": { "$ref": "#/definitions/PipelineElement" },
        "definitions": {
            "PipelineElement": {
                "type": "object",
                "required": ["id"],
                "properties": {
                    "id": {
                        "type": "string",
                        "description": "Dotted id of the pipeline element",
                        "enum": ids,
                    }
                },
                "allOf": branches,
            }
        }
    })
}

/// One `if id == X then properties` branch.
fn element_branch(spec: &ElementSpec) -> Value {
    let mut properties = Map::new();
    properties.insert("id".to_string(), json!({ "const": spec.id }));

    for param in &spec.params {
        properties.insert(
            param.name.clone(),
            property_schema(&param.param_type, &param.description),
        );
    }
    for field in &spec.fields {
        // A key that is both param and field keeps the param's entry.
        properties
            .entry(field.name.clone())
            .or_insert_with(|| property_schema(&field.field_type, &field.description));
    }

    let required: Vec<&str> = std::iter::once("id")
        .chain(
            spec.params
                .iter()
                .filter(|p| p.required)
                .map(|p| p.name.as_str()),
        )
        .collect();

    json!({
        "if": { "properties": { "id": { "const": spec.id } } },
        "then": {
            "description": spec.summary,
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        }
    })
}

fn property_schema(declared: &str, description: &str) -> Value {
    let mut schema = match declared {
        // `${...}` expansion always produces strings, so scalar keys accept
        // a string alternative.
        "string" => json!({ "type": "string" }),
        "int" => json!({ "type": ["integer", "string"] }),
        "float" => json!({ "type": ["number", "string"] }),
        "bool" => json!({ "type": ["boolean", "string"] }),
        "array" => json!({ "type": "array" }),
        "object" => json!({ "type": "object" }),
        _ => json!({}),
    };
    if !description.is_empty() {
        schema["description"] = json!(description);
    }
    schema
}
