//! Element schemas: constructor params and input-record fields.
//!
//! Every registered element publishes an [`ElementSpec`] describing how the
//! builder configures it: constructor parameters are bound once at build
//! time, input fields are populated per item (with constructor-captured
//! defaults filling the gaps). A descriptor key may name both.

use crate::value::Value;

/// Schema for a constructor parameter.
#[derive(Debug, Clone)]
pub struct ParamSchema {
    /// Parameter name.
    pub name: String,
    /// Type hint (string, int, float, bool, array, object, any).
    pub param_type: String,
    /// Whether the builder requires this parameter.
    pub required: bool,
    /// Default value when not required.
    pub default: Option<Value>,
    /// Description for the emitted JSON Schema.
    pub description: String,
}

impl ParamSchema {
    /// Create a required parameter.
    pub fn required(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            required: true,
            default: None,
            description: description.into(),
        }
    }

    /// Create an optional parameter with a default value.
    pub fn optional(
        name: impl Into<String>,
        param_type: impl Into<String>,
        default: Value,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            required: false,
            default: Some(default),
            description: description.into(),
        }
    }
}

/// Schema for one input-record field.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    /// Field name.
    pub name: String,
    /// Type hint (string, int, float, bool, array, object, any).
    pub field_type: String,
    /// Whether the element requires the field to be set after the
    /// defaults merge.
    pub required: bool,
    /// Description for the emitted JSON Schema.
    pub description: String,
}

impl FieldSchema {
    /// Create an optional field (the common case — constructor defaults
    /// usually fill it).
    pub fn optional(
        name: impl Into<String>,
        field_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            required: false,
            description: description.into(),
        }
    }

    /// Create a required field.
    pub fn required(
        name: impl Into<String>,
        field_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            required: true,
            ..Self::optional(name, field_type, description)
        }
    }
}

/// Schema describing a registered element.
#[derive(Debug, Clone)]
pub struct ElementSpec {
    /// Dotted id, e.g. `conduit.Input`.
    pub id: String,
    /// Short description.
    pub summary: String,
    /// Constructor parameters.
    pub params: Vec<ParamSchema>,
    /// Input-record fields. Empty means the element consumes raw items
    /// verbatim (unstructured).
    pub fields: Vec<FieldSchema>,
    /// Buffered elements consume all upstream input before emitting
    /// (GroupBy, Sort).
    pub buffered: bool,
    /// Pure sources ignore upstream input and produce items on their own
    /// (Input).
    pub source: bool,
}

impl ElementSpec {
    /// Create a new element spec.
    pub fn new(id: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            summary: summary.into(),
            params: Vec::new(),
            fields: Vec::new(),
            buffered: false,
            source: false,
        }
    }

    /// Add a constructor parameter.
    pub fn param(mut self, param: ParamSchema) -> Self {
        self.params.push(param);
        self
    }

    /// Add an input-record field.
    pub fn field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    /// Mark the element as buffered.
    pub fn buffered(mut self) -> Self {
        self.buffered = true;
        self
    }

    /// Mark the element as a pure source.
    pub fn source(mut self) -> Self {
        self.source = true;
        self
    }

    /// Look up a constructor parameter by name.
    pub fn find_param(&self, name: &str) -> Option<&ParamSchema> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Look up an input field by name.
    pub fn find_field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn spec_builder_accumulates_params_and_fields() {
        let spec = ElementSpec::new("conduit.Console", "Render and print items")
            .param(ParamSchema::optional(
                "format",
                "string",
                json!("{{input}}"),
                "Template for rendering",
            ))
            .field(FieldSchema::optional("input", "any", "Item to print"))
            .field(FieldSchema::optional("format", "string", "Per-item template"));

        assert_eq!(spec.params.len(), 1);
        assert_eq!(spec.fields.len(), 2);
        assert!(spec.find_param("format").is_some());
        assert!(spec.find_field("input").is_some());
        assert!(spec.find_field("missing").is_none());
        assert!(!spec.buffered);
        assert!(!spec.source);
    }
}
