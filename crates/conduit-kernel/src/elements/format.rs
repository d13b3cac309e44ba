//! Format — render each item through a template, yielding the string.

use async_trait::async_trait;
use conduit_types::{ConduitResult, ElementSpec, FieldSchema, ParamSchema, Value};
use serde_json::json;

use crate::context::RunContext;
use crate::element::{Element, Emit};
use crate::record::Record;
use crate::registry::Factory;
use crate::template::TemplateEngine;

const DEFAULT_TEMPLATE: &str = "{{input}}";

pub(super) fn spec() -> ElementSpec {
    ElementSpec::new("conduit.Format", "Render each item through a template")
        .param(ParamSchema::optional(
            "template",
            "string",
            json!(DEFAULT_TEMPLATE),
            "Template applied to each item; mapping keys are template variables",
        ))
        .field(FieldSchema::optional("input", "any", "The item to render"))
        .field(FieldSchema::optional(
            "template",
            "string",
            "Per-item template override",
        ))
}

pub(super) fn factory() -> Factory {
    Box::new(|params, _ctx| {
        let template = params
            .get_str("template")
            .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string());
        let engine = TemplateEngine::with_template(&template)?;
        Ok(Box::new(Format { engine, template }))
    })
}

struct Format {
    engine: TemplateEngine,
    template: String,
}

#[async_trait]
impl Element for Format {
    async fn apply(&mut self, record: Record, _ctx: &RunContext) -> ConduitResult<Emit> {
        let input = record.get("input").cloned().unwrap_or(Value::Null);
        let template = record.get_str("template");

        let rendered = match template {
            Some(ref t) if t != &self.template => self.engine.render_str(t, &input)?,
            _ => self.engine.render(&input)?,
        };
        Ok(Emit::One(Value::String(rendered)))
    }
}
