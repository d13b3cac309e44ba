//! Console — render a template for each item and forward the item.
//!
//! The rendered line goes to the run's stdout channel (captured by the HTTP
//! driver, echoed live by the CLI). The original item keeps flowing, so
//! Console can sit in the middle of a chain.

use async_trait::async_trait;
use conduit_types::{ConduitResult, ElementSpec, FieldSchema, ParamSchema, Value};
use serde_json::json;

use crate::context::RunContext;
use crate::element::{Element, Emit};
use crate::record::Record;
use crate::registry::Factory;
use crate::template::TemplateEngine;

const DEFAULT_FORMAT: &str = "{{input}}";

pub(super) fn spec() -> ElementSpec {
    ElementSpec::new(
        "conduit.Console",
        "Render a template per item, print it, forward the item",
    )
    .param(ParamSchema::optional(
        "format",
        "string",
        json!(DEFAULT_FORMAT),
        "Template rendered against each item",
    ))
    .field(FieldSchema::optional("input", "any", "The item to print"))
    .field(FieldSchema::optional(
        "format",
        "string",
        "Per-item template override",
    ))
}

pub(super) fn factory() -> Factory {
    Box::new(|params, _ctx| {
        let format = params
            .get_str("format")
            .unwrap_or_else(|| DEFAULT_FORMAT.to_string());
        let engine = TemplateEngine::with_template(&format)?;
        Ok(Box::new(Console { engine, format }))
    })
}

struct Console {
    engine: TemplateEngine,
    format: String,
}

#[async_trait]
impl Element for Console {
    async fn apply(&mut self, record: Record, ctx: &RunContext) -> ConduitResult<Emit> {
        let input = record.get("input").cloned().unwrap_or(Value::Null);
        let format = record.get_str("format");

        let rendered = match format {
            Some(ref f) if f != &self.format => self.engine.render_str(f, &input)?,
            _ => self.engine.render(&input)?,
        };
        ctx.io.push_stdout(rendered);
        Ok(Emit::One(input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn console(format: &str) -> Console {
        Console {
            engine: TemplateEngine::with_template(format).unwrap(),
            format: format.to_string(),
        }
    }

    fn record(item: Value) -> Record {
        Record::coerce(item, &spec().fields, &Map::new())
    }

    #[tokio::test]
    async fn renders_and_forwards_the_item() {
        let ctx = RunContext::default();
        let mut element = console("{{input.message}}");
        let item = json!({"message": "Hello, Conduit!"});

        let out = element.apply(record(item.clone()), &ctx).await.unwrap();
        assert_eq!(out.into_vec(), vec![item]);
        assert_eq!(ctx.io.take_stdout(), vec!["Hello, Conduit!"]);
    }

    #[tokio::test]
    async fn per_item_format_overrides_the_default() {
        let ctx = RunContext::default();
        let mut element = console("{{input}}");
        let item = json!({"format": "n={{input.n}}", "input": {"n": 7}});

        element.apply(record(item), &ctx).await.unwrap();
        assert_eq!(ctx.io.take_stdout(), vec!["n=7"]);
    }
}
