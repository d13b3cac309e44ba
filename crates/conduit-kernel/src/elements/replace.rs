//! Replace — regex substitution over string items.
//!
//! Pattern and replacement are templates, rendered against the item before
//! the regex compiles, so both can vary per item.

use async_trait::async_trait;
use conduit_types::value::to_display_string;
use conduit_types::{ConduitError, ConduitResult, ElementSpec, FieldSchema, ParamSchema, Value};
use regex::Regex;
use serde_json::json;

use crate::context::RunContext;
use crate::element::{Element, Emit};
use crate::record::Record;
use crate::registry::Factory;
use crate::template::TemplateEngine;

pub(super) fn spec() -> ElementSpec {
    ElementSpec::new("conduit.Replace", "Regex find-and-replace over items")
        .param(ParamSchema::optional(
            "pattern",
            "string",
            json!(".*"),
            "Regular expression to find (template)",
        ))
        .param(ParamSchema::optional(
            "replacement",
            "string",
            json!(""),
            "Replacement text (template; $1 references capture groups)",
        ))
        .param(ParamSchema::optional(
            "count",
            "int",
            json!(0),
            "Maximum replacements per item (0 replaces all)",
        ))
        .field(FieldSchema::optional("input", "any", "The text to rewrite"))
        .field(FieldSchema::optional(
            "pattern",
            "string",
            "Per-item pattern override",
        ))
        .field(FieldSchema::optional(
            "replacement",
            "string",
            "Per-item replacement override",
        ))
        .field(FieldSchema::optional(
            "count",
            "int",
            "Per-item replacement limit",
        ))
}

pub(super) fn factory() -> Factory {
    Box::new(|_params, _ctx| {
        Ok(Box::new(Replace {
            engine: TemplateEngine::new(),
        }))
    })
}

struct Replace {
    engine: TemplateEngine,
}

#[async_trait]
impl Element for Replace {
    async fn apply(&mut self, record: Record, _ctx: &RunContext) -> ConduitResult<Emit> {
        let input = record.get("input").cloned().unwrap_or(Value::Null);
        let text = to_display_string(&input);

        let pattern = record.get_str("pattern").unwrap_or_else(|| ".*".to_string());
        let replacement = record.get_str("replacement").unwrap_or_default();
        let count = record.get_i64("count").unwrap_or(0).max(0) as usize;

        let pattern = self.engine.render_str(&pattern, &input)?;
        let replacement = self.engine.render_str(&replacement, &input)?;

        let regex = Regex::new(&pattern)
            .map_err(|e| ConduitError::Item(format!("invalid pattern '{pattern}': {e}")))?;
        let result = regex.replacen(&text, count, replacement.as_str());
        Ok(Emit::One(Value::String(result.into_owned())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn record(item: Value, defaults: &[(&str, Value)]) -> Record {
        let defaults: Map<String, Value> = defaults
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Record::coerce(item, &spec().fields, &defaults)
    }

    #[tokio::test]
    async fn replaces_all_matches_by_default() {
        let ctx = RunContext::default();
        let mut element = Replace {
            engine: TemplateEngine::new(),
        };
        let rec = record(
            json!("a-b-c"),
            &[("pattern", json!("-")), ("replacement", json!("_"))],
        );
        let out = element.apply(rec, &ctx).await.unwrap().into_vec();
        assert_eq!(out, vec![json!("a_b_c")]);
    }

    #[tokio::test]
    async fn count_limits_replacements() {
        let ctx = RunContext::default();
        let mut element = Replace {
            engine: TemplateEngine::new(),
        };
        let rec = record(
            json!("a-b-c"),
            &[
                ("pattern", json!("-")),
                ("replacement", json!("_")),
                ("count", json!(1)),
            ],
        );
        let out = element.apply(rec, &ctx).await.unwrap().into_vec();
        assert_eq!(out, vec![json!("a_b-c")]);
    }

    #[tokio::test]
    async fn capture_group_references_work() {
        let ctx = RunContext::default();
        let mut element = Replace {
            engine: TemplateEngine::new(),
        };
        let rec = record(
            json!("file.tar.gz"),
            &[
                ("pattern", json!(r"\.tar\.gz$")),
                ("replacement", json!(".tgz")),
            ],
        );
        let out = element.apply(rec, &ctx).await.unwrap().into_vec();
        assert_eq!(out, vec![json!("file.tgz")]);
    }
}
