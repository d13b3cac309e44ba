//! Sort — buffer all items, emit them ordered by a key expression.
//!
//! Buffered like GroupBy. The sort is stable, so equal keys keep their
//! arrival order.

use async_trait::async_trait;
use conduit_types::value::compare;
use conduit_types::{ConduitResult, ElementSpec, FieldSchema, ParamSchema, Value};
use serde_json::json;

use crate::context::RunContext;
use crate::element::{Element, Emit};
use crate::expr::Program;
use crate::record::Record;
use crate::registry::Factory;

pub(super) fn spec() -> ElementSpec {
    ElementSpec::new("conduit.Sort", "Sort items by a key expression")
        .param(ParamSchema::optional(
            "key",
            "string",
            json!("str(input)"),
            "Expression producing the sort key",
        ))
        .param(ParamSchema::optional(
            "reverse",
            "bool",
            json!(false),
            "Sort descending",
        ))
        .field(FieldSchema::optional("input", "any", "The item to sort"))
        .buffered()
}

pub(super) fn factory() -> Factory {
    Box::new(|params, _ctx| {
        let key = params.get_str("key").unwrap_or_else(|| "str(input)".to_string());
        Ok(Box::new(Sort {
            key: Program::compile(&key)?,
            reverse: params.get_bool("reverse").unwrap_or(false),
            buffered: Vec::new(),
        }))
    })
}

struct Sort {
    key: Program,
    reverse: bool,
    buffered: Vec<(Value, Value)>,
}

#[async_trait]
impl Element for Sort {
    async fn apply(&mut self, record: Record, _ctx: &RunContext) -> ConduitResult<Emit> {
        let input = record.get("input").cloned().unwrap_or(Value::Null);
        let key = self.key.eval(&input)?;
        self.buffered.push((key, input));
        Ok(Emit::None)
    }

    async fn flush(&mut self, _ctx: &RunContext) -> ConduitResult<Emit> {
        let mut items = std::mem::take(&mut self.buffered);
        if self.reverse {
            // Reversed comparator, not a post-reverse, so the stable sort
            // keeps arrival order within equal keys.
            items.sort_by(|(a, _), (b, _)| compare(b, a));
        } else {
            items.sort_by(|(a, _), (b, _)| compare(a, b));
        }
        Ok(Emit::Many(items.into_iter().map(|(_, v)| v).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn sort(key: &str, reverse: bool) -> Sort {
        Sort {
            key: Program::compile(key).unwrap(),
            reverse,
            buffered: Vec::new(),
        }
    }

    fn record(item: Value) -> Record {
        Record::coerce(item, &spec().fields, &Map::new())
    }

    #[tokio::test]
    async fn sorts_by_numeric_key() {
        let ctx = RunContext::default();
        let mut element = sort("input.size", false);
        for item in [json!({"size": 3}), json!({"size": 1}), json!({"size": 2})] {
            assert!(element.apply(record(item), &ctx).await.unwrap().into_vec().is_empty());
        }
        let out = element.flush(&ctx).await.unwrap().into_vec();
        assert_eq!(
            out,
            vec![json!({"size": 1}), json!({"size": 2}), json!({"size": 3})]
        );
    }

    #[tokio::test]
    async fn reverse_sorts_descending_and_stays_stable() {
        let ctx = RunContext::default();
        let mut element = sort("input.k", true);
        for item in [
            json!({"k": 1, "tag": "first"}),
            json!({"k": 2, "tag": "x"}),
            json!({"k": 1, "tag": "second"}),
        ] {
            element.apply(record(item), &ctx).await.unwrap();
        }
        let out = element.flush(&ctx).await.unwrap().into_vec();
        assert_eq!(out[0], json!({"k": 2, "tag": "x"}));
        // Stable within equal keys, even reversed.
        assert_eq!(out[1]["tag"], json!("first"));
        assert_eq!(out[2]["tag"], json!("second"));
    }
}
