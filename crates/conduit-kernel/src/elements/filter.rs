//! Filter — keep items for which a condition holds.
//!
//! The condition is an expression over `input`. Evaluation failures are
//! per-item errors, so the run's error policy decides whether one bad item
//! aborts or is skipped.

use async_trait::async_trait;
use conduit_types::{ConduitResult, ElementSpec, FieldSchema, ParamSchema, Value};
use serde_json::json;

use crate::context::RunContext;
use crate::element::{Element, Emit};
use crate::expr::Program;
use crate::record::Record;
use crate::registry::Factory;

pub(super) fn spec() -> ElementSpec {
    ElementSpec::new("conduit.Filter", "Keep items matching a condition")
        .param(ParamSchema::optional(
            "condition",
            "string",
            json!("true"),
            "Expression over `input`; truthy keeps the item",
        ))
        .param(ParamSchema::optional(
            "keep_matching",
            "bool",
            json!(true),
            "Keep matching items (false inverts the filter)",
        ))
        .field(FieldSchema::optional("input", "any", "The item to test"))
        .field(FieldSchema::optional(
            "condition",
            "string",
            "Per-item condition override",
        ))
}

pub(super) fn factory() -> Factory {
    Box::new(|params, _ctx| {
        let condition = params.get_str("condition").unwrap_or_else(|| "true".to_string());
        let program = Program::compile(&condition)?;
        let keep_matching = params.get_bool("keep_matching").unwrap_or(true);
        Ok(Box::new(Filter {
            program,
            keep_matching,
        }))
    })
}

struct Filter {
    program: Program,
    keep_matching: bool,
}

#[async_trait]
impl Element for Filter {
    async fn apply(&mut self, record: Record, _ctx: &RunContext) -> ConduitResult<Emit> {
        let input = record.get("input").cloned().unwrap_or(Value::Null);

        let matched = match record.get_str("condition") {
            Some(ref c) if c != self.program.source() => {
                Program::compile(c)?.eval_bool(&input)?
            }
            _ => self.program.eval_bool(&input)?,
        };

        if matched == self.keep_matching {
            Ok(Emit::One(input))
        } else {
            Ok(Emit::None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn filter(condition: &str, keep_matching: bool) -> Filter {
        Filter {
            program: Program::compile(condition).unwrap(),
            keep_matching,
        }
    }

    fn record(item: Value) -> Record {
        Record::coerce(item, &spec().fields, &Map::new())
    }

    #[tokio::test]
    async fn keeps_items_matching_the_condition() {
        let ctx = RunContext::default();
        let mut element = filter("input.a >= 2", true);

        for (item, kept) in [(json!({"a": 1}), 0), (json!({"a": 2}), 1), (json!({"a": 3}), 1)] {
            let out = element.apply(record(item), &ctx).await.unwrap().into_vec();
            assert_eq!(out.len(), kept);
        }
    }

    #[tokio::test]
    async fn keep_matching_false_inverts() {
        let ctx = RunContext::default();
        let mut element = filter("input.a >= 2", false);
        let out = element
            .apply(record(json!({"a": 1})), &ctx)
            .await
            .unwrap()
            .into_vec();
        assert_eq!(out, vec![json!({"a": 1})]);
    }

    #[tokio::test]
    async fn evaluation_failures_are_item_errors() {
        let ctx = RunContext::default();
        let mut element = filter("input.a.b > 1", true);
        // `a` is a scalar, so `.b` access fails.
        let err = element
            .apply(record(json!({"a": 5})), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ExpressionError");
    }
}
