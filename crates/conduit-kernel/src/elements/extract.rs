//! Extract — pull regex captures out of string items.
//!
//! With `all_matches` every match yields its capture; otherwise only the
//! first match does. Items that do not match yield nothing, so Extract
//! composes with downstream stages without null padding.

use async_trait::async_trait;
use conduit_types::value::to_display_string;
use conduit_types::{ConduitError, ConduitResult, ElementSpec, FieldSchema, ParamSchema, Value};
use regex::Regex;
use serde_json::json;

use crate::context::RunContext;
use crate::element::{Element, Emit};
use crate::record::Record;
use crate::registry::Factory;

pub(super) fn spec() -> ElementSpec {
    ElementSpec::new("conduit.Extract", "Extract regex captures from items")
        .param(ParamSchema::required(
            "pattern",
            "string",
            "Regular expression with capture groups",
        ))
        .param(ParamSchema::optional(
            "group",
            "int",
            json!(1),
            "Capture group to yield (0 is the whole match)",
        ))
        .param(ParamSchema::optional(
            "all_matches",
            "bool",
            json!(false),
            "Yield a capture for every match, not just the first",
        ))
        .field(FieldSchema::optional("input", "any", "The text to search"))
        .field(FieldSchema::optional(
            "pattern",
            "string",
            "Per-item pattern override",
        ))
}

pub(super) fn factory() -> Factory {
    Box::new(|params, _ctx| {
        let pattern = params.require_str("pattern")?;
        let regex = Regex::new(&pattern)
            .map_err(|e| ConduitError::ElementInit(format!("invalid pattern '{pattern}': {e}")))?;
        Ok(Box::new(Extract {
            regex,
            group: params.get_i64("group").unwrap_or(1).max(0) as usize,
            all_matches: params.get_bool("all_matches").unwrap_or(false),
        }))
    })
}

struct Extract {
    regex: Regex,
    group: usize,
    all_matches: bool,
}

impl Extract {
    fn capture(&self, caps: &regex::Captures<'_>) -> Option<Value> {
        caps.get(self.group).map(|m| json!(m.as_str()))
    }
}

#[async_trait]
impl Element for Extract {
    async fn apply(&mut self, record: Record, _ctx: &RunContext) -> ConduitResult<Emit> {
        let input = record.get("input").cloned().unwrap_or(Value::Null);
        let text = to_display_string(&input);

        let regex = match record.get_str("pattern") {
            Some(ref p) if p != self.regex.as_str() => Regex::new(p)
                .map_err(|e| ConduitError::Item(format!("invalid pattern '{p}': {e}")))?,
            _ => self.regex.clone(),
        };

        if self.all_matches {
            let captures: Vec<Value> = regex
                .captures_iter(&text)
                .filter_map(|caps| caps.get(self.group).map(|m| json!(m.as_str())))
                .collect();
            Ok(Emit::Many(captures))
        } else {
            match regex.captures(&text).and_then(|caps| self.capture(&caps)) {
                Some(value) => Ok(Emit::One(value)),
                None => Ok(Emit::None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn extract(pattern: &str, group: usize, all_matches: bool) -> Extract {
        Extract {
            regex: Regex::new(pattern).unwrap(),
            group,
            all_matches,
        }
    }

    fn record(item: Value) -> Record {
        Record::coerce(item, &spec().fields, &Map::new())
    }

    #[tokio::test]
    async fn first_match_yields_one_capture() {
        let ctx = RunContext::default();
        let mut element = extract(r"v(\d+)", 1, false);
        let out = element
            .apply(record(json!("release v42 and v43")), &ctx)
            .await
            .unwrap()
            .into_vec();
        assert_eq!(out, vec![json!("42")]);
    }

    #[tokio::test]
    async fn all_matches_yields_every_capture() {
        let ctx = RunContext::default();
        let mut element = extract(r"v(\d+)", 1, true);
        let out = element
            .apply(record(json!("v1 v2 v3")), &ctx)
            .await
            .unwrap()
            .into_vec();
        assert_eq!(out, vec![json!("1"), json!("2"), json!("3")]);
    }

    #[tokio::test]
    async fn non_matching_items_yield_nothing() {
        let ctx = RunContext::default();
        let mut element = extract(r"v(\d+)", 1, false);
        let out = element
            .apply(record(json!("no versions here")), &ctx)
            .await
            .unwrap()
            .into_vec();
        assert!(out.is_empty());
    }
}
