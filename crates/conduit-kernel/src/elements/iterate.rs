//! Iterate — expand an array item into its members.
//!
//! Non-array items pass through as a single item.

use async_trait::async_trait;
use conduit_types::{ConduitResult, ElementSpec, Value};

use crate::context::RunContext;
use crate::element::{Element, Emit};
use crate::record::Record;
use crate::registry::Factory;

pub(super) fn spec() -> ElementSpec {
    ElementSpec::new(
        "conduit.Iterate",
        "Expand an array item into its members",
    )
}

pub(super) fn factory() -> Factory {
    Box::new(|_params, _ctx| Ok(Box::new(Iterate)))
}

struct Iterate;

#[async_trait]
impl Element for Iterate {
    async fn apply(&mut self, record: Record, _ctx: &RunContext) -> ConduitResult<Emit> {
        match record.into_item() {
            Value::Array(members) => Ok(Emit::Many(members)),
            other => Ok(Emit::One(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn arrays_expand_and_scalars_pass_through() {
        let ctx = RunContext::default();
        let mut iterate = Iterate;

        let out = iterate
            .apply(Record::raw(json!([1, 2, 3])), &ctx)
            .await
            .unwrap()
            .into_vec();
        assert_eq!(out, vec![json!(1), json!(2), json!(3)]);

        let out = iterate
            .apply(Record::raw(json!("solo")), &ctx)
            .await
            .unwrap()
            .into_vec();
        assert_eq!(out, vec![json!("solo")]);
    }
}
