//! Input — yield a configured list of items.
//!
//! A pure source: upstream input is ignored, the configured items are
//! produced once, in order.

use async_trait::async_trait;
use conduit_types::{ConduitError, ConduitResult, ElementSpec, ParamSchema, Value};

use crate::context::RunContext;
use crate::element::{Element, Emit};
use crate::record::Record;
use crate::registry::Factory;

pub(super) fn spec() -> ElementSpec {
    ElementSpec::new("conduit.Input", "Yield each member of a configured list")
        .param(ParamSchema::required(
            "data",
            "array",
            "Items to yield, in order",
        ))
        .source()
}

pub(super) fn factory() -> Factory {
    Box::new(|params, _ctx| {
        let data = params
            .get_array("data")
            .cloned()
            .ok_or_else(|| ConduitError::ElementInit("missing required parameter 'data'".into()))?;
        Ok(Box::new(Input { data: Some(data) }))
    })
}

struct Input {
    data: Option<Vec<Value>>,
}

#[async_trait]
impl Element for Input {
    async fn apply(&mut self, record: Record, _ctx: &RunContext) -> ConduitResult<Emit> {
        // Sources are never fed upstream items; pass anything through so a
        // misplaced Input stays harmless.
        Ok(Emit::One(record.into_item()))
    }

    async fn flush(&mut self, _ctx: &RunContext) -> ConduitResult<Emit> {
        Ok(Emit::Many(self.data.take().unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn flush_yields_data_once_in_order() {
        let mut input = Input {
            data: Some(vec![json!(1), json!(2)]),
        };
        let ctx = RunContext::default();
        let first = input.flush(&ctx).await.unwrap().into_vec();
        assert_eq!(first, vec![json!(1), json!(2)]);
        let second = input.flush(&ctx).await.unwrap().into_vec();
        assert!(second.is_empty());
    }
}
