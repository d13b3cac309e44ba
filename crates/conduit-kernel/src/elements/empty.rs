//! Empty — consume items and yield nothing.

use async_trait::async_trait;
use conduit_types::{ConduitResult, ElementSpec};

use crate::context::RunContext;
use crate::element::{Element, Emit};
use crate::record::Record;
use crate::registry::Factory;

pub(super) fn spec() -> ElementSpec {
    ElementSpec::new("conduit.Empty", "Consume every item and yield nothing")
}

pub(super) fn factory() -> Factory {
    Box::new(|_params, _ctx| Ok(Box::new(Empty)))
}

struct Empty;

#[async_trait]
impl Element for Empty {
    async fn apply(&mut self, _record: Record, _ctx: &RunContext) -> ConduitResult<Emit> {
        Ok(Emit::None)
    }
}
