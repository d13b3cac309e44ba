//! Identity — pass items through untouched.

use async_trait::async_trait;
use conduit_types::{ConduitResult, ElementSpec};

use crate::context::RunContext;
use crate::element::{Element, Emit};
use crate::record::Record;
use crate::registry::Factory;

pub(super) fn spec() -> ElementSpec {
    ElementSpec::new("conduit.Identity", "Pass every item through unchanged")
}

pub(super) fn factory() -> Factory {
    Box::new(|_params, _ctx| Ok(Box::new(Identity)))
}

struct Identity;

#[async_trait]
impl Element for Identity {
    async fn apply(&mut self, record: Record, _ctx: &RunContext) -> ConduitResult<Emit> {
        Ok(Emit::One(record.into_item()))
    }
}
