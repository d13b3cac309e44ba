//! Eval — evaluate an expression against each item, yielding the result.

use async_trait::async_trait;
use conduit_types::{ConduitResult, ElementSpec, ParamSchema};

use crate::context::RunContext;
use crate::element::{Element, Emit};
use crate::expr::Program;
use crate::record::Record;
use crate::registry::Factory;

pub(super) fn spec() -> ElementSpec {
    ElementSpec::new(
        "conduit.Eval",
        "Evaluate an expression over each item",
    )
    .param(ParamSchema::required(
        "expression",
        "string",
        "Expression over `input`, e.g. \"input.x * 2\"",
    ))
}

pub(super) fn factory() -> Factory {
    Box::new(|params, _ctx| {
        let expression = params.require_str("expression")?;
        let program = Program::compile(&expression)?;
        Ok(Box::new(Eval { program }))
    })
}

struct Eval {
    program: Program,
}

#[async_trait]
impl Element for Eval {
    async fn apply(&mut self, record: Record, _ctx: &RunContext) -> ConduitResult<Emit> {
        let result = self.program.eval(record.item())?;
        Ok(Emit::One(result))
    }
}
