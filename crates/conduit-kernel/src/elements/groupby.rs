//! GroupBy — buffer all items, emit one record per group.
//!
//! A buffered element: nothing is emitted until upstream exhausts. Groups
//! come out in first-seen key order as `{key, values}` records.

use async_trait::async_trait;
use conduit_types::value::to_display_string;
use conduit_types::{ConduitResult, ElementSpec, FieldSchema, ParamSchema, Value};
use serde_json::json;

use crate::context::RunContext;
use crate::element::{Element, Emit};
use crate::expr::Program;
use crate::record::Record;
use crate::registry::Factory;

pub(super) fn spec() -> ElementSpec {
    ElementSpec::new("conduit.GroupBy", "Group items by a key expression")
        .param(ParamSchema::required(
            "key",
            "string",
            "Expression producing the group key, e.g. \"input['c']\"",
        ))
        .param(ParamSchema::optional(
            "value",
            "string",
            Value::Null,
            "Expression for the grouped values (default: the item)",
        ))
        .field(FieldSchema::optional("input", "any", "The item to group"))
        .buffered()
}

pub(super) fn factory() -> Factory {
    Box::new(|params, _ctx| {
        let key = Program::compile(&params.require_str("key")?)?;
        let value = params
            .get_str("value")
            .map(|v| Program::compile(&v))
            .transpose()?;
        Ok(Box::new(GroupBy {
            key,
            value,
            groups: Vec::new(),
        }))
    })
}

struct GroupBy {
    key: Program,
    value: Option<Program>,
    /// First-seen key order.
    groups: Vec<(String, Vec<Value>)>,
}

#[async_trait]
impl Element for GroupBy {
    async fn apply(&mut self, record: Record, _ctx: &RunContext) -> ConduitResult<Emit> {
        let input = record.get("input").cloned().unwrap_or(Value::Null);

        let key = self.key.eval(&input)?;
        let key = if key.is_null() {
            "null".to_string()
        } else {
            to_display_string(&key)
        };
        let value = match &self.value {
            Some(program) => program.eval(&input)?,
            None => input,
        };

        match self.groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.groups.push((key, vec![value])),
        }
        Ok(Emit::None)
    }

    async fn flush(&mut self, _ctx: &RunContext) -> ConduitResult<Emit> {
        let groups = std::mem::take(&mut self.groups);
        Ok(Emit::Many(
            groups
                .into_iter()
                .map(|(key, values)| json!({"key": key, "values": values}))
                .collect(),
        ))
    }
}
