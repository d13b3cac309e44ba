//! Fork — multicast each item through named sub-pipelines and join.
//!
//! Per input item, every path receives exactly that one item; the joined
//! record carries one field per path, in declared order:
//!
//! - zero path outputs  → null
//! - one path output    → the value
//! - several outputs    → the ordered array of values
//!
//! With `parallel: true` the paths run concurrently; the joined record is
//! still assembled in declared order, so field content and order stay
//! deterministic. A failing path aborts the run under the stop policy;
//! under the continue policy its field is left absent and the error is
//! recorded.

use async_trait::async_trait;
use conduit_types::{ConduitError, ConduitResult, ElementSpec, ParamSchema, Value};
use serde_json::{json, Map};

use crate::context::RunContext;
use crate::element::{Element, Emit};
use crate::pipeline::Pipeline;
use crate::record::Record;
use crate::registry::Factory;

pub(super) fn spec() -> ElementSpec {
    ElementSpec::new(
        "conduit.Fork",
        "Run each item through named sub-pipelines, join one record per item",
    )
    .param(ParamSchema::required(
        "paths",
        "object",
        "Label to stage-list mapping; labels become output fields",
    ))
    .param(ParamSchema::optional(
        "parallel",
        "bool",
        json!(false),
        "Evaluate paths concurrently",
    ))
}

pub(super) fn factory() -> Factory {
    Box::new(|params, ctx| {
        let paths_param = params
            .get_object("paths")
            .ok_or_else(|| ConduitError::ElementInit("Fork needs a 'paths' mapping".into()))?;
        if paths_param.is_empty() {
            return Err(ConduitError::ElementInit(
                "Fork needs at least one path".into(),
            ));
        }

        let mut paths = Vec::with_capacity(paths_param.len());
        for (label, stages) in paths_param {
            // A single stage mapping is accepted as a one-stage list.
            let stages = match stages {
                Value::Array(list) => list.clone(),
                Value::Object(_) => vec![stages.clone()],
                other => {
                    return Err(ConduitError::ElementInit(format!(
                        "path '{label}' must be a stage list, got: {other}"
                    )))
                }
            };
            let pipeline = ctx
                .build(&stages)
                .map_err(|e| e.map_msg_prefix(label))?;
            paths.push((label.clone(), pipeline));
        }

        Ok(Box::new(Fork {
            paths,
            parallel: params.get_bool("parallel").unwrap_or(false),
        }))
    })
}

/// Prefix helper kept local: path label context on nested build errors.
trait PathError {
    fn map_msg_prefix(self, label: &str) -> Self;
}

impl PathError for ConduitError {
    fn map_msg_prefix(self, label: &str) -> Self {
        match self {
            ConduitError::UnknownElement(m) => {
                ConduitError::UnknownElement(format!("path '{label}': {m}"))
            }
            other => ConduitError::ElementInit(format!("path '{label}': {other}")),
        }
    }
}

struct Fork {
    paths: Vec<(String, Pipeline)>,
    parallel: bool,
}

impl Fork {
    /// Fold one path's outputs into its joined-record field.
    fn join(outputs: Vec<Value>) -> Value {
        match outputs.len() {
            0 => Value::Null,
            1 => outputs.into_iter().next().unwrap_or(Value::Null),
            _ => Value::Array(outputs),
        }
    }
}

#[async_trait]
impl Element for Fork {
    async fn open(&mut self, ctx: &RunContext) -> ConduitResult<()> {
        for (_, pipeline) in &mut self.paths {
            pipeline.open_all(ctx).await?;
        }
        Ok(())
    }

    async fn apply(&mut self, record: Record, ctx: &RunContext) -> ConduitResult<Emit> {
        let item = record.into_item();
        let mut joined = Map::new();

        if self.parallel {
            let futures = self.paths.iter_mut().map(|(label, pipeline)| {
                let item = item.clone();
                async move { (label.clone(), pipeline.run_for_item(item, ctx).await) }
            });
            for (label, result) in futures::future::join_all(futures).await {
                match result {
                    Ok(outputs) => {
                        joined.insert(label, Self::join(outputs));
                    }
                    Err(e) if e.is_fatal() || ctx.stop_on_error => return Err(e),
                    Err(e) => ctx.io.push_stderr(format!("fork path '{label}': {e}")),
                }
            }
        } else {
            for (label, pipeline) in &mut self.paths {
                match pipeline.run_for_item(item.clone(), ctx).await {
                    Ok(outputs) => {
                        joined.insert(label.clone(), Self::join(outputs));
                    }
                    Err(e) if e.is_fatal() || ctx.stop_on_error => return Err(e),
                    Err(e) => ctx.io.push_stderr(format!("fork path '{label}': {e}")),
                }
            }
        }

        Ok(Emit::One(Value::Object(joined)))
    }

    async fn close(&mut self, ctx: &RunContext) -> ConduitResult<()> {
        for (_, pipeline) in self.paths.iter_mut().rev() {
            pipeline.close_all(ctx).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{BuildContext, BuildOptions};
    use crate::registry::Registry;
    use std::collections::HashMap;

    fn build_fork(paths: Value, parallel: bool) -> Box<dyn Element> {
        let registry = Registry::with_builtins();
        let args = HashMap::new();
        let options = BuildOptions::default();
        let ctx = BuildContext {
            registry: &registry,
            args: &args,
            options: &options,
        };
        let params = json!({"paths": paths, "parallel": parallel});
        let params = crate::element::Params::new(params.as_object().unwrap());
        factory()(&params, &ctx).unwrap()
    }

    #[tokio::test]
    async fn joins_one_record_per_item_in_declared_order() {
        let mut fork = build_fork(
            json!({
                "doubled": [{"id": "conduit.Eval", "expression": "input.x * 2"}],
                "squared": [{"id": "conduit.Eval", "expression": "input.x * input.x"}],
            }),
            false,
        );
        let ctx = RunContext::default();
        fork.open(&ctx).await.unwrap();
        let out = fork
            .apply(Record::raw(json!({"x": 10})), &ctx)
            .await
            .unwrap()
            .into_vec();
        fork.close(&ctx).await.unwrap();

        assert_eq!(out, vec![json!({"doubled": 20, "squared": 100})]);
        // Field order follows the declared paths order.
        let keys: Vec<&String> = out[0].as_object().unwrap().keys().collect();
        assert_eq!(keys, ["doubled", "squared"]);
    }

    #[tokio::test]
    async fn empty_path_output_joins_as_null_and_multi_as_array() {
        let mut fork = build_fork(
            json!({
                "none": [{"id": "conduit.Empty"}],
                "many": [{"id": "conduit.Iterate"}],
            }),
            false,
        );
        let ctx = RunContext::default();
        fork.open(&ctx).await.unwrap();
        let out = fork
            .apply(Record::raw(json!([1, 2])), &ctx)
            .await
            .unwrap()
            .into_vec();
        fork.close(&ctx).await.unwrap();

        assert_eq!(out, vec![json!({"none": null, "many": [1, 2]})]);
    }

    #[tokio::test]
    async fn parallel_paths_join_deterministically() {
        let paths = json!({
            "a": [{"id": "conduit.Eval", "expression": "input.x + 1"}],
            "b": [{"id": "conduit.Eval", "expression": "input.x + 2"}],
            "c": [{"id": "conduit.Eval", "expression": "input.x + 3"}],
        });
        let ctx = RunContext::default();

        let mut fork = build_fork(paths.clone(), true);
        fork.open(&ctx).await.unwrap();
        let parallel = fork
            .apply(Record::raw(json!({"x": 0})), &ctx)
            .await
            .unwrap()
            .into_vec();
        fork.close(&ctx).await.unwrap();

        assert_eq!(parallel, vec![json!({"a": 1, "b": 2, "c": 3})]);
    }

    #[tokio::test]
    async fn nested_forks_build_and_run() {
        let mut fork = build_fork(
            json!({
                "inner": [{
                    "id": "conduit.Fork",
                    "paths": {"x": [{"id": "conduit.Identity"}]}
                }],
            }),
            false,
        );
        let ctx = RunContext::default();
        fork.open(&ctx).await.unwrap();
        let out = fork
            .apply(Record::raw(json!(5)), &ctx)
            .await
            .unwrap()
            .into_vec();
        fork.close(&ctx).await.unwrap();
        assert_eq!(out, vec![json!({"inner": {"x": 5}})]);
    }
}
