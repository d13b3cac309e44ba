//! Pipeline building and the streaming executor.
//!
//! A pipeline is built once per run from resolved stage descriptors, then
//! driven by a single pull loop: the sink pulls from the last stage, each
//! stage pulls one item at a time from its upstream, coerces it into the
//! element's declared shape, merges constructor defaults and calls `apply`.
//! Only the outputs of the single in-flight item are buffered per edge;
//! declared-buffered elements (`GroupBy`, `Sort`) accumulate in `apply` and
//! emit from `flush`.
//!
//! Lifecycle: `open` runs first-to-last before the first pull, `close` runs
//! last-to-first exactly once on success, error and cancel.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use conduit_types::{
    ConduitError, ConduitResult, ElementMetrics, ElementSpec, RunReport, RunStats, Value,
};
use futures::future::BoxFuture;
use serde_json::{json, Map};

use crate::context::RunContext;
use crate::element::{Element, Params};
use crate::record::Record;
use crate::registry::Registry;
use crate::resolve::resolve_tree;

/// One stage descriptor: a dotted id plus its raw parameters.
#[derive(Debug, Clone)]
pub struct StageDescriptor {
    /// Dotted element id.
    pub id: String,
    /// Descriptor keys other than `id`, env/arg-resolved.
    pub params: Map<String, Value>,
}

impl StageDescriptor {
    /// Split a JSON object into id and parameters.
    pub fn from_value(value: &Value) -> ConduitResult<StageDescriptor> {
        let map = value.as_object().ok_or_else(|| {
            ConduitError::Parse(format!(
                "pipeline stage must be a mapping, got: {value}"
            ))
        })?;
        let id = map
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| ConduitError::Parse("pipeline stage is missing a string 'id'".into()))?
            .to_string();
        let mut params = map.clone();
        params.remove("id");
        Ok(StageDescriptor { id, params })
    }
}

/// Build-time options.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Treat unknown descriptor keys as errors instead of warnings.
    pub strict_keys: bool,
}

/// Context handed to element factories during build.
///
/// Fork paths and composite manifests recurse through [`BuildContext::build`]
/// so nested pipelines share the registry, args and options.
pub struct BuildContext<'a> {
    /// The element registry.
    pub registry: &'a Registry,
    /// Run-args used for `${...}` resolution of nested documents.
    pub args: &'a HashMap<String, String>,
    /// Build options.
    pub options: &'a BuildOptions,
}

impl BuildContext<'_> {
    /// Build a pipeline from an array of stage values.
    pub fn build(&self, stages: &[Value]) -> ConduitResult<Pipeline> {
        if stages.is_empty() {
            return Err(ConduitError::Parse("pipeline has no stages".into()));
        }
        let descriptors = stages
            .iter()
            .map(StageDescriptor::from_value)
            .collect::<ConduitResult<Vec<_>>>()?;
        self.build_descriptors(&descriptors)
    }

    /// Build a pipeline from parsed descriptors.
    pub fn build_descriptors(&self, descriptors: &[StageDescriptor]) -> ConduitResult<Pipeline> {
        let mut stages = Vec::with_capacity(descriptors.len());
        for (index, desc) in descriptors.iter().enumerate() {
            let stage = self
                .build_stage(desc, index)
                .map_err(|e| e.at_stage(index, &desc.id))?;
            stages.push(stage);
        }
        Ok(Pipeline {
            stages,
            seed: None,
        })
    }

    fn build_stage(&self, desc: &StageDescriptor, index: usize) -> ConduitResult<Stage> {
        let entry = self
            .registry
            .get(&desc.id)
            .ok_or_else(|| ConduitError::UnknownElement(desc.id.clone()))?;
        let spec = entry.spec().clone();

        // Split descriptor keys: constructor args, per-item defaults, or
        // both. Keys matching neither warn (error under strict_keys).
        let mut defaults = Map::new();
        for (key, value) in &desc.params {
            let is_param = spec.find_param(key).is_some();
            let is_field = spec.find_field(key).is_some();
            if is_field {
                defaults.insert(key.clone(), value.clone());
            }
            if !is_param && !is_field {
                if self.options.strict_keys {
                    return Err(ConduitError::SchemaMismatch(format!(
                        "unknown key '{}' for element {}",
                        key, desc.id
                    )));
                }
                tracing::warn!(stage = %desc.id, key = %key, "ignoring unknown descriptor key");
            }
        }
        validate_types(&spec, &desc.params)?;

        let params = Params::new(&desc.params);
        let element = entry.instantiate(&params, self)?;

        tracing::debug!(stage = %desc.id, index, "built pipeline stage");
        Ok(Stage {
            id: desc.id.clone(),
            index,
            spec,
            defaults,
            element,
            metrics: ElementMetrics::new(&desc.id),
            pending: VecDeque::new(),
            done: false,
            opened: false,
        })
    }
}

/// Check declared container types at build time so a mistyped descriptor
/// fails before the run starts.
fn validate_types(spec: &ElementSpec, params: &Map<String, Value>) -> ConduitResult<()> {
    for (key, value) in params {
        let declared = spec
            .find_param(key)
            .map(|p| p.param_type.as_str())
            .or_else(|| spec.find_field(key).map(|f| f.field_type.as_str()));
        let ok = match declared {
            Some("array") => value.is_array() || value.is_null(),
            Some("object") => value.is_object() || value.is_null(),
            // Scalars accept strings throughout: `${...}` expansion always
            // produces strings and elements coerce.
            _ => true,
        };
        if !ok {
            return Err(ConduitError::SchemaMismatch(format!(
                "key '{}' of {} must be of type {}",
                key,
                spec.id,
                declared.unwrap_or("any")
            )));
        }
    }
    Ok(())
}

/// One built stage: the element plus its stream state and counters.
struct Stage {
    id: String,
    index: usize,
    spec: ElementSpec,
    defaults: Map<String, Value>,
    element: Box<dyn Element>,
    metrics: ElementMetrics,
    pending: VecDeque<Value>,
    done: bool,
    opened: bool,
}

impl Stage {
    /// Record a per-item failure: abort under the stop policy (or for fatal
    /// kinds), otherwise log to the run's stderr channel and move on.
    fn note_error(&mut self, err: ConduitError, ctx: &RunContext) -> ConduitResult<()> {
        let err = err.at_stage(self.index, &self.id);
        if err.is_fatal() || ctx.stop_on_error {
            return Err(err);
        }
        self.metrics.errors += 1;
        tracing::warn!(stage = %self.id, error = %err, "continuing past item error");
        ctx.io.push_stderr(err.to_string());
        Ok(())
    }
}

/// A built pipeline, ready to execute (or to serve as a Fork path).
pub struct Pipeline {
    stages: Vec<Stage>,
    /// Bootstrap item for the first stage; consumed on its first pull.
    seed: Option<Value>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stages.len())
            .finish()
    }
}

impl Pipeline {
    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the pipeline has no stages (never true for built pipelines).
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Open every stage, first to last. On failure the stages opened so far
    /// are closed in reverse before the error propagates.
    pub async fn open_all(&mut self, ctx: &RunContext) -> ConduitResult<()> {
        for i in 0..self.stages.len() {
            let result = self.stages[i].element.open(ctx).await;
            match result {
                Ok(()) => self.stages[i].opened = true,
                Err(e) => {
                    let e = e.at_stage(i, &self.stages[i].id);
                    self.close_all(ctx).await;
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Close every opened stage, last to first. Each stage closes at most
    /// once; close failures are logged, never raised.
    pub async fn close_all(&mut self, ctx: &RunContext) {
        for stage in self.stages.iter_mut().rev() {
            if stage.opened {
                stage.opened = false;
                if let Err(e) = stage.element.close(ctx).await {
                    tracing::warn!(stage = %stage.id, error = %e, "error while closing element");
                }
            }
        }
    }

    /// Reset stream state (not metrics, not open/close state) and set the
    /// bootstrap item for the next drive.
    fn reset(&mut self, seed: Option<Value>) {
        for stage in &mut self.stages {
            stage.pending.clear();
            stage.done = false;
        }
        self.seed = seed;
    }

    /// Pull the next value from the end of the chain.
    pub async fn next(&mut self, ctx: &RunContext) -> ConduitResult<Option<Value>> {
        pull_from(&mut self.stages, &mut self.seed, ctx).await
    }

    /// Drive a single item through the chain and collect every output.
    /// Used by Fork paths and composite elements; assumes `open_all` ran.
    pub async fn run_for_item(&mut self, item: Value, ctx: &RunContext) -> ConduitResult<Vec<Value>> {
        self.reset(Some(item));
        let mut out = Vec::new();
        while let Some(v) = self.next(ctx).await? {
            out.push(v);
        }
        Ok(out)
    }

    /// Execute the pipeline end to end: open, drain, close, report.
    pub async fn execute(&mut self, ctx: &RunContext) -> ConduitResult<RunReport> {
        let started = Instant::now();
        let bootstrap = if self.stages.first().is_some_and(|s| s.spec.source) {
            None
        } else {
            Some(json!({}))
        };
        self.reset(bootstrap);

        self.open_all(ctx).await?;
        let mut results = Vec::new();
        let outcome = loop {
            match self.next(ctx).await {
                Ok(Some(v)) => results.push(v),
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.close_all(ctx).await;

        let duration = started.elapsed().as_secs_f64();
        outcome?;

        let total = results.len() as u64;
        let stats = RunStats {
            duration,
            total_items_processed: total,
            throughput: if duration > 0.0 {
                total as f64 / duration
            } else {
                0.0
            },
            element_metrics: self.stages.iter().map(|s| s.metrics.clone()).collect(),
        };
        tracing::info!(
            items = total,
            duration_secs = duration,
            "pipeline run complete"
        );
        Ok(RunReport {
            success: true,
            results,
            stdout: ctx.io.take_stdout(),
            stderr: ctx.io.take_stderr(),
            stats,
        })
    }
}

/// Recursive pull over the stage slice: the last stage drains its pending
/// outputs, then asks the prefix for the next upstream item.
fn pull_from<'a>(
    stages: &'a mut [Stage],
    seed: &'a mut Option<Value>,
    ctx: &'a RunContext,
) -> BoxFuture<'a, ConduitResult<Option<Value>>> {
    Box::pin(async move {
        let Some((stage, upstream)) = stages.split_last_mut() else {
            // Base of the chain: the bootstrap item, exactly once.
            return Ok(seed.take());
        };

        loop {
            if ctx.cancel.is_cancelled() {
                return Err(ConduitError::Cancelled);
            }
            if let Some(value) = stage.pending.pop_front() {
                stage.metrics.items_out += 1;
                return Ok(Some(value));
            }
            if stage.done {
                return Ok(None);
            }

            // Pure sources never pull upstream; they produce from flush.
            let next = if stage.spec.source {
                None
            } else {
                pull_from(upstream, seed, ctx).await?
            };

            match next {
                Some(item) => {
                    stage.metrics.items_in += 1;
                    let item_index = (stage.metrics.items_in - 1) as usize;
                    let record = if stage.spec.fields.is_empty() {
                        Record::raw(item)
                    } else {
                        Record::coerce(item, &stage.spec.fields, &stage.defaults)
                    };
                    let clock = Instant::now();
                    let applied = stage.element.apply(record, ctx).await;
                    stage.metrics.duration += clock.elapsed().as_secs_f64();
                    match applied {
                        Ok(emit) => stage.pending.extend(emit.into_vec()),
                        Err(e) => stage.note_error(e.at_item(item_index), ctx)?,
                    }
                }
                None => {
                    let clock = Instant::now();
                    let flushed = stage.element.flush(ctx).await;
                    stage.metrics.duration += clock.elapsed().as_secs_f64();
                    stage.done = true;
                    match flushed {
                        Ok(emit) => stage.pending.extend(emit.into_vec()),
                        Err(e) => stage.note_error(e, ctx)?,
                    }
                }
            }
        }
    })
}

/// Parse a YAML pipeline document, resolve `${...}` tokens and build.
pub fn build_from_yaml(
    source: &str,
    registry: &Registry,
    args: &HashMap<String, String>,
    options: &BuildOptions,
) -> ConduitResult<Pipeline> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(source)
        .map_err(|e| ConduitError::Parse(format!("invalid pipeline YAML: {e}")))?;
    let tree: Value = serde_json::to_value(&yaml)
        .map_err(|e| ConduitError::Parse(format!("pipeline document is not representable: {e}")))?;
    build_from_value(&tree, registry, args, options)
}

/// Resolve and build a pipeline from an already parsed JSON tree (the HTTP
/// driver hands descriptors over as JSON).
pub fn build_from_value(
    tree: &Value,
    registry: &Registry,
    args: &HashMap<String, String>,
    options: &BuildOptions,
) -> ConduitResult<Pipeline> {
    let resolved = resolve_tree(tree, args)?;
    let stages = resolved
        .as_array()
        .ok_or_else(|| ConduitError::Parse("pipeline document must be a sequence of stages".into()))?;
    let ctx = BuildContext {
        registry,
        args,
        options,
    };
    ctx.build(stages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_requires_string_id() {
        assert!(StageDescriptor::from_value(&json!({"id": "conduit.Input"})).is_ok());
        assert!(StageDescriptor::from_value(&json!({"data": []})).is_err());
        assert!(StageDescriptor::from_value(&json!("conduit.Input")).is_err());
        assert!(StageDescriptor::from_value(&json!({"id": 42})).is_err());
    }

    #[test]
    fn descriptor_separates_id_from_params() {
        let desc =
            StageDescriptor::from_value(&json!({"id": "conduit.Input", "data": [1, 2]})).unwrap();
        assert_eq!(desc.id, "conduit.Input");
        assert_eq!(desc.params.len(), 1);
        assert!(desc.params.contains_key("data"));
    }

    #[test]
    fn container_types_are_validated() {
        let spec = ElementSpec::new("t.X", "test")
            .param(conduit_types::ParamSchema::required("data", "array", ""));
        let params = json!({"data": "not-an-array"});
        let err = validate_types(&spec, params.as_object().unwrap()).unwrap_err();
        assert_eq!(err.kind(), "SchemaMismatch");

        let params = json!({"data": [1]});
        assert!(validate_types(&spec, params.as_object().unwrap()).is_ok());
    }
}
