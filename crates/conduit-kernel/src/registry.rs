//! Element registry: dotted ids mapped to schemas and factories.
//!
//! Built-ins live under the `conduit.` namespace. Third-party elements
//! arrive two ways: embedding code calls [`Registry::register`], or
//! manifest files found on `CONDUIT_SEARCH_PATHS` declare *composite*
//! elements — an id, optional params, and a stage list that runs as a
//! sub-pipeline per item.
//!
//! Ids are globally unique; registering a duplicate is a build-time error.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use conduit_types::{ConduitError, ConduitResult, ElementSpec, ParamSchema, Value};

use crate::context::RunContext;
use crate::element::{Element, Emit, Params};
use crate::pipeline::{BuildContext, Pipeline};
use crate::record::Record;
use crate::resolve::resolve_tree;

/// Environment variable with colon-separated manifest directories.
pub const SEARCH_PATHS_VAR: &str = "CONDUIT_SEARCH_PATHS";

/// Factory building one element instance from its constructor parameters.
pub type Factory =
    Box<dyn Fn(&Params<'_>, &BuildContext<'_>) -> ConduitResult<Box<dyn Element>> + Send + Sync>;

/// One registered element: schema plus factory.
pub struct RegistryEntry {
    spec: ElementSpec,
    factory: Factory,
}

impl RegistryEntry {
    /// The element's schema.
    pub fn spec(&self) -> &ElementSpec {
        &self.spec
    }

    /// Instantiate the element for one stage.
    pub fn instantiate(
        &self,
        params: &Params<'_>,
        ctx: &BuildContext<'_>,
    ) -> ConduitResult<Box<dyn Element>> {
        (self.factory)(params, ctx)
    }
}

/// The element registry.
#[derive(Default)]
pub struct Registry {
    entries: BTreeMap<String, RegistryEntry>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in element registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::elements::register_builtins(&mut registry)
            .expect("builtin ids are unique");
        registry
    }

    /// Register an element. Duplicate ids are a build-time error.
    pub fn register(&mut self, spec: ElementSpec, factory: Factory) -> ConduitResult<()> {
        let id = spec.id.clone();
        if self.entries.contains_key(&id) {
            return Err(ConduitError::ElementInit(format!(
                "element id '{id}' is already registered"
            )));
        }
        self.entries.insert(id, RegistryEntry { spec, factory });
        Ok(())
    }

    /// Look up an element by dotted id.
    pub fn get(&self, id: &str) -> Option<&RegistryEntry> {
        self.entries.get(id)
    }

    /// All registered specs, ordered by id.
    pub fn specs(&self) -> impl Iterator<Item = &ElementSpec> {
        self.entries.values().map(|e| &e.spec)
    }

    /// Number of registered elements.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Scan `CONDUIT_SEARCH_PATHS` for composite-element manifests.
    /// Returns how many elements were registered.
    pub fn load_search_paths(&mut self) -> ConduitResult<usize> {
        let Ok(paths) = std::env::var(SEARCH_PATHS_VAR) else {
            return Ok(0);
        };
        let mut count = 0;
        for dir in paths.split(':').filter(|p| !p.is_empty()) {
            count += self.load_manifest_dir(Path::new(dir))?;
        }
        Ok(count)
    }

    /// Load every `*.yaml` / `*.yml` manifest in a directory.
    pub fn load_manifest_dir(&mut self, dir: &Path) -> ConduitResult<usize> {
        if !dir.is_dir() {
            tracing::warn!(path = %dir.display(), "search path is not a directory, skipping");
            return Ok(0);
        }
        let mut count = 0;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_yaml = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == "yaml" || e == "yml");
            if !is_yaml {
                continue;
            }
            let source = std::fs::read_to_string(&path)?;
            self.register_manifest(&source).map_err(|e| {
                ConduitError::ElementInit(format!("manifest {}: {e}", path.display()))
            })?;
            count += 1;
        }
        Ok(count)
    }

    /// Register one composite element from manifest source.
    pub fn register_manifest(&mut self, source: &str) -> ConduitResult<()> {
        let yaml: serde_yaml::Value = serde_yaml::from_str(source)
            .map_err(|e| ConduitError::Parse(format!("invalid manifest YAML: {e}")))?;
        let doc: Value = serde_json::to_value(&yaml)?;

        let id = doc
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| ConduitError::Parse("manifest is missing a string 'id'".into()))?
            .to_string();
        if !id.contains('.') {
            return Err(ConduitError::ElementInit(format!(
                "manifest id '{id}' must be namespaced (namespace.Name)"
            )));
        }
        if id.starts_with("conduit.") {
            return Err(ConduitError::ElementInit(format!(
                "manifest id '{id}' may not use the builtin 'conduit.' namespace"
            )));
        }
        let summary = doc
            .get("summary")
            .and_then(Value::as_str)
            .unwrap_or("composite element")
            .to_string();
        let stages = doc
            .get("pipeline")
            .and_then(Value::as_array)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ConduitError::Parse(format!("manifest '{id}' needs a non-empty 'pipeline' list"))
            })?
            .clone();

        let mut spec = ElementSpec::new(&id, &summary);
        let mut param_names = Vec::new();
        if let Some(params) = doc.get("params").and_then(Value::as_array) {
            for p in params {
                let name = p
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        ConduitError::Parse(format!("manifest '{id}': param without a name"))
                    })?
                    .to_string();
                let ptype = p
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or("string")
                    .to_string();
                let description = p
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                spec = match p.get("default") {
                    Some(default) => spec.param(ParamSchema::optional(
                        &name,
                        &ptype,
                        default.clone(),
                        &description,
                    )),
                    None => spec.param(ParamSchema::required(&name, &ptype, &description)),
                };
                param_names.push((name, p.get("default").cloned()));
            }
        }

        tracing::info!(id = %id, stages = stages.len(), "registered composite element");
        self.register(
            spec,
            Box::new(move |params, ctx| {
                // Composite params become `${name}` bindings for the nested
                // stage list, layered over the run-args.
                let mut args = ctx.args.clone();
                for (name, default) in &param_names {
                    let value = params
                        .get_str(name)
                        .or_else(|| default.as_ref().and_then(stringify));
                    match value {
                        Some(v) => {
                            args.insert(name.clone(), v);
                        }
                        None => {
                            return Err(ConduitError::ElementInit(format!(
                                "missing required parameter '{name}'"
                            )))
                        }
                    }
                }
                let resolved = resolve_tree(&Value::Array(stages.clone()), &args)?;
                let resolved = resolved.as_array().ok_or_else(|| {
                    ConduitError::Internal("resolved stage list lost its shape".into())
                })?;
                let nested = BuildContext {
                    registry: ctx.registry,
                    args: ctx.args,
                    options: ctx.options,
                };
                let pipeline = nested.build(resolved)?;
                Ok(Box::new(CompositeElement { pipeline }))
            }),
        )
    }
}

fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A manifest-declared element: runs its stage list as a sub-pipeline,
/// feeding each incoming item through and emitting everything it yields.
struct CompositeElement {
    pipeline: Pipeline,
}

#[async_trait]
impl Element for CompositeElement {
    async fn open(&mut self, ctx: &RunContext) -> ConduitResult<()> {
        self.pipeline.open_all(ctx).await
    }

    async fn apply(&mut self, record: Record, ctx: &RunContext) -> ConduitResult<Emit> {
        let outputs = self.pipeline.run_for_item(record.into_item(), ctx).await?;
        Ok(Emit::Many(outputs))
    }

    async fn close(&mut self, ctx: &RunContext) -> ConduitResult<()> {
        self.pipeline.close_all(ctx).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_registration_is_an_error() {
        let mut registry = Registry::new();
        let factory = || -> Factory {
            Box::new(|_, _| Err(ConduitError::Internal("test factory".into())))
        };
        registry
            .register(ElementSpec::new("t.A", "first"), factory())
            .unwrap();
        let err = registry
            .register(ElementSpec::new("t.A", "second"), factory())
            .unwrap_err();
        assert_eq!(err.kind(), "ElementInitError");
    }

    #[test]
    fn manifest_ids_must_be_namespaced_outside_conduit() {
        let mut registry = Registry::new();
        let err = registry
            .register_manifest("id: NoDots\npipeline:\n  - id: conduit.Identity\n")
            .unwrap_err();
        assert_eq!(err.kind(), "ElementInitError");

        let err = registry
            .register_manifest("id: conduit.Sneaky\npipeline:\n  - id: conduit.Identity\n")
            .unwrap_err();
        assert_eq!(err.kind(), "ElementInitError");
    }

    #[test]
    fn manifest_requires_a_pipeline() {
        let mut registry = Registry::new();
        let err = registry.register_manifest("id: my.Thing\n").unwrap_err();
        assert_eq!(err.kind(), "ParseError");
    }

    #[test]
    fn manifest_directories_register_their_elements() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("shout.yaml"),
            "id: my.Shout\npipeline:\n  - id: conduit.Format\n    template: \"{{input}}!\"\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a manifest").unwrap();

        let mut registry = Registry::with_builtins();
        let count = registry.load_manifest_dir(dir.path()).unwrap();
        assert_eq!(count, 1);
        assert!(registry.get("my.Shout").is_some());
    }
}
