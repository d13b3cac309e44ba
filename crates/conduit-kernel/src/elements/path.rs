//! Path — filesystem path operations on string items.
//!
//! Operations: `filename`, `dirname`, `basename`, `extension`, `join`
//! (appends rendered `parts`), `normalize`.

use std::path::Path as FsPath;

use async_trait::async_trait;
use conduit_types::value::to_display_string;
use conduit_types::{ConduitError, ConduitResult, ElementSpec, FieldSchema, ParamSchema, Value};

use crate::context::RunContext;
use crate::element::{Element, Emit};
use crate::record::Record;
use crate::registry::Factory;
use crate::template::{normalize_path, TemplateEngine};

pub(super) fn spec() -> ElementSpec {
    ElementSpec::new("conduit.Path", "Path operations on string items")
        .param(ParamSchema::required(
            "operation",
            "string",
            "filename | dirname | basename | extension | join | normalize",
        ))
        .param(ParamSchema::optional(
            "parts",
            "array",
            Value::Null,
            "Segments appended by the join operation (templates)",
        ))
        .field(FieldSchema::optional("input", "any", "The path to transform"))
        .field(FieldSchema::optional("operation", "string", "Per-item operation"))
        .field(FieldSchema::optional("parts", "array", "Per-item join segments"))
}

pub(super) fn factory() -> Factory {
    Box::new(|params, _ctx| {
        let operation = params.require_str("operation")?;
        validate_operation(&operation).map_err(ConduitError::ElementInit)?;
        Ok(Box::new(PathOp {
            engine: TemplateEngine::new(),
        }))
    })
}

fn validate_operation(op: &str) -> Result<(), String> {
    match op {
        "filename" | "dirname" | "basename" | "extension" | "join" | "normalize" => Ok(()),
        other => Err(format!(
            "invalid operation '{other}': use filename, dirname, basename, extension, join or normalize"
        )),
    }
}

struct PathOp {
    engine: TemplateEngine,
}

#[async_trait]
impl Element for PathOp {
    async fn apply(&mut self, record: Record, _ctx: &RunContext) -> ConduitResult<Emit> {
        let input = record.get("input").cloned().unwrap_or(Value::Null);
        let path = to_display_string(&input);
        let operation = record.require_str("operation")?;
        validate_operation(&operation).map_err(ConduitError::Item)?;

        let result = match operation.as_str() {
            "filename" => FsPath::new(&path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            "dirname" => FsPath::new(&path)
                .parent()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
            "basename" => FsPath::new(&path)
                .file_stem()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            "extension" => FsPath::new(&path)
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default(),
            "normalize" => normalize_path(&path),
            "join" => {
                let mut joined = std::path::PathBuf::from(&path);
                if let Some(parts) = record.get_array("parts") {
                    for part in parts {
                        let segment = self
                            .engine
                            .render_str(&to_display_string(part), &input)?;
                        joined.push(segment);
                    }
                }
                joined.to_string_lossy().into_owned()
            }
            _ => unreachable!("validated above"),
        };
        Ok(Emit::One(Value::String(result)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn record(item: Value, defaults: &[(&str, Value)]) -> Record {
        let defaults: Map<String, Value> = defaults
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Record::coerce(item, &spec().fields, &defaults)
    }

    async fn run(op: &str, path: &str, parts: Option<Value>) -> String {
        let ctx = RunContext::default();
        let mut element = PathOp {
            engine: TemplateEngine::new(),
        };
        let mut defaults = vec![("operation", json!(op))];
        if let Some(p) = parts {
            defaults.push(("parts", p));
        }
        let out = element
            .apply(record(json!(path), &defaults), &ctx)
            .await
            .unwrap()
            .into_vec();
        out[0].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn path_operations() {
        assert_eq!(run("filename", "/a/b/report.csv", None).await, "report.csv");
        assert_eq!(run("dirname", "/a/b/report.csv", None).await, "/a/b");
        assert_eq!(run("basename", "/a/b/report.csv", None).await, "report");
        assert_eq!(run("extension", "/a/b/report.csv", None).await, ".csv");
        assert_eq!(run("normalize", "/a/./b/../c", None).await, "/a/c");
        assert_eq!(
            run("join", "/data", Some(json!(["out", "x.bin"]))).await,
            "/data/out/x.bin"
        );
    }

    #[tokio::test]
    async fn invalid_operation_is_rejected() {
        let ctx = RunContext::default();
        let mut element = PathOp {
            engine: TemplateEngine::new(),
        };
        let err = element
            .apply(record(json!("/x"), &[("operation", json!("explode"))]), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ItemError");
    }
}
