//! Glob — yield filesystem paths matching a pattern.

use std::path::Path;

use async_trait::async_trait;
use conduit_types::{ConduitError, ConduitResult, ElementSpec, FieldSchema, ParamSchema, Value};
use serde_json::json;

use crate::context::RunContext;
use crate::element::{Element, Emit};
use crate::record::Record;
use crate::registry::Factory;

pub(super) fn spec() -> ElementSpec {
    ElementSpec::new("conduit.Glob", "Yield paths matching a glob pattern")
        .param(ParamSchema::optional(
            "pattern",
            "string",
            json!("*"),
            "Glob pattern (** matches recursively)",
        ))
        .param(ParamSchema::optional(
            "root_dir",
            "string",
            json!("."),
            "Directory the pattern is relative to",
        ))
        .param(ParamSchema::optional(
            "recursive",
            "bool",
            json!(false),
            "Search subdirectories (prefixes the pattern with **/)",
        ))
        .param(ParamSchema::optional(
            "max",
            "int",
            Value::Null,
            "Maximum number of paths to yield",
        ))
        .field(FieldSchema::optional("pattern", "string", "Per-item pattern"))
        .field(FieldSchema::optional("root_dir", "string", "Per-item root"))
        .field(FieldSchema::optional("recursive", "bool", "Per-item recursion"))
        .field(FieldSchema::optional("max", "int", "Per-item limit"))
}

pub(super) fn factory() -> Factory {
    Box::new(|_params, _ctx| Ok(Box::new(Glob)))
}

struct Glob;

#[async_trait]
impl Element for Glob {
    async fn apply(&mut self, record: Record, _ctx: &RunContext) -> ConduitResult<Emit> {
        let pattern = record.get_str("pattern").unwrap_or_else(|| "*".to_string());
        let root_dir = record.get_str("root_dir").unwrap_or_else(|| ".".to_string());
        let recursive = record.get_bool("recursive").unwrap_or(false);
        let max = record.get_i64("max").map(|n| n.max(0) as usize);

        let pattern = if recursive && !pattern.contains("**") {
            format!("**/{pattern}")
        } else {
            pattern
        };
        let full = Path::new(&root_dir).join(&pattern);
        let full = full.to_string_lossy().into_owned();

        let walker = glob::glob(&full)
            .map_err(|e| ConduitError::Item(format!("invalid glob '{full}': {e}")))?;

        let mut matches = Vec::new();
        for entry in walker {
            let path = entry.map_err(|e| ConduitError::Resource(e.to_string()))?;
            matches.push(json!({"filename": path.to_string_lossy()}));
            if max.is_some_and(|m| matches.len() >= m) {
                break;
            }
        }
        Ok(Emit::Many(matches))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use std::fs;

    fn record(defaults: &[(&str, Value)]) -> Record {
        let defaults: Map<String, Value> = defaults
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Record::coerce(json!({}), &spec().fields, &defaults)
    }

    #[tokio::test]
    async fn matches_files_under_root_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.csv"), "x").unwrap();
        fs::write(dir.path().join("b.csv"), "x").unwrap();
        fs::write(dir.path().join("c.txt"), "x").unwrap();

        let ctx = RunContext::default();
        let mut element = Glob;
        let rec = record(&[
            ("pattern", json!("*.csv")),
            ("root_dir", json!(dir.path().to_string_lossy())),
        ]);
        let mut out = element.apply(rec, &ctx).await.unwrap().into_vec();
        out.sort_by_key(|v| v["filename"].as_str().unwrap().to_string());
        assert_eq!(out.len(), 2);
        assert!(out[0]["filename"].as_str().unwrap().ends_with("a.csv"));
    }

    #[tokio::test]
    async fn recursive_prefixes_double_star() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/deep.csv"), "x").unwrap();

        let ctx = RunContext::default();
        let mut element = Glob;
        let rec = record(&[
            ("pattern", json!("*.csv")),
            ("root_dir", json!(dir.path().to_string_lossy())),
            ("recursive", json!(true)),
        ]);
        let out = element.apply(rec, &ctx).await.unwrap().into_vec();
        assert_eq!(out.len(), 1);
        assert!(out[0]["filename"].as_str().unwrap().contains("deep.csv"));
    }

    #[tokio::test]
    async fn max_caps_the_result_count() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["1.txt", "2.txt", "3.txt"] {
            fs::write(dir.path().join(name), "x").unwrap();
        }
        let ctx = RunContext::default();
        let mut element = Glob;
        let rec = record(&[
            ("pattern", json!("*.txt")),
            ("root_dir", json!(dir.path().to_string_lossy())),
            ("max", json!(2)),
        ]);
        let out = element.apply(rec, &ctx).await.unwrap().into_vec();
        assert_eq!(out.len(), 2);
    }
}
