//! Find — walk a directory tree, yielding matching paths.
//!
//! Filters: `name` (glob on the file name), `type` (`f` files, `d`
//! directories), `max_depth`.

use std::path::Path;

use async_trait::async_trait;
use conduit_types::{ConduitError, ConduitResult, ElementSpec, FieldSchema, ParamSchema, Value};
use serde_json::json;

use crate::context::RunContext;
use crate::element::{Element, Emit};
use crate::record::Record;
use crate::registry::Factory;

pub(super) fn spec() -> ElementSpec {
    ElementSpec::new("conduit.Find", "Search a directory hierarchy")
        .param(ParamSchema::optional(
            "path",
            "string",
            json!("."),
            "Starting directory",
        ))
        .param(ParamSchema::optional(
            "name",
            "string",
            Value::Null,
            "Glob pattern matched against file names",
        ))
        .param(ParamSchema::optional(
            "type",
            "string",
            Value::Null,
            "Type filter: 'f' for files, 'd' for directories",
        ))
        .param(ParamSchema::optional(
            "max_depth",
            "int",
            Value::Null,
            "Maximum directory depth to descend",
        ))
        .field(FieldSchema::optional("path", "string", "Per-item start directory"))
        .field(FieldSchema::optional("name", "string", "Per-item name pattern"))
        .field(FieldSchema::optional("type", "string", "Per-item type filter"))
        .field(FieldSchema::optional("max_depth", "int", "Per-item depth limit"))
}

pub(super) fn factory() -> Factory {
    Box::new(|_params, _ctx| Ok(Box::new(Find)))
}

struct Find;

#[derive(Clone, Copy, PartialEq)]
enum TypeFilter {
    All,
    Files,
    Dirs,
}

fn walk(
    dir: &Path,
    pattern: Option<&glob::Pattern>,
    types: TypeFilter,
    depth_left: Option<usize>,
    out: &mut Vec<Value>,
) -> std::io::Result<()> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)?.collect::<Result<_, _>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let is_dir = path.is_dir();
        let name = entry.file_name();
        let name = name.to_string_lossy();

        let type_ok = match types {
            TypeFilter::All => true,
            TypeFilter::Files => !is_dir,
            TypeFilter::Dirs => is_dir,
        };
        let name_ok = pattern.map_or(true, |p| p.matches(&name));
        if type_ok && name_ok {
            out.push(json!(path.to_string_lossy()));
        }

        if is_dir {
            match depth_left {
                Some(0) => {}
                Some(n) => walk(&path, pattern, types, Some(n - 1), out)?,
                None => walk(&path, pattern, types, None, out)?,
            }
        }
    }
    Ok(())
}

#[async_trait]
impl Element for Find {
    async fn apply(&mut self, record: Record, _ctx: &RunContext) -> ConduitResult<Emit> {
        let start = record.get_str("path").unwrap_or_else(|| ".".to_string());
        let root = Path::new(&start);
        if !root.exists() {
            return Err(ConduitError::Resource(format!(
                "'{start}': no such file or directory"
            )));
        }

        let pattern = record
            .get_str("name")
            .map(|n| {
                glob::Pattern::new(&n)
                    .map_err(|e| ConduitError::Item(format!("invalid pattern '{n}': {e}")))
            })
            .transpose()?;

        let types = match record.get_str("type").as_deref() {
            Some("f") => TypeFilter::Files,
            Some("d") => TypeFilter::Dirs,
            Some(other) => {
                return Err(ConduitError::Item(format!(
                    "invalid type '{other}': use 'f' or 'd'"
                )))
            }
            None => TypeFilter::All,
        };
        let max_depth = record
            .get_i64("max_depth")
            .map(|n| n.max(0) as usize)
            .map(|n| n.saturating_sub(1));

        let mut matches = Vec::new();
        walk(root, pattern.as_ref(), types, max_depth, &mut matches)?;
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

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("top.rs"), "").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/deep.rs"), "").unwrap();
        fs::write(dir.path().join("sub/other.txt"), "").unwrap();
        dir
    }

    #[tokio::test]
    async fn name_pattern_filters_matches() {
        let dir = tree();
        let ctx = RunContext::default();
        let out = Find
            .apply(
                record(&[
                    ("path", json!(dir.path().to_string_lossy())),
                    ("name", json!("*.rs")),
                ]),
                &ctx,
            )
            .await
            .unwrap()
            .into_vec();
        assert_eq!(out.len(), 2);
    }

    #[tokio::test]
    async fn type_and_depth_filters() {
        let dir = tree();
        let ctx = RunContext::default();
        let dirs = Find
            .apply(
                record(&[
                    ("path", json!(dir.path().to_string_lossy())),
                    ("type", json!("d")),
                ]),
                &ctx,
            )
            .await
            .unwrap()
            .into_vec();
        assert_eq!(dirs.len(), 1);

        let shallow = Find
            .apply(
                record(&[
                    ("path", json!(dir.path().to_string_lossy())),
                    ("name", json!("*.rs")),
                    ("max_depth", json!(1)),
                ]),
                &ctx,
            )
            .await
            .unwrap()
            .into_vec();
        assert_eq!(shallow.len(), 1);
    }

    #[tokio::test]
    async fn missing_start_directory_is_a_resource_error() {
        let ctx = RunContext::default();
        let err = Find
            .apply(record(&[("path", json!("/not/a/real/dir"))]), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ResourceError");
    }
}
