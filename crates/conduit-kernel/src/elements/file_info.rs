//! FileInfo — stat a path, yielding a metadata record.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use conduit_types::{ConduitError, ConduitResult, ElementSpec, FieldSchema, ParamSchema, Value};
use serde_json::json;

use crate::context::RunContext;
use crate::element::{Element, Emit};
use crate::record::Record;
use crate::registry::Factory;

pub(super) fn spec() -> ElementSpec {
    ElementSpec::new("conduit.FileInfo", "Stat a file or directory")
        .param(ParamSchema::optional(
            "filename",
            "string",
            Value::Null,
            "Path to stat (usually arrives per item)",
        ))
        .field(FieldSchema::required("filename", "string", "Path to stat"))
}

pub(super) fn factory() -> Factory {
    Box::new(|_params, _ctx| Ok(Box::new(FileInfo)))
}

struct FileInfo;

fn epoch_secs(time: std::io::Result<SystemTime>) -> Option<u64> {
    time.ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
}

#[async_trait]
impl Element for FileInfo {
    async fn apply(&mut self, record: Record, _ctx: &RunContext) -> ConduitResult<Emit> {
        let filename = record.require_str("filename")?;
        let meta = std::fs::metadata(&filename)
            .map_err(|e| ConduitError::Resource(format!("cannot stat '{filename}': {e}")))?;

        Ok(Emit::One(json!({
            "name": filename,
            "size": meta.len(),
            "last_modified": epoch_secs(meta.modified()),
            "created": epoch_secs(meta.created()),
            "is_dir": meta.is_dir(),
            "is_file": meta.is_file(),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use std::io::Write;

    #[tokio::test]
    async fn stats_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&[0u8; 16]).unwrap();

        let ctx = RunContext::default();
        let mut element = FileInfo;
        let rec = Record::coerce(
            json!(path.to_string_lossy()),
            &spec().fields,
            &Map::new(),
        );
        let out = element.apply(rec, &ctx).await.unwrap().into_vec();
        assert_eq!(out[0]["size"], json!(16));
        assert_eq!(out[0]["is_file"], json!(true));
        assert_eq!(out[0]["is_dir"], json!(false));
    }

    #[tokio::test]
    async fn missing_filename_is_an_item_error() {
        let ctx = RunContext::default();
        let mut element = FileInfo;
        let rec = Record::coerce(json!({}), &spec().fields, &Map::new());
        let err = element.apply(rec, &ctx).await.unwrap_err();
        assert_eq!(err.kind(), "ItemError");
    }
}
