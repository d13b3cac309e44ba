//! CsvReader — read CSV files, one mapping per row.
//!
//! Accepts a path string, or a record carrying a `local_path` / `path` /
//! `filename` key (the shapes download elements produce).

use async_trait::async_trait;
use conduit_types::{ConduitError, ConduitResult, ElementSpec, FieldSchema, ParamSchema, Value};
use serde_json::json;

use crate::context::RunContext;
use crate::element::{Element, Emit};
use crate::record::Record;
use crate::registry::Factory;

pub(super) fn spec() -> ElementSpec {
    ElementSpec::new("conduit.CsvReader", "Read CSV files, one record per row")
        .param(ParamSchema::optional(
            "delimiter",
            "string",
            json!(","),
            "Field delimiter (single character)",
        ))
        .param(ParamSchema::optional(
            "quotechar",
            "string",
            json!("\""),
            "Quote character (single character)",
        ))
        .param(ParamSchema::optional(
            "encoding",
            "string",
            json!("utf-8"),
            "Text encoding (utf-8 only)",
        ))
        .param(ParamSchema::optional(
            "skip_empty_rows",
            "bool",
            json!(true),
            "Drop rows whose fields are all empty",
        ))
        .param(ParamSchema::optional(
            "fieldnames",
            "array",
            Value::Null,
            "Column names (default: first row is the header)",
        ))
        .field(FieldSchema::optional(
            "input",
            "any",
            "Path string, or a record with local_path/path/filename",
        ))
        .field(FieldSchema::optional("delimiter", "string", "Per-item delimiter"))
}

pub(super) fn factory() -> Factory {
    Box::new(|params, _ctx| {
        let encoding = params.get_str("encoding").unwrap_or_else(|| "utf-8".to_string());
        if !matches!(encoding.to_ascii_lowercase().as_str(), "utf-8" | "utf8") {
            return Err(ConduitError::ElementInit(format!(
                "unsupported encoding '{encoding}' (utf-8 only)"
            )));
        }
        let fieldnames = params.get_array("fieldnames").map(|names| {
            names
                .iter()
                .map(|n| match n {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<String>>()
        });
        Ok(Box::new(CsvReader {
            skip_empty_rows: params.get_bool("skip_empty_rows").unwrap_or(true),
            quotechar: single_char(params.get_str("quotechar"), '"')?,
            fieldnames,
        }))
    })
}

fn single_char(value: Option<String>, default: char) -> ConduitResult<u8> {
    let s = match value {
        Some(s) => s,
        None => return Ok(default as u8),
    };
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() => Ok(c as u8),
        _ => Err(ConduitError::ElementInit(format!(
            "'{s}' must be a single ASCII character"
        ))),
    }
}

struct CsvReader {
    skip_empty_rows: bool,
    quotechar: u8,
    fieldnames: Option<Vec<String>>,
}

/// Resolve the path out of whatever shape the upstream produced.
fn path_of(input: &Value) -> ConduitResult<String> {
    match input {
        Value::String(s) => Ok(s.clone()),
        Value::Object(map) => ["local_path", "path", "filename", "remote_path"]
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_str))
            .map(str::to_string)
            .ok_or_else(|| {
                ConduitError::Item(
                    "record has none of local_path/path/filename/remote_path".into(),
                )
            }),
        other => Err(ConduitError::Item(format!(
            "unsupported CsvReader input: {other}"
        ))),
    }
}

#[async_trait]
impl Element for CsvReader {
    async fn apply(&mut self, record: Record, _ctx: &RunContext) -> ConduitResult<Emit> {
        let input = record.require("input")?;
        let path = path_of(input)?;
        let delimiter = single_char(record.get_str("delimiter"), ',')
            .map_err(|e| ConduitError::Item(e.to_string()))?;

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .quote(self.quotechar)
            .has_headers(self.fieldnames.is_none())
            .flexible(true)
            .from_path(&path)
            .map_err(|e| ConduitError::Resource(format!("cannot read '{path}': {e}")))?;

        let headers: Vec<String> = match &self.fieldnames {
            Some(names) => names.clone(),
            None => reader
                .headers()
                .map_err(|e| ConduitError::Resource(format!("bad CSV header in '{path}': {e}")))?
                .iter()
                .map(str::to_string)
                .collect(),
        };

        let mut rows = Vec::new();
        for result in reader.records() {
            let row =
                result.map_err(|e| ConduitError::Resource(format!("bad CSV row in '{path}': {e}")))?;
            if self.skip_empty_rows && row.iter().all(str::is_empty) {
                continue;
            }
            let mut object = serde_json::Map::with_capacity(headers.len());
            for (i, name) in headers.iter().enumerate() {
                object.insert(name.clone(), json!(row.get(i).unwrap_or_default()));
            }
            rows.push(Value::Object(object));
        }
        Ok(Emit::Many(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use std::io::Write;

    fn reader() -> CsvReader {
        CsvReader {
            skip_empty_rows: true,
            quotechar: b'"',
            fieldnames: None,
        }
    }

    fn record(item: Value) -> Record {
        Record::coerce(item, &spec().fields, &Map::new())
    }

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn yields_one_record_per_row() {
        let file = write_csv("name,age\nada,36\ngrace,45\n");
        let ctx = RunContext::default();
        let out = reader()
            .apply(record(json!(file.path().to_string_lossy())), &ctx)
            .await
            .unwrap()
            .into_vec();
        assert_eq!(
            out,
            vec![
                json!({"name": "ada", "age": "36"}),
                json!({"name": "grace", "age": "45"}),
            ]
        );
    }

    #[tokio::test]
    async fn empty_rows_are_skipped() {
        let file = write_csv("a,b\n1,2\n,\n3,4\n");
        let ctx = RunContext::default();
        let out = reader()
            .apply(record(json!(file.path().to_string_lossy())), &ctx)
            .await
            .unwrap()
            .into_vec();
        assert_eq!(out.len(), 2);
    }

    #[tokio::test]
    async fn accepts_download_shaped_records() {
        let file = write_csv("x\n1\n");
        let ctx = RunContext::default();
        let item = json!({"local_path": file.path().to_string_lossy()});
        let out = reader().apply(record(item), &ctx).await.unwrap().into_vec();
        assert_eq!(out, vec![json!({"x": "1"})]);
    }

    #[tokio::test]
    async fn custom_fieldnames_treat_first_row_as_data() {
        let file = write_csv("1,2\n3,4\n");
        let ctx = RunContext::default();
        let mut element = CsvReader {
            skip_empty_rows: true,
            quotechar: b'"',
            fieldnames: Some(vec!["left".into(), "right".into()]),
        };
        let out = element
            .apply(record(json!(file.path().to_string_lossy())), &ctx)
            .await
            .unwrap()
            .into_vec();
        assert_eq!(out[0], json!({"left": "1", "right": "2"}));
        assert_eq!(out.len(), 2);
    }

    #[tokio::test]
    async fn missing_files_are_resource_errors() {
        let ctx = RunContext::default();
        let err = reader()
            .apply(record(json!("/definitely/not/here.csv")), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ResourceError");
    }
}
