//! DownloadFile — fetch a URL per item and write it to disk.
//!
//! The filename comes from the descriptor, or from the URL's last path
//! segment, or from a hash of the URL. Existing files get a numeric
//! suffix unless `overwrite` is set.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use conduit_types::{ConduitError, ConduitResult, ElementSpec, FieldSchema, ParamSchema, Value};
use serde_json::json;

use crate::context::RunContext;
use crate::element::{Element, Emit};
use crate::record::Record;
use crate::registry::Factory;
use crate::template::TemplateEngine;

pub(super) fn spec() -> ElementSpec {
    ElementSpec::new("conduit.DownloadFile", "Download a URL per item to disk")
        .param(ParamSchema::optional(
            "url",
            "string",
            Value::Null,
            "URL to download (template)",
        ))
        .param(ParamSchema::optional(
            "filename",
            "string",
            Value::Null,
            "Target filename (template; default derives from the URL)",
        ))
        .param(ParamSchema::optional(
            "output_dir",
            "string",
            json!("./downloads"),
            "Directory for downloaded files",
        ))
        .param(ParamSchema::optional(
            "overwrite",
            "bool",
            json!(false),
            "Replace existing files instead of suffixing",
        ))
        .param(ParamSchema::optional(
            "create_dirs",
            "bool",
            json!(true),
            "Create the output directory when missing",
        ))
        .field(FieldSchema::optional("url", "string", "Per-item URL"))
        .field(FieldSchema::optional("filename", "string", "Per-item filename"))
        .field(FieldSchema::optional("output_dir", "string", "Per-item directory"))
        .field(FieldSchema::optional("overwrite", "bool", "Per-item overwrite"))
}

pub(super) fn factory() -> Factory {
    Box::new(|params, _ctx| {
        Ok(Box::new(DownloadFile {
            engine: TemplateEngine::new(),
            client: None,
            create_dirs: params.get_bool("create_dirs").unwrap_or(true),
        }))
    })
}

struct DownloadFile {
    engine: TemplateEngine,
    client: Option<reqwest::Client>,
    create_dirs: bool,
}

/// Last URL path segment when it looks like a filename, else a hash.
fn filename_from_url(url: &str) -> String {
    let path = url.split('?').next().unwrap_or(url);
    let last = path.trim_end_matches('/').rsplit('/').next().unwrap_or("");
    if !last.is_empty() && last.contains('.') && !last.contains(':') {
        return last.to_string();
    }
    let mut hasher = DefaultHasher::new();
    url.hash(&mut hasher);
    format!("download_{:08x}", hasher.finish() as u32)
}

/// First free `base_N.ext` variant next to an occupied path.
fn suffixed(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut counter = 1;
    loop {
        let candidate = dir.join(format!("{stem}_{counter}{ext}"));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

#[async_trait]
impl Element for DownloadFile {
    async fn open(&mut self, _ctx: &RunContext) -> ConduitResult<()> {
        self.client = Some(
            reqwest::Client::builder()
                .build()
                .map_err(|e| ConduitError::ElementInit(format!("http client: {e}")))?,
        );
        Ok(())
    }

    async fn apply(&mut self, record: Record, ctx: &RunContext) -> ConduitResult<Emit> {
        let item = record.item().clone();
        let url = record.require_str("url")?;
        let url = self.engine.render_str(&url, &item)?;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConduitError::Item(format!("invalid URL '{url}'")));
        }

        let output_dir = record
            .get_str("output_dir")
            .unwrap_or_else(|| "./downloads".to_string());
        let overwrite = record.get_bool("overwrite").unwrap_or(false);
        let filename = match record.get_str("filename") {
            Some(f) => self.engine.render_str(&f, &item)?,
            None => filename_from_url(&url),
        };

        if self.create_dirs {
            std::fs::create_dir_all(&output_dir).map_err(|e| {
                ConduitError::Resource(format!("cannot create '{output_dir}': {e}"))
            })?;
        }

        let mut target = Path::new(&output_dir).join(&filename);
        if target.exists() && !overwrite {
            target = suffixed(&target);
        }

        let client = self
            .client
            .as_ref()
            .ok_or_else(|| ConduitError::Internal("DownloadFile used before open".into()))?;
        let response = tokio::select! {
            r = client.get(&url).send() => r,
            _ = ctx.cancel.cancelled() => return Err(ConduitError::Cancelled),
        }
        .map_err(|e| ConduitError::Resource(format!("download of '{url}' failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConduitError::Resource(format!("'{url}' returned {status}")));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ConduitError::Resource(e.to_string()))?;
        tokio::fs::write(&target, &bytes)
            .await
            .map_err(|e| ConduitError::Resource(format!("cannot write '{}': {e}", target.display())))?;

        Ok(Emit::One(json!(target.to_string_lossy())))
    }
}
