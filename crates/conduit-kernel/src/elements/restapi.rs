//! RestApi — one HTTP request per item.
//!
//! URL, headers and body are templates rendered against the item. The
//! response parses per `response_format`: `json` (default), `text`, or
//! `binary` (a metadata record with the body as lossy text).

use std::time::Duration;

use async_trait::async_trait;
use conduit_types::{ConduitError, ConduitResult, ElementSpec, FieldSchema, ParamSchema, Value};
use reqwest::Method;
use serde_json::json;

use crate::context::RunContext;
use crate::element::{Element, Emit};
use crate::record::Record;
use crate::registry::Factory;
use crate::template::TemplateEngine;

pub(super) fn spec() -> ElementSpec {
    ElementSpec::new("conduit.RestApi", "Perform one HTTP request per item")
        .param(ParamSchema::optional(
            "url",
            "string",
            Value::Null,
            "Request URL (template)",
        ))
        .param(ParamSchema::optional(
            "method",
            "string",
            json!("GET"),
            "HTTP method",
        ))
        .param(ParamSchema::optional(
            "headers",
            "object",
            Value::Null,
            "Request headers (values are templates)",
        ))
        .param(ParamSchema::optional(
            "query_params",
            "object",
            Value::Null,
            "Query parameters appended to the URL (values are templates)",
        ))
        .param(ParamSchema::optional(
            "body",
            "string",
            Value::Null,
            "Request body (template)",
        ))
        .param(ParamSchema::optional(
            "timeout",
            "int",
            json!(30),
            "Request timeout in seconds",
        ))
        .param(ParamSchema::optional(
            "response_format",
            "string",
            json!("json"),
            "How to parse the response: json, text or binary",
        ))
        .field(FieldSchema::optional("url", "string", "Per-item URL"))
        .field(FieldSchema::optional("method", "string", "Per-item method"))
        .field(FieldSchema::optional("headers", "object", "Per-item headers"))
        .field(FieldSchema::optional(
            "query_params",
            "object",
            "Per-item query parameters",
        ))
        .field(FieldSchema::optional("body", "string", "Per-item body"))
        .field(FieldSchema::optional("timeout", "int", "Per-item timeout"))
        .field(FieldSchema::optional(
            "response_format",
            "string",
            "Per-item response format",
        ))
}

pub(super) fn factory() -> Factory {
    Box::new(|params, _ctx| {
        let format = params
            .get_str("response_format")
            .unwrap_or_else(|| "json".to_string());
        if !matches!(format.as_str(), "json" | "text" | "binary") {
            return Err(ConduitError::ElementInit(format!(
                "unsupported response_format '{format}'"
            )));
        }
        Ok(Box::new(RestApi {
            engine: TemplateEngine::new(),
            client: None,
        }))
    })
}

struct RestApi {
    engine: TemplateEngine,
    client: Option<reqwest::Client>,
}

impl RestApi {
    fn client(&self) -> ConduitResult<&reqwest::Client> {
        self.client
            .as_ref()
            .ok_or_else(|| ConduitError::Internal("RestApi used before open".into()))
    }
}

#[async_trait]
impl Element for RestApi {
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

        let method = record.get_str("method").unwrap_or_else(|| "GET".to_string());
        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .map_err(|_| ConduitError::Item(format!("unsupported HTTP method '{method}'")))?;
        let timeout = record.get_i64("timeout").filter(|t| *t > 0).unwrap_or(30);
        let format = record
            .get_str("response_format")
            .unwrap_or_else(|| "json".to_string());

        let mut request = self
            .client()?
            .request(method, &url)
            .timeout(Duration::from_secs(timeout as u64));

        if let Some(headers) = record.get_object("headers") {
            for (name, value) in headers {
                let rendered = self
                    .engine
                    .render_str(&conduit_types::value::to_display_string(value), &item)?;
                request = request.header(name, rendered);
            }
        }
        if let Some(query) = record.get_object("query_params") {
            let mut pairs = Vec::with_capacity(query.len());
            for (name, value) in query {
                let rendered = self
                    .engine
                    .render_str(&conduit_types::value::to_display_string(value), &item)?;
                pairs.push((name.clone(), rendered));
            }
            request = request.query(&pairs);
        }
        if let Some(body) = record.get_str("body") {
            request = request.body(self.engine.render_str(&body, &item)?);
        }

        let response = tokio::select! {
            r = request.send() => r,
            _ = ctx.cancel.cancelled() => return Err(ConduitError::Cancelled),
        }
        .map_err(|e| ConduitError::Resource(format!("request to '{url}' failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConduitError::Resource(format!(
                "'{url}' returned {status}"
            )));
        }

        match format.as_str() {
            "text" => {
                let text = response
                    .text()
                    .await
                    .map_err(|e| ConduitError::Resource(e.to_string()))?;
                Ok(Emit::One(Value::String(text)))
            }
            "binary" => {
                let content_type = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| ConduitError::Resource(e.to_string()))?;
                Ok(Emit::One(json!({
                    "content_type": content_type,
                    "content_length": bytes.len(),
                    "body": String::from_utf8_lossy(&bytes),
                })))
            }
            _ => {
                let parsed: Value = response
                    .json()
                    .await
                    .map_err(|e| ConduitError::Item(format!("'{url}' body is not JSON: {e}")))?;
                Ok(Emit::One(parsed))
            }
        }
    }
}
