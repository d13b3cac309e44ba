//! HTTP driver for conduit.
//!
//! One endpoint runs pipelines, one serves the element schema:
//!
//! - `POST /run` — `{pipeline, args, stop_on_error}`; the pipeline is a
//!   stage array or a YAML string. Returns the run report; build failures
//!   are 400, runtime failures 500, both as `{success: false, error}`.
//! - `GET /schema` — the element JSON Schema.
//! - `GET /health` — liveness probe.
//!
//! Console output inside a server run is captured into the report, not
//! echoed to the process stdout.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use conduit_kernel::{
    build_from_value, build_from_yaml, BuildOptions, ConduitError, Registry, RunContext, RunReport,
    Value,
};

/// Shared state: the element registry, built once at startup.
pub struct ServerState {
    registry: Registry,
    options: BuildOptions,
}

impl ServerState {
    /// State over a registry (builtins plus any manifests already loaded).
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            options: BuildOptions::default(),
        }
    }
}

/// Body of `POST /run`.
#[derive(Debug, Deserialize)]
pub struct RunRequest {
    /// Stage array, a single stage mapping, or a YAML document string.
    pub pipeline: Value,
    /// `${...}` bindings for this run.
    #[serde(default)]
    pub args: HashMap<String, String>,
    /// Abort on the first per-item error (default true).
    #[serde(default = "default_stop_on_error")]
    pub stop_on_error: bool,
}

fn default_stop_on_error() -> bool {
    true
}

/// Error body for non-2xx responses.
#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    kind: String,
    message: String,
}

fn error_response(status: StatusCode, err: &ConduitError) -> Response {
    let body = ErrorBody {
        success: false,
        error: ErrorDetail {
            kind: err.kind().to_string(),
            message: err.to_string(),
        },
    };
    (status, Json(body)).into_response()
}

/// Build the router.
pub fn create_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/run", post(run_pipeline))
        .route("/schema", get(serve_schema))
        .route("/health", get(serve_health))
        .with_state(state)
}

async fn serve_health() -> Json<Value> {
    Json(json!({"status": "healthy"}))
}

async fn serve_schema(State(state): State<Arc<ServerState>>) -> Json<Value> {
    Json(conduit_kernel::emit_schema(&state.registry))
}

async fn run_pipeline(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<RunRequest>,
) -> Response {
    let built = match &request.pipeline {
        // YAML document as a string.
        Value::String(source) => {
            build_from_yaml(source, &state.registry, &request.args, &state.options)
        }
        // A single stage mapping runs as a one-stage pipeline.
        Value::Object(_) => {
            let stages = Value::Array(vec![request.pipeline.clone()]);
            build_from_value(&stages, &state.registry, &request.args, &state.options)
        }
        other => build_from_value(other, &state.registry, &request.args, &state.options),
    };

    let mut pipeline = match built {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, "pipeline build failed");
            return error_response(StatusCode::BAD_REQUEST, &e);
        }
    };

    let ctx = RunContext::captured(request.args).with_stop_on_error(request.stop_on_error);
    match pipeline.execute(&ctx).await {
        Ok(report) => Json::<RunReport>(report).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "pipeline run failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e)
        }
    }
}

/// Bind and serve until the process exits.
pub async fn serve(state: Arc<ServerState>, host: &str, port: u16) -> std::io::Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    tracing::info!(host, port, "conduit server listening");
    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_request_defaults() {
        let req: RunRequest = serde_json::from_value(json!({
            "pipeline": [{"id": "conduit.Identity"}]
        }))
        .unwrap();
        assert!(req.stop_on_error);
        assert!(req.args.is_empty());
    }
}
