//! End-to-end tests over a bound listener.

use std::sync::Arc;

use conduit_kernel::Registry;
use conduit_server::{create_router, ServerState};
use serde_json::{json, Value};

/// Bind the router on an ephemeral port and return its base URL.
async fn spawn_server() -> String {
    let state = Arc::new(ServerState::new(Registry::with_builtins()));
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn health_endpoint_responds() {
    let base = spawn_server().await;
    let body: Value = reqwest::get(format!("{base}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], json!("healthy"));
}

#[tokio::test]
async fn run_executes_a_pipeline_and_captures_stdout() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/run"))
        .json(&json!({
            "pipeline": [
                {"id": "conduit.Input", "data": [{"message": "Hello, Conduit!"}]},
                {"id": "conduit.Console", "format": "{{input.message}}"},
            ]
        }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["stdout"], json!(["Hello, Conduit!"]));
    assert_eq!(body["results"], json!([{"message": "Hello, Conduit!"}]));
    assert_eq!(body["stats"]["total_items_processed"], json!(1));
}

#[tokio::test]
async fn run_resolves_request_args() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/run"))
        .json(&json!({
            "pipeline": [
                {"id": "conduit.Input", "data": [{"n": "${limit:-3}"}]},
                {"id": "conduit.Console", "format": "n={{input.n}}"},
            ],
            "args": {"limit": "7"}
        }))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["stdout"], json!(["n=7"]));
}

#[tokio::test]
async fn run_accepts_a_yaml_string_pipeline() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();

    let yaml = "- id: conduit.Input\n  data: [1, 2, 3]\n- id: conduit.Eval\n  expression: \"input * 10\"\n";
    let response = client
        .post(format!("{base}/run"))
        .json(&json!({"pipeline": yaml}))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["results"], json!([10, 20, 30]));
}

#[tokio::test]
async fn unknown_elements_are_bad_requests() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/run"))
        .json(&json!({
            "pipeline": [{"id": "conduit.DoesNotExist"}]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"]["kind"], json!("UnknownElement"));
}

#[tokio::test]
async fn schema_endpoint_lists_elements() {
    let base = spawn_server().await;
    let body: Value = reqwest::get(format!("{base}/schema"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let ids = body["definitions"]["PipelineElement"]["properties"]["id"]["enum"]
        .as_array()
        .unwrap();
    assert!(ids.contains(&json!("conduit.Input")));
    assert!(ids.contains(&json!("conduit.SftpDownload")));
}
