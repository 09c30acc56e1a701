//! HTTP adapter tests against an in-process axum mock server.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::post;
use serde_json::{Value, json};

use autopilot_core::backend::{ExecutionBackend, HttpBackend, SubmissionError};
use autopilot_core::plan::{Mode, Plan, assemble};
use autopilot_core::task::{TaskKind, defaults_for};
use autopilot_core::upload::{FileUploader, HttpUploader, UploadError, UploadKind};

// ---------------------------------------------------------------------------
// Mock server
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct Recorded {
    run_bodies: Arc<Mutex<Vec<Value>>>,
    uploads: Arc<Mutex<Vec<(String, String)>>>,
}

async fn run_config(State(rec): State<Recorded>, body: Bytes) -> (StatusCode, String) {
    let value: Value = serde_json::from_slice(&body).expect("run body is JSON");
    let reply = match value.pointer("/basic/0/config/url").and_then(Value::as_str) {
        Some("https://boom.example") => (StatusCode::INTERNAL_SERVER_ERROR, "boom".to_owned()),
        _ => (StatusCode::OK, "Run finished: 1 task ok".to_owned()),
    };
    rec.run_bodies.lock().unwrap().push(value);
    reply
}

async fn upload_file(
    State(rec): State<Recorded>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    let text = String::from_utf8_lossy(&body).into_owned();
    rec.uploads.lock().unwrap().push((content_type, text));
    (StatusCode::OK, "/srv/uploads/key_0001.pem".to_owned())
}

async fn spawn_server() -> (String, Recorded) {
    let recorded = Recorded::default();
    let app = Router::new()
        .route("/api/auth/run-config", post(run_config))
        .route("/api/auth/upload-file", post(upload_file))
        .with_state(recorded.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock server");
    });
    (format!("http://{addr}"), recorded)
}

fn api_plan(url: &str) -> Plan {
    let mut task = defaults_for(TaskKind::Api);
    task.set_field("url", url).unwrap();
    Plan {
        mode: Mode::Basic,
        pre: vec![task],
        post: vec![],
    }
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

#[tokio::test]
async fn backend_posts_payload_json_and_returns_text() {
    let (base, recorded) = spawn_server().await;
    let backend = HttpBackend::new(&base, Duration::from_secs(5)).unwrap();

    let output = backend
        .submit(&assemble(&api_plan("https://a.example")))
        .await
        .unwrap();

    assert_eq!(output, "Run finished: 1 task ok");
    let bodies = recorded.run_bodies.lock().unwrap();
    assert_eq!(
        bodies.as_slice(),
        &[json!({
            "basic": [{
                "type": "api",
                "config": {"url": "https://a.example", "method": "GET", "headers": {}, "body": {}}
            }]
        })]
    );
}

#[tokio::test]
async fn backend_maps_non_success_status() {
    let (base, _recorded) = spawn_server().await;
    let backend = HttpBackend::new(&base, Duration::from_secs(5)).unwrap();

    let err = backend
        .submit(&assemble(&api_plan("https://boom.example")))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        SubmissionError::Status {
            status: 500,
            body: "boom".to_owned()
        }
    );
}

// ---------------------------------------------------------------------------
// Uploader
// ---------------------------------------------------------------------------

#[tokio::test]
async fn uploader_sends_multipart_file_and_type() {
    let (base, recorded) = spawn_server().await;
    let dir = tempfile::tempdir().unwrap();
    let key = dir.path().join("deploy.pem");
    std::fs::write(&key, "-----BEGIN KEY-----").unwrap();

    let uploader = HttpUploader::new(&base, Duration::from_secs(5)).unwrap();
    let path = uploader.upload(&key, UploadKind::Pem).await.unwrap();

    assert_eq!(path, "/srv/uploads/key_0001.pem");
    let uploads = recorded.uploads.lock().unwrap();
    let (content_type, body) = &uploads[0];
    assert!(content_type.starts_with("multipart/form-data"), "got: {content_type}");
    assert!(body.contains(r#"name="file"; filename="deploy.pem""#), "got: {body}");
    assert!(body.contains("-----BEGIN KEY-----"));
    assert!(body.contains(r#"name="type""#));
    assert!(body.contains("\r\n\r\npem\r\n"), "got: {body}");
}

#[tokio::test]
async fn uploader_reports_unreachable_server() {
    let uploader = HttpUploader::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("run.sh");
    std::fs::write(&script, "echo hi").unwrap();

    let err = uploader
        .upload(Path::new(&script), UploadKind::Sh)
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::Transport(_)), "got: {err}");
}
