use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use host_pulse::core::{now_millis, Reading, ResolvedValue, Sample};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::common::{file_metric, write_probe_file, TestEngine, TestEngineBuilder};

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn engine(dir: &tempfile::TempDir) -> TestEngine {
    let present = write_probe_file(dir.path(), "thermal_zone0", "51000\n");
    TestEngineBuilder::new()
        .metric(file_metric("cpu_temperature", &[present.as_path()]))
        .metric(file_metric("gpu_temperature", &[dir.path().join("missing").as_path()]))
        .build_in_memory()
}

#[tokio::test]
async fn test_system_endpoint_over_real_probes() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = get(engine(&dir).router(), "/api/system").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metrics"]["cpu_temperature"]["value"], json!(51.0));
    assert_eq!(body["metrics"]["cpu_temperature"]["unit"], json!("°C"));
    assert_eq!(body["metrics"]["gpu_temperature"]["unavailable"], json!(true));
}

#[tokio::test]
async fn test_command_endpoint_resolves_and_rejects_unknown() {
    let dir = tempfile::tempdir().unwrap();
    let app = engine(&dir).router();

    let (status, body) = get(app.clone(), "/api/commands?command=cpu_temperature").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"], json!(51.0));

    let (status, body) = get(app, "/api/commands?command=warp_core").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_metrics_endpoint_serves_ingested_history() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir);
    let now = now_millis();
    for i in (1..=6).rev() {
        let mut sample = Sample::new(now - i * 30_000);
        sample.insert("cpu_temperature", Reading::new(ResolvedValue::Numeric(50.0)));
        engine.history.ingest(sample);
    }

    let (status, body) = get(engine.router(), "/api/metrics?minutes=10").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["minutes"], json!(10));
    assert!(body["bucket_seconds"].is_null());
    assert_eq!(body["buckets"].as_array().unwrap().len(), 6);
    assert_eq!(body["buckets"][0]["metrics"]["cpu_temperature"]["value"], json!(50.0));
}
