//! HTTP-level tests for the benchmark endpoints.
//!
//! Validation is checked without any client binary. The run tests point the
//! engine at a temp dir that is empty, or holds a small shell script standing
//! in for the client.

mod common;

use std::os::unix::fs::PermissionsExt;

use axum::http::StatusCode;
use common::{body_json, body_text, build_test_app, get, post_json, TestApp};
use serde_json::json;

/// Tests that spawn processes run one at a time so a script being written
/// is never inherited by a concurrent fork (ETXTBSY on exec).
static SERIAL: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

fn write_client(test: &TestApp, name: &str) {
    let path = test.bin.path().join(name);
    let script = r#"#!/bin/sh
csv=""
while [ $# -gt 0 ]; do
  case "$1" in
    --csv) csv="$2"; shift 2 ;;
    *) shift ;;
  esac
done
echo "ran $name"
printf 'ts_unix_ns,latency_ns,ok\n0,1000000,true\n500000000,3000000,false\n' > "$csv"
"#;
    std::fs::write(&path, script).expect("write client script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod client script");
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_single_run_rejects_unknown_scenario() {
    let test = build_test_app();
    let response = post_json(
        test.app,
        "/api/v1/benchmark",
        json!({"scenario": "warp", "protocol": "h2"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["code"], "INVALID_INPUT");
    assert!(json["error"].as_str().unwrap().contains("baseline"));
}

#[tokio::test]
async fn test_single_run_rejects_unknown_protocol() {
    let test = build_test_app();
    let response = post_json(
        test.app,
        "/api/v1/benchmark",
        json!({"scenario": "baseline", "protocol": "h4"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_compare_rejects_empty_scenario() {
    let test = build_test_app();
    let response = post_json(test.app, "/api/v1/benchmark/compare", json!({"scenario": ""})).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_stream_rejects_unknown_scenario() {
    let test = build_test_app();
    let response = get(test.app, "/api/v1/benchmark/compare/stream?scenario=warp").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_compare_with_missing_client_is_bad_gateway() {
    let _serial = SERIAL.lock().await;
    let test = build_test_app();
    let response = post_json(
        test.app,
        "/api/v1/benchmark/compare",
        json!({"scenario": "baseline", "uiScenario": "nightly"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let json = body_json(response).await;
    assert_eq!(json["code"], "BENCHMARK_FAILED");
    assert!(json["error"].as_str().unwrap().contains("bench-client"));
    assert_eq!(test.store.run_count().await, 0);
}

#[tokio::test]
async fn test_stream_reports_failure_as_events() {
    let _serial = SERIAL.lock().await;
    let test = build_test_app();
    let response = get(test.app, "/api/v1/benchmark/compare/stream?scenario=burst").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );

    let body = body_text(response).await;
    let events: Vec<&str> = body
        .lines()
        .filter_map(|line| line.strip_prefix("event: "))
        .collect();
    assert_eq!(events, vec!["info", "error", "end"]);
    assert!(body.contains(r#"data: {"ok":false}"#), "{body}");
    assert!(body.contains("bench-burst"), "{body}");
}

#[tokio::test]
async fn test_single_run_returns_summary_and_output() {
    let _serial = SERIAL.lock().await;
    let test = build_test_app();
    write_client(&test, "bench-parallel");

    let response = post_json(
        test.app.clone(),
        "/api/v1/benchmark",
        json!({"scenario": "parallel_streams", "protocol": "h3"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let data = &json["data"];
    assert_eq!(data["scenario"], "parallel_streams");
    assert_eq!(data["protocol"], "h3");
    assert_eq!(data["summary"]["Samples"], 2);
    assert_eq!(data["summary"]["OKRatePct"], 50.0);
    assert_eq!(data["summary"]["P50ms"], 2.0);
    assert_eq!(data["summary"]["RPS"], 4.0);
    assert!(data["stdout"].as_str().unwrap().starts_with("ran"));
    assert_eq!(test.store.run_count().await, 0);
    assert_eq!(std::fs::read_dir(test.artifacts.path()).unwrap().count(), 0);
}
