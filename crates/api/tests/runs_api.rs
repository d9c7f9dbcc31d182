//! HTTP-level tests for the run history endpoints, seeded through the store.

mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, delete, get};
use protobench_core::store::{MemoryRunStore, NewRun, RunStore};
use protobench_core::summary::Summary;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn summary(p50_ms: f64, rps: f64) -> Summary {
    Summary {
        samples: 100,
        ok_rate_pct: 100.0,
        rps,
        p50_ms,
        ..Summary::default()
    }
}

async fn seed(store: &MemoryRunStore, scenario: &str, h2: Summary, h3: Summary) -> i64 {
    let run = NewRun {
        ui_scenario: scenario.to_string(),
        backend_scenario: scenario.to_string(),
        ..NewRun::default()
    };
    store
        .persist_comparison(&run, &h2, &h3)
        .await
        .expect("seed comparison")
}

async fn seed_history(store: &MemoryRunStore) {
    seed(store, "baseline", summary(10.0, 100.0), summary(8.0, 110.0)).await;
    seed(store, "baseline", summary(12.0, 100.0), summary(9.0, 100.0)).await;
    seed(store, "burst", summary(20.0, 50.0), summary(25.0, 40.0)).await;
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_list_empty_history() {
    let test = build_test_app();
    let response = get(test.app, "/api/v1/runs").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"], serde_json::json!({}));
}

#[tokio::test]
async fn test_list_one_scenario() {
    let test = build_test_app();
    seed_history(&test.store).await;

    let response = get(test.app, "/api/v1/runs?scenario=baseline").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let runs = json["data"].as_array().expect("data should be an array");
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0]["ui_scenario"], "baseline");
    assert_eq!(runs[0]["results"]["kind"], "both");
    assert_eq!(runs[0]["results"]["h2"]["summary"]["P50ms"], 10.0);
    assert_eq!(runs[1]["results"]["h3"]["summary"]["P50ms"], 9.0);
}

#[tokio::test]
async fn test_list_all_grouped_by_scenario() {
    let test = build_test_app();
    seed_history(&test.store).await;

    let json = body_json(get(test.app, "/api/v1/runs").await).await;
    let data = json["data"].as_object().expect("data should be an object");
    assert_eq!(data.keys().collect::<Vec<_>>(), vec!["baseline", "burst"]);
    assert_eq!(data["baseline"].as_array().unwrap().len(), 2);
    assert_eq!(data["burst"].as_array().unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_summary_for_one_scenario() {
    let test = build_test_app();
    seed_history(&test.store).await;

    let json = body_json(get(test.app, "/api/v1/runs/summary?scenario=baseline").await).await;
    let data = &json["data"];
    assert_eq!(data["counts"]["comparablePairs"], 2);
    assert_eq!(data["latency"]["h3Wins"], 2);
    assert_eq!(data["throughput"]["h3Wins"], 1);
    assert_eq!(data["throughput"]["ties"], 1);
    assert_eq!(data["winner"]["latency"], "h3");
}

#[tokio::test]
async fn test_summary_across_scenarios() {
    let test = build_test_app();
    seed_history(&test.store).await;

    let json = body_json(get(test.app, "/api/v1/runs/summary").await).await;
    let data = &json["data"];
    assert_eq!(data["scenarios"], serde_json::json!(["baseline", "burst"]));
    assert_eq!(data["overall"]["counts"]["comparablePairs"], 3);
    assert_eq!(data["perScenario"]["burst"]["latency"]["h2Wins"], 1);
}

// ---------------------------------------------------------------------------
// Stability
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_stability_for_one_scenario() {
    let test = build_test_app();
    seed_history(&test.store).await;

    let json = body_json(get(test.app, "/api/v1/runs/stability?scenario=baseline").await).await;
    let data = &json["data"];
    assert_eq!(data["earliest"]["results"]["h2"]["summary"]["P50ms"], 10.0);
    assert_eq!(data["latest"]["results"]["h2"]["summary"]["P50ms"], 12.0);
    assert_eq!(data["stability"]["h2"]["runs"], 2);
    assert!(data["stability"]["h3"]["p50CV"].is_number());
}

#[tokio::test]
async fn test_stability_of_unknown_scenario_is_empty() {
    let test = build_test_app();
    let json = body_json(get(test.app, "/api/v1/runs/stability?scenario=nothing").await).await;
    assert_eq!(
        json["data"],
        serde_json::json!({"earliest": null, "latest": null, "stability": null})
    );
}

#[tokio::test]
async fn test_stability_across_scenarios() {
    let test = build_test_app();
    seed_history(&test.store).await;

    let json = body_json(get(test.app, "/api/v1/runs/stability").await).await;
    let data = json["data"].as_object().expect("data should be an object");
    assert_eq!(data.len(), 2);
    // A single run has no spread.
    assert_eq!(data["burst"]["stability"]["h2"]["score"], 0.0);
    assert_eq!(data["burst"]["stability"]["winner"], "tie");
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_delete_run() {
    let test = build_test_app();
    let id = seed(&test.store, "burst", summary(1.0, 1.0), summary(1.0, 1.0)).await;

    let response = delete(test.app.clone(), &format!("/api/v1/runs/{id}")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(test.store.list_scenarios().await.unwrap(), Vec::<String>::new());

    let response = delete(test.app, &format!("/api/v1/runs/{id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
}
