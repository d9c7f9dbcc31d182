#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderValue, Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use protobench_core::store::{MemoryRunStore, RunStore};
use protobench_pipeline::{EngineConfig, Orchestrator};
use sqlx::PgPool;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use protobench_api::config::ServerConfig;
use protobench_api::router::build_app_router;
use protobench_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec![HeaderValue::from_static("http://localhost:5173")],
        request_timeout_secs: 30,
        database_url: None,
    }
}

/// The application plus the scratch directories its engine points at.
///
/// `bin` starts empty, so any benchmark run fails to spawn its client
/// unless the test writes one.
pub struct TestApp {
    pub app: Router,
    pub store: Arc<MemoryRunStore>,
    pub bin: TempDir,
    pub artifacts: TempDir,
}

fn test_engine(bin: &TempDir, artifacts: &TempDir) -> EngineConfig {
    EngineConfig {
        bin_dir: Some(bin.path().to_path_buf()),
        artifact_dir: artifacts.path().to_path_buf(),
        server_settle: Duration::from_millis(50),
        termination_grace: Duration::from_millis(500),
        ..EngineConfig::default()
    }
}

fn build(store: Arc<dyn RunStore>, pool: Option<PgPool>, bin: &TempDir, artifacts: &TempDir) -> Router {
    let config = test_config();
    let state = AppState {
        pool,
        store: Arc::clone(&store),
        orchestrator: Orchestrator::new(test_engine(bin, artifacts), store),
        config: Arc::new(config.clone()),
        shutdown: CancellationToken::new(),
    };
    build_app_router(state, &config)
}

/// Application backed by an in-memory run store.
pub fn build_test_app() -> TestApp {
    let bin = tempfile::tempdir().expect("create bin dir");
    let artifacts = tempfile::tempdir().expect("create artifact dir");
    let store = Arc::new(MemoryRunStore::new());
    let app = build(store.clone(), None, &bin, &artifacts);
    TestApp {
        app,
        store,
        bin,
        artifacts,
    }
}

/// Application backed by PostgreSQL.
pub fn build_pg_app(pool: PgPool) -> (Router, TempDir, TempDir) {
    let bin = tempfile::tempdir().expect("create bin dir");
    let artifacts = tempfile::tempdir().expect("create artifact dir");
    let store = Arc::new(protobench_db::PgRunStore::new(pool.clone()));
    let app = build(store, Some(pool), &bin, &artifacts);
    (app, bin, artifacts)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.expect("request should not fail")
}

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn delete(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes()
        .to_vec()
}

pub async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).expect("utf-8 body")
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).expect("JSON body")
}
