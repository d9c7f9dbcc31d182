use axum::routing::{get, post};
use axum::Router;

use crate::handlers::benchmark;
use crate::state::AppState;

/// Routes mounted at `/api/v1/benchmark`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(benchmark::run_single))
        .route("/compare", post(benchmark::compare))
        .route("/compare/stream", get(benchmark::compare_stream))
}
