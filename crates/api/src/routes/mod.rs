pub mod benchmark;
pub mod health;
pub mod runs;

use axum::Router;

use crate::state::AppState;

/// Build the bounded `/api/v1` route tree (subject to the request timeout).
///
/// ```text
/// /runs                      run history, one scenario or all grouped
/// /runs/summary              head-to-head summary
/// /runs/stability            stability analysis
/// /runs/{id}                 delete a run
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/runs", runs::router())
}

/// Benchmark routes, mounted at `/api/v1/benchmark` outside the request
/// timeout since a run lasts as long as its clients do.
///
/// ```text
/// POST /                     single protocol run
/// POST /compare              h2 vs h3 comparison
/// GET  /compare/stream       comparison as a Server-Sent-Events stream
/// ```
pub fn benchmark_routes() -> Router<AppState> {
    Router::new().nest("/api/v1/benchmark", benchmark::router())
}
