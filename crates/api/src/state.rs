use std::sync::Arc;

use protobench_core::store::RunStore;
use protobench_pipeline::Orchestrator;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database pool, when running against PostgreSQL. Only the health
    /// check uses it directly; everything else goes through `store`.
    pub pool: Option<protobench_db::DbPool>,
    /// Run history.
    pub store: Arc<dyn RunStore>,
    /// Benchmark engine sharing `store`.
    pub orchestrator: Orchestrator,
    pub config: Arc<ServerConfig>,
    /// Cancelled on shutdown; every benchmark run gets a child token.
    pub shutdown: CancellationToken,
}
