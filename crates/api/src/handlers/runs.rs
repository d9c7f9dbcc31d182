//! Handlers for `/api/v1/runs`: stored run history and the analyses over it.

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use protobench_core::error::CoreError;
use protobench_core::store::{RunStore, RunWithResults, StoreError};
use protobench_core::types::DbId;
use protobench_core::{head_to_head, stability};

use crate::error::{AppError, AppResult};
use crate::query::ScenarioFilter;
use crate::response::DataResponse;
use crate::state::AppState;

/// Every stored scenario with its runs, in scenario order.
async fn load_grouped(
    store: &dyn RunStore,
) -> Result<Vec<(String, Vec<RunWithResults>)>, StoreError> {
    let mut grouped = Vec::new();
    for scenario in store.list_scenarios().await? {
        let runs = store.list_runs_by_scenario(&scenario).await?;
        grouped.push((scenario, runs));
    }
    Ok(grouped)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/runs?scenario=
///
/// Runs of one scenario oldest first, or every scenario keyed by name.
pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<ScenarioFilter>,
) -> AppResult<Response> {
    if let Some(scenario) = filter.scenario() {
        let runs = state.store.list_runs_by_scenario(scenario).await?;
        return Ok(Json(DataResponse { data: runs }).into_response());
    }

    let grouped: BTreeMap<String, Vec<RunWithResults>> =
        load_grouped(state.store.as_ref()).await?.into_iter().collect();
    Ok(Json(DataResponse { data: grouped }).into_response())
}

/// GET /api/v1/runs/summary?scenario=
///
/// Head-to-head win counts and averages over completed comparisons.
pub async fn summary(
    State(state): State<AppState>,
    Query(filter): Query<ScenarioFilter>,
) -> AppResult<Response> {
    if let Some(scenario) = filter.scenario() {
        let runs = state.store.list_runs_by_scenario(scenario).await?;
        let data = head_to_head::summarize(&runs);
        return Ok(Json(DataResponse { data }).into_response());
    }

    let grouped = load_grouped(state.store.as_ref()).await?;
    let data = head_to_head::summarize_all(&grouped);
    Ok(Json(DataResponse { data }).into_response())
}

/// GET /api/v1/runs/stability?scenario=
///
/// Run-to-run variance per protocol, for one scenario or keyed by scenario.
pub async fn stability(
    State(state): State<AppState>,
    Query(filter): Query<ScenarioFilter>,
) -> AppResult<Response> {
    if let Some(scenario) = filter.scenario() {
        let runs = state.store.list_runs_by_scenario(scenario).await?;
        let data = stability::analyze(&runs);
        return Ok(Json(DataResponse { data }).into_response());
    }

    let data: BTreeMap<String, stability::ScenarioStability> = load_grouped(state.store.as_ref())
        .await?
        .into_iter()
        .map(|(scenario, runs)| {
            let analysis = stability::analyze(&runs);
            (scenario, analysis)
        })
        .collect();
    Ok(Json(DataResponse { data }).into_response())
}

/// DELETE /api/v1/runs/{id}
///
/// Delete a run and its results.
pub async fn delete(State(state): State<AppState>, Path(id): Path<DbId>) -> AppResult<StatusCode> {
    if state.store.delete_run(id).await? {
        tracing::info!(run_id = id, "Run deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::Core(CoreError::NotFound { entity: "run", id }))
    }
}
