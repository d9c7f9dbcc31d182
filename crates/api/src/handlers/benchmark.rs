//! Handlers for `/api/v1/benchmark`: single runs, comparisons, and the
//! streamed comparison.
//!
//! Scenario and protocol names are parsed before anything is spawned, so an
//! unknown name is a 400 with no side effects.

use std::convert::Infallible;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::stream::{Stream, StreamExt};
use protobench_core::protocol::Protocol;
use protobench_core::scenario::Scenario;
use protobench_events::{channel, BenchEvent, DEFAULT_CAPACITY};
use protobench_pipeline::CompareRequest;
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;
use validator::Validate;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for a single protocol run.
#[derive(Debug, Deserialize, Validate)]
pub struct SingleRunRequest {
    #[validate(length(min = 1, max = 64))]
    pub scenario: String,
    #[validate(length(min = 1, max = 8))]
    pub protocol: String,
}

/// Request body for a comparison.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompareBody {
    #[validate(length(min = 1, max = 64))]
    pub scenario: String,
    /// Label to store the run under; defaults to `scenario`.
    #[validate(length(min = 1, max = 128))]
    pub ui_scenario: Option<String>,
}

/// Query string of the streamed comparison.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompareStreamParams {
    #[validate(length(min = 1, max = 64))]
    pub scenario: String,
    #[validate(length(min = 1, max = 128))]
    pub ui_scenario: Option<String>,
    #[serde(default)]
    pub start_servers: bool,
}

fn compare_request(scenario: &str, ui_scenario: Option<&str>) -> AppResult<CompareRequest> {
    let scenario: Scenario = scenario.trim().parse()?;
    let request = CompareRequest::new(scenario);
    Ok(match ui_scenario.map(str::trim).filter(|s| !s.is_empty()) {
        Some(label) => request.with_ui_scenario(label),
        None => request,
    })
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/benchmark
///
/// Run one protocol of one scenario and return its summary with the
/// client's captured output. Nothing is persisted.
pub async fn run_single(
    State(state): State<AppState>,
    Json(input): Json<SingleRunRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let scenario: Scenario = input.scenario.trim().parse()?;
    let protocol: Protocol = input.protocol.trim().parse()?;

    let output = state
        .orchestrator
        .run_single(scenario, protocol, &state.shutdown.child_token())
        .await?;
    Ok(Json(DataResponse { data: output }))
}

/// POST /api/v1/benchmark/compare
///
/// Run h2 then h3 and return the comparison once both are done.
pub async fn compare(
    State(state): State<AppState>,
    Json(input): Json<CompareBody>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let request = compare_request(&input.scenario, input.ui_scenario.as_deref())?;

    let result = state
        .orchestrator
        .compare(&request, state.shutdown.child_token())
        .await?;
    Ok(Json(DataResponse { data: result }))
}

/// GET /api/v1/benchmark/compare/stream?scenario=&uiScenario=&startServers=
///
/// Same as [`compare`] but streams every run event as it happens. Closing
/// the stream aborts the run.
pub async fn compare_stream(
    State(state): State<AppState>,
    Query(params): Query<CompareStreamParams>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    params.validate()?;
    let request = compare_request(&params.scenario, params.ui_scenario.as_deref())?
        .with_servers(params.start_servers);

    let (tx, rx) = channel(DEFAULT_CAPACITY);
    let orchestrator = state.orchestrator.clone();
    let cancel = state.shutdown.child_token();
    tokio::spawn(async move {
        // Outcome is already on the stream as `result` or `error`.
        let _ = orchestrator.run_comparison(&request, tx, cancel).await;
    });

    let stream = ReceiverStream::new(rx).map(|event| Ok(sse_event(&event)));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// `event: <name>` + `data: <payload json>`.
fn sse_event(event: &BenchEvent) -> Event {
    let data = event.data_json().unwrap_or_else(|err| {
        tracing::error!(error = %err, event = event.name(), "Failed to serialize event");
        "{}".to_string()
    });
    Event::default().event(event.name()).data(data)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::error::AppError;

    #[test]
    fn compare_request_defaults_label_to_scenario() {
        let request = compare_request("burst", None).unwrap();
        assert_eq!(request.scenario, Scenario::Burst);
        assert_eq!(request.ui_scenario, "burst");

        let request = compare_request(" burst ", Some("  ")).unwrap();
        assert_eq!(request.ui_scenario, "burst");
    }

    #[test]
    fn compare_request_keeps_custom_label() {
        let request = compare_request("header_bloat", Some("headers-64k")).unwrap();
        assert_eq!(request.scenario, Scenario::HeaderBloat);
        assert_eq!(request.ui_scenario, "headers-64k");
    }

    #[test]
    fn compare_request_rejects_unknown_scenario() {
        assert_matches!(compare_request("warp", None), Err(AppError::Core(_)));
    }

    #[test]
    fn empty_scenario_fails_validation() {
        let body = CompareBody {
            scenario: String::new(),
            ui_scenario: None,
        };
        assert!(body.validate().is_err());
    }
}
