//! Run Store contract and the in-memory implementation.
//!
//! The store is append-only from the engine's point of view: it creates runs
//! and results and never updates them. Amending a run means creating a new
//! one. A run owns its results; deleting a run deletes them.
//!
//! The PostgreSQL implementation lives in `protobench-db`. [`MemoryRunStore`]
//! backs tests and deployments started without a database.

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::protocol::Protocol;
use crate::summary::Summary;
use crate::types::{DbId, RunConfig, Timestamp};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One orchestrated execution under a named scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Run {
    pub id: DbId,
    pub ui_scenario: String,
    pub backend_scenario: String,
    pub config: RunConfig,
    pub created_at: Timestamp,
}

/// Input for [`RunStore::create_run`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewRun {
    pub ui_scenario: String,
    pub backend_scenario: String,
    pub config: RunConfig,
}

/// The summary recorded for one protocol of one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResultRecord {
    pub id: DbId,
    pub run_id: DbId,
    pub protocol: Protocol,
    pub summary: Summary,
}

/// The results attached to a run: none, one, or both protocols.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultPair {
    Empty,
    H2Only { h2: ResultRecord },
    H3Only { h3: ResultRecord },
    Both { h2: ResultRecord, h3: ResultRecord },
}

impl ResultPair {
    pub fn from_options(h2: Option<ResultRecord>, h3: Option<ResultRecord>) -> Self {
        match (h2, h3) {
            (None, None) => Self::Empty,
            (Some(h2), None) => Self::H2Only { h2 },
            (None, Some(h3)) => Self::H3Only { h3 },
            (Some(h2), Some(h3)) => Self::Both { h2, h3 },
        }
    }

    /// Group an unordered list of result records by protocol.
    ///
    /// Records are expected to be unique per protocol; if not, the last one
    /// for a protocol wins.
    pub fn from_records(records: impl IntoIterator<Item = ResultRecord>) -> Self {
        let (mut h2, mut h3) = (None, None);
        for record in records {
            match record.protocol {
                Protocol::H2 => h2 = Some(record),
                Protocol::H3 => h3 = Some(record),
            }
        }
        Self::from_options(h2, h3)
    }

    pub fn get(&self, protocol: Protocol) -> Option<&ResultRecord> {
        match (self, protocol) {
            (Self::H2Only { h2 }, Protocol::H2) | (Self::Both { h2, .. }, Protocol::H2) => Some(h2),
            (Self::H3Only { h3 }, Protocol::H3) | (Self::Both { h3, .. }, Protocol::H3) => Some(h3),
            _ => None,
        }
    }

    /// Both summaries, when the run produced a complete comparison.
    pub fn both(&self) -> Option<(&Summary, &Summary)> {
        match self {
            Self::Both { h2, h3 } => Some((&h2.summary, &h3.summary)),
            _ => None,
        }
    }
}

/// A run together with its results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunWithResults {
    #[serde(flatten)]
    pub run: Run,
    pub results: ResultPair,
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// Errors reported by a [`RunStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A result already exists for this (run, protocol) pair.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Run {0} not found")]
    RunNotFound(DbId),

    /// The backing store failed (connection, query, decode).
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Append-only persistence of runs and per-protocol results.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Create a run and return its store-assigned id.
    async fn create_run(&self, run: &NewRun) -> Result<DbId, StoreError>;

    /// Attach the summary for `protocol` to `run_id`.
    ///
    /// Fails with [`StoreError::Conflict`] if that protocol already has a
    /// result for the run.
    async fn add_result(
        &self,
        run_id: DbId,
        protocol: Protocol,
        summary: &Summary,
    ) -> Result<DbId, StoreError>;

    /// All runs of a scenario, oldest first (`created_at`, then `id`).
    async fn list_runs_by_scenario(
        &self,
        ui_scenario: &str,
    ) -> Result<Vec<RunWithResults>, StoreError>;

    /// Distinct `ui_scenario` values, sorted.
    async fn list_scenarios(&self) -> Result<Vec<String>, StoreError>;

    /// Delete a run and, by cascade, its results. Returns whether it existed.
    async fn delete_run(&self, run_id: DbId) -> Result<bool, StoreError>;

    /// Record a completed comparison: one run plus both protocol results.
    ///
    /// All-or-nothing: on error, or if the future is dropped part way, no
    /// part of the run is visible to readers.
    async fn persist_comparison(
        &self,
        run: &NewRun,
        h2: &Summary,
        h3: &Summary,
    ) -> Result<DbId, StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryState {
    last_run_id: DbId,
    last_result_id: DbId,
    runs: Vec<Run>,
    results: Vec<ResultRecord>,
}

/// Process-local [`RunStore`] with the same constraints as the database.
#[derive(Default)]
pub struct MemoryRunStore {
    state: RwLock<MemoryState>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of runs held.
    pub async fn run_count(&self) -> usize {
        self.state.read().await.runs.len()
    }
}

impl MemoryState {
    fn insert_run(&mut self, run: &NewRun) -> DbId {
        self.last_run_id += 1;
        let id = self.last_run_id;
        self.runs.push(Run {
            id,
            ui_scenario: run.ui_scenario.clone(),
            backend_scenario: run.backend_scenario.clone(),
            config: run.config.clone(),
            created_at: chrono::Utc::now(),
        });
        id
    }

    fn insert_result(&mut self, run_id: DbId, protocol: Protocol, summary: &Summary) -> DbId {
        self.last_result_id += 1;
        let id = self.last_result_id;
        self.results.push(ResultRecord {
            id,
            run_id,
            protocol,
            summary: *summary,
        });
        id
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn create_run(&self, run: &NewRun) -> Result<DbId, StoreError> {
        Ok(self.state.write().await.insert_run(run))
    }

    async fn add_result(
        &self,
        run_id: DbId,
        protocol: Protocol,
        summary: &Summary,
    ) -> Result<DbId, StoreError> {
        let mut state = self.state.write().await;
        if !state.runs.iter().any(|r| r.id == run_id) {
            return Err(StoreError::RunNotFound(run_id));
        }
        if state
            .results
            .iter()
            .any(|r| r.run_id == run_id && r.protocol == protocol)
        {
            return Err(StoreError::Conflict(format!(
                "run {run_id} already has a {protocol} result"
            )));
        }
        Ok(state.insert_result(run_id, protocol, summary))
    }

    async fn list_runs_by_scenario(
        &self,
        ui_scenario: &str,
    ) -> Result<Vec<RunWithResults>, StoreError> {
        let state = self.state.read().await;
        let mut runs: Vec<&Run> = state
            .runs
            .iter()
            .filter(|r| r.ui_scenario == ui_scenario)
            .collect();
        runs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        Ok(runs
            .into_iter()
            .map(|run| RunWithResults {
                run: run.clone(),
                results: ResultPair::from_records(
                    state.results.iter().filter(|r| r.run_id == run.id).copied(),
                ),
            })
            .collect())
    }

    async fn list_scenarios(&self) -> Result<Vec<String>, StoreError> {
        let state = self.state.read().await;
        let mut scenarios: Vec<String> = state.runs.iter().map(|r| r.ui_scenario.clone()).collect();
        scenarios.sort();
        scenarios.dedup();
        Ok(scenarios)
    }

    async fn delete_run(&self, run_id: DbId) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let before = state.runs.len();
        state.runs.retain(|r| r.id != run_id);
        let existed = state.runs.len() != before;
        if existed {
            state.results.retain(|r| r.run_id != run_id);
        }
        Ok(existed)
    }

    async fn persist_comparison(
        &self,
        run: &NewRun,
        h2: &Summary,
        h3: &Summary,
    ) -> Result<DbId, StoreError> {
        let mut state = self.state.write().await;
        let run_id = state.insert_run(run);
        state.insert_result(run_id, Protocol::H2, h2);
        state.insert_result(run_id, Protocol::H3, h3);
        Ok(run_id)
    }
}
