//! [`RunStore`] backed by PostgreSQL.

use std::collections::HashMap;

use async_trait::async_trait;
use protobench_core::protocol::Protocol;
use protobench_core::store::{NewRun, ResultPair, ResultRecord, RunStore, RunWithResults, StoreError};
use protobench_core::summary::Summary;
use protobench_core::types::DbId;

use crate::repositories::{ResultRepo, RunRepo};
use crate::DbPool;

/// PostgreSQL unique constraint violation.
const UNIQUE_VIOLATION: &str = "23505";
/// PostgreSQL foreign key violation.
const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Clone)]
pub struct PgRunStore {
    pool: DbPool,
}

impl PgRunStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// Map a failed result insert onto the store contract.
fn result_error(run_id: DbId, protocol: Protocol, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some(UNIQUE_VIOLATION) => {
                StoreError::Conflict(format!("run {run_id} already has a {protocol} result"))
            }
            Some(FOREIGN_KEY_VIOLATION) => StoreError::RunNotFound(run_id),
            _ => StoreError::Backend(db_err.to_string()),
        },
        err => backend(err),
    }
}

#[async_trait]
impl RunStore for PgRunStore {
    async fn create_run(&self, run: &NewRun) -> Result<DbId, StoreError> {
        let row = RunRepo::create(&self.pool, run).await.map_err(backend)?;
        tracing::debug!(run_id = row.id, ui_scenario = %row.ui_scenario, "Run created");
        Ok(row.id)
    }

    async fn add_result(
        &self,
        run_id: DbId,
        protocol: Protocol,
        summary: &Summary,
    ) -> Result<DbId, StoreError> {
        ResultRepo::create(&self.pool, run_id, protocol, summary)
            .await
            .map(|row| row.id)
            .map_err(|e| result_error(run_id, protocol, e))
    }

    async fn list_runs_by_scenario(
        &self,
        ui_scenario: &str,
    ) -> Result<Vec<RunWithResults>, StoreError> {
        let runs = RunRepo::list_by_scenario(&self.pool, ui_scenario)
            .await
            .map_err(backend)?;
        let ids: Vec<DbId> = runs.iter().map(|r| r.id).collect();
        let rows = ResultRepo::list_for_runs(&self.pool, &ids)
            .await
            .map_err(backend)?;

        let mut by_run: HashMap<DbId, Vec<ResultRecord>> = HashMap::new();
        for row in rows {
            let record = row
                .into_record()
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            by_run.entry(record.run_id).or_default().push(record);
        }

        Ok(runs
            .into_iter()
            .map(|row| {
                let results = ResultPair::from_records(by_run.remove(&row.id).unwrap_or_default());
                RunWithResults {
                    run: row.into(),
                    results,
                }
            })
            .collect())
    }

    async fn list_scenarios(&self) -> Result<Vec<String>, StoreError> {
        RunRepo::list_scenarios(&self.pool).await.map_err(backend)
    }

    async fn delete_run(&self, run_id: DbId) -> Result<bool, StoreError> {
        RunRepo::delete(&self.pool, run_id).await.map_err(backend)
    }

    async fn persist_comparison(
        &self,
        run: &NewRun,
        h2: &Summary,
        h3: &Summary,
    ) -> Result<DbId, StoreError> {
        // Rolled back on drop unless committed.
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let row = RunRepo::create_in(&mut tx, run).await.map_err(backend)?;
        for (protocol, summary) in [(Protocol::H2, h2), (Protocol::H3, h3)] {
            ResultRepo::create_in(&mut tx, row.id, protocol, summary)
                .await
                .map_err(|e| result_error(row.id, protocol, e))?;
        }
        tx.commit().await.map_err(backend)?;

        tracing::debug!(run_id = row.id, ui_scenario = %row.ui_scenario, "Comparison stored");
        Ok(row.id)
    }
}
