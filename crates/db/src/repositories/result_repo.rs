//! Repository for the `results` table.

use protobench_core::protocol::Protocol;
use protobench_core::summary::Summary;
use protobench_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::result::ResultRow;

/// Column list for the `results` table.
const COLUMNS: &str = "id, run_id, protocol, samples, ok_rate_pct, rps, duration_s, \
    p50_ms, p90_ms, p95_ms, p99_ms, mean_ms, min_ms, max_ms, created_at";

pub struct ResultRepo;

impl ResultRepo {
    /// Insert the summary of one protocol for a run.
    ///
    /// Violates `uq_results_run_protocol` if the protocol is already recorded
    /// for the run, and the `run_id` foreign key if the run does not exist.
    pub async fn create(
        pool: &PgPool,
        run_id: DbId,
        protocol: Protocol,
        summary: &Summary,
    ) -> Result<ResultRow, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::create_in(&mut conn, run_id, protocol, summary).await
    }

    /// [`ResultRepo::create`] on `conn`, typically an open transaction.
    pub async fn create_in(
        conn: &mut PgConnection,
        run_id: DbId,
        protocol: Protocol,
        summary: &Summary,
    ) -> Result<ResultRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO results \
                (run_id, protocol, samples, ok_rate_pct, rps, duration_s, \
                 p50_ms, p90_ms, p95_ms, p99_ms, mean_ms, min_ms, max_ms) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ResultRow>(&query)
            .bind(run_id)
            .bind(protocol.as_str())
            .bind(i64::try_from(summary.samples).unwrap_or(i64::MAX))
            .bind(summary.ok_rate_pct)
            .bind(summary.rps)
            .bind(summary.duration_s)
            .bind(summary.p50_ms)
            .bind(summary.p90_ms)
            .bind(summary.p95_ms)
            .bind(summary.p99_ms)
            .bind(summary.mean_ms)
            .bind(summary.min_ms)
            .bind(summary.max_ms)
            .fetch_one(&mut *conn)
            .await
    }

    /// All results belonging to any of `run_ids`.
    pub async fn list_for_runs(
        pool: &PgPool,
        run_ids: &[DbId],
    ) -> Result<Vec<ResultRow>, sqlx::Error> {
        if run_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!(
            "SELECT {COLUMNS} FROM results \
             WHERE run_id = ANY($1) \
             ORDER BY run_id, protocol"
        );
        sqlx::query_as::<_, ResultRow>(&query)
            .bind(run_ids)
            .fetch_all(pool)
            .await
    }
}
