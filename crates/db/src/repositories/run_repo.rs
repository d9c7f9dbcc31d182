//! Repository for the `runs` table.

use protobench_core::store::NewRun;
use protobench_core::types::DbId;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use crate::models::run::RunRow;

/// Column list for the `runs` table.
const COLUMNS: &str = "id, ui_scenario, backend_scenario, config, created_at";

/// Append-only access to benchmark runs.
pub struct RunRepo;

impl RunRepo {
    /// Insert a new run. `id` and `created_at` are assigned by the database.
    pub async fn create(pool: &PgPool, input: &NewRun) -> Result<RunRow, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::create_in(&mut conn, input).await
    }

    /// Insert a new run on `conn`, typically an open transaction.
    pub async fn create_in(conn: &mut PgConnection, input: &NewRun) -> Result<RunRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO runs (ui_scenario, backend_scenario, config) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RunRow>(&query)
            .bind(&input.ui_scenario)
            .bind(&input.backend_scenario)
            .bind(Json(&input.config))
            .fetch_one(&mut *conn)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<RunRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM runs WHERE id = $1");
        sqlx::query_as::<_, RunRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All runs of one scenario, oldest first.
    pub async fn list_by_scenario(
        pool: &PgPool,
        ui_scenario: &str,
    ) -> Result<Vec<RunRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM runs \
             WHERE ui_scenario = $1 \
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, RunRow>(&query)
            .bind(ui_scenario)
            .fetch_all(pool)
            .await
    }

    /// Distinct scenario names, sorted.
    pub async fn list_scenarios(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT ui_scenario FROM runs ORDER BY ui_scenario ASC",
        )
        .fetch_all(pool)
        .await
    }

    /// Delete a run; its results go with it (`ON DELETE CASCADE`).
    /// Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM runs WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
