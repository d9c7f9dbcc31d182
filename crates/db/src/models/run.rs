use protobench_core::store::Run;
use protobench_core::types::{DbId, RunConfig, Timestamp};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `runs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RunRow {
    pub id: DbId,
    pub ui_scenario: String,
    pub backend_scenario: String,
    pub config: Json<RunConfig>,
    pub created_at: Timestamp,
}

impl From<RunRow> for Run {
    fn from(row: RunRow) -> Self {
        Run {
            id: row.id,
            ui_scenario: row.ui_scenario,
            backend_scenario: row.backend_scenario,
            config: row.config.0,
            created_at: row.created_at,
        }
    }
}
