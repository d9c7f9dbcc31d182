use protobench_core::protocol::Protocol;
use protobench_core::store::ResultRecord;
use protobench_core::summary::Summary;
use protobench_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `results` table. `protocol` is `'h2'` or `'h3'`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ResultRow {
    pub id: DbId,
    pub run_id: DbId,
    pub protocol: String,
    pub samples: i64,
    pub ok_rate_pct: f64,
    pub rps: f64,
    pub duration_s: f64,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub mean_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub created_at: Timestamp,
}

impl ResultRow {
    pub fn summary(&self) -> Summary {
        Summary {
            samples: u64::try_from(self.samples).unwrap_or(0),
            ok_rate_pct: self.ok_rate_pct,
            rps: self.rps,
            duration_s: self.duration_s,
            p50_ms: self.p50_ms,
            p90_ms: self.p90_ms,
            p95_ms: self.p95_ms,
            p99_ms: self.p99_ms,
            mean_ms: self.mean_ms,
            min_ms: self.min_ms,
            max_ms: self.max_ms,
        }
    }

    /// Convert to the engine record. Fails only if the row holds a protocol
    /// the schema's CHECK constraint should have rejected.
    pub fn into_record(self) -> Result<ResultRecord, protobench_core::error::CoreError> {
        let protocol: Protocol = self.protocol.parse()?;
        Ok(ResultRecord {
            id: self.id,
            run_id: self.run_id,
            protocol,
            summary: self.summary(),
        })
    }
}
