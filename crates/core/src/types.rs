/// Store-assigned primary keys (PostgreSQL BIGSERIAL, or a counter in memory).
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Opaque key/value configuration recorded alongside a run.
///
/// The engine never interprets it; it is persisted verbatim (JSONB).
pub type RunConfig = serde_json::Map<String, serde_json::Value>;
