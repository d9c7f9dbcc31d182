use crate::types::DbId;

/// Domain-level error shared by the engine crates.
///
/// I/O-facing crates (pipeline, db, api) define their own error enums and
/// convert into or out of this one at their boundaries.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Unknown scenario or protocol identifier supplied by the caller.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },
}
