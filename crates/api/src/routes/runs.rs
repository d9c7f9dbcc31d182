use axum::routing::{delete, get};
use axum::Router;

use crate::handlers::runs;
use crate::state::AppState;

/// Routes mounted at `/api/v1/runs`.
///
/// ```text
/// GET    /            -> list
/// GET    /summary     -> summary
/// GET    /stability   -> stability
/// DELETE /{id}        -> delete
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(runs::list))
        .route("/summary", get(runs::summary))
        .route("/stability", get(runs::stability))
        .route("/{id}", delete(runs::delete))
}
