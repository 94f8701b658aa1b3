//! Route definitions for model discovery.
//!
//! Mounted at `/models`.
//!
//! ```text
//! GET  /          list_models
//! GET  /{name}    get_model
//! ```

use axum::routing::get;
use axum::Router;

use crate::handlers::models;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(models::list_models))
        .route("/{name}", get(models::get_model))
}
