pub mod health;
pub mod models;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                  streaming channel (WebSocket upgrade)
///
/// /models              list registered model names
/// /models/{name}       model metadata
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/models", models::router())
}
