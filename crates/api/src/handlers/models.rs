//! Handlers for model discovery endpoints.

use axum::extract::{Path, State};
use axum::Json;
use reel_pipeline::processor::ModelMetadata;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /models -- names of every registered processor, sorted.
pub async fn list_models(State(state): State<AppState>) -> Json<DataResponse<Vec<String>>> {
    Json(DataResponse {
        data: state.streams.registry().names(),
    })
}

/// GET /models/{name} -- metadata for one processor.
///
/// Lookup is case-insensitive. Unknown names are a 404.
pub async fn get_model(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Json<DataResponse<ModelMetadata>>> {
    let metadata = state.streams.registry().metadata(&name)?;
    Ok(Json(DataResponse { data: metadata }))
}
