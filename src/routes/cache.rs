use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use super::AppState;
use crate::errors::{AppError, ErrorResponse};

#[derive(Debug, Serialize, ToSchema)]
pub struct PurgeResult {
    /// Number of cache entries removed
    pub removed: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PurgeResponse {
    pub success: bool,
    pub data: PurgeResult,
}

/// Remove all cached weather and icon entries.
#[utoipa::path(
    delete,
    path = "/api/v1/cache",
    tag = "Cache",
    responses(
        (status = 200, description = "Cache purged", body = PurgeResponse),
        (status = 500, description = "Cache backend error", body = ErrorResponse),
    )
)]
pub async fn purge_cache(State(state): State<AppState>) -> Result<Json<PurgeResponse>, AppError> {
    let removed = state.service.purge_cache().await?;

    Ok(Json(PurgeResponse {
        success: true,
        data: PurgeResult { removed },
    }))
}
