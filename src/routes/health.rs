use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use super::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status ("ok" when healthy, "degraded" when the cache is unreachable)
    pub status: String,
    /// API version
    pub version: String,
    /// Cache backend in use ("memory" or "postgres")
    pub cache_backend: String,
    /// Whether the cache backend is reachable
    pub cache_ok: bool,
    /// Whether icon provider credentials are configured
    pub icons_enabled: bool,
}

/// Health check endpoint.
///
/// Returns status "degraded" (still 200) if the cache backend is
/// unreachable, so load balancers can distinguish partial failures.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let cache = state.service.cache();
    let cache_ok = cache.ping().await;

    Json(HealthResponse {
        status: if cache_ok {
            "ok".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        cache_backend: cache.backend_name().to_string(),
        cache_ok,
        icons_enabled: state.service.icons_enabled(),
    })
}
