//! Icon HTTP endpoints.
//!
//! - GET /api/v1/icons/weather?condition=Rain&color=3B82F6&filetype=svg&size=84
//! - GET /api/v1/icons/:icon_id

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::AppState;
use crate::errors::{AppError, ErrorResponse};
use crate::helpers::normalize_hex_color;
use crate::models::IconResult;
use crate::services::icons::FileType;
use crate::services::orchestrator::{IconRequest, DEFAULT_ICON_SIZE};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct IconParams {
    /// Weather condition label (e.g. "Partly cloudy")
    pub condition: Option<String>,
    /// Hex colour, 3 or 6 digits, optional leading `#`
    pub color: Option<String>,
    /// "svg" (default) or "png"
    pub filetype: Option<String>,
    /// Edge length in px (default 84); PNG downloads clamp to 20..=1200
    pub size: Option<u32>,
}

impl IconParams {
    fn into_request(self) -> Result<IconRequest, AppError> {
        let condition = self
            .condition
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AppError::BadRequest("condition is required".to_string()))?;

        let color = match self.color.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(normalize_hex_color(raw).ok_or_else(|| {
                AppError::BadRequest(format!("Invalid color '{}': expected hex like 3B82F6", raw))
            })?),
        };

        let filetype = match self.filetype.as_deref().map(str::trim) {
            None | Some("") => FileType::default(),
            Some(raw) => parse_filetype(raw)?,
        };

        let size = match self.size {
            Some(0) => {
                return Err(AppError::BadRequest(
                    "size must be greater than 0".to_string(),
                ))
            }
            Some(size) => size,
            None => DEFAULT_ICON_SIZE,
        };

        Ok(IconRequest {
            condition,
            color,
            filetype,
            size,
        })
    }
}

fn parse_filetype(raw: &str) -> Result<FileType, AppError> {
    match raw.to_ascii_lowercase().as_str() {
        "svg" => Ok(FileType::Svg),
        "png" => Ok(FileType::Png),
        _ => Err(AppError::BadRequest(format!(
            "Invalid filetype '{}': expected svg or png",
            raw
        ))),
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IconResponse {
    pub success: bool,
    pub data: IconResult,
}

/// Icon for a weather condition.
///
/// Served from cache for 7 days. When nothing matches, returns the default
/// icon (empty `icon_url`) rather than an error.
#[utoipa::path(
    get,
    path = "/api/v1/icons/weather",
    tag = "Icons",
    params(IconParams),
    responses(
        (status = 200, description = "Icon for the condition (or the default icon)",
         body = IconResponse),
        (status = 400, description = "Missing condition or invalid color/filetype/size",
         body = ErrorResponse),
        (status = 503, description = "Icon provider credentials not set", body = ErrorResponse),
    )
)]
pub async fn get_weather_icon(
    State(state): State<AppState>,
    Query(params): Query<IconParams>,
) -> Result<Json<IconResponse>, AppError> {
    let request = params.into_request()?;
    let data = state.service.get_weather_icon(&request).await?;

    Ok(Json(IconResponse {
        success: true,
        data,
    }))
}

/// A single icon by its provider id. Not cached.
#[utoipa::path(
    get,
    path = "/api/v1/icons/{icon_id}",
    tag = "Icons",
    params(
        ("icon_id" = String, Path, description = "Numeric icon id from the icon provider"),
    ),
    responses(
        (status = 200, description = "The icon", body = IconResponse),
        (status = 400, description = "Icon id is not numeric", body = ErrorResponse),
        (status = 502, description = "Icon provider error (including unknown ids)",
         body = ErrorResponse),
        (status = 503, description = "Icon provider credentials not set", body = ErrorResponse),
    )
)]
pub async fn get_icon_by_id(
    State(state): State<AppState>,
    Path(icon_id): Path<String>,
) -> Result<Json<IconResponse>, AppError> {
    if icon_id.is_empty() || !icon_id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::BadRequest(format!(
            "Invalid icon id '{}': expected a number",
            icon_id
        )));
    }

    let data = state.service.get_icon_by_id(&icon_id).await?;

    Ok(Json(IconResponse {
        success: true,
        data,
    }))
}
