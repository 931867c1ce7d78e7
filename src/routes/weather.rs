//! Weather HTTP endpoints.
//!
//! - GET /api/v1/weather/current?location=|latitude=&longitude=  (always fresh, with icons)
//! - GET /api/v1/weather/cached?location=|latitude=&longitude=   (read-through)

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::AppState;
use crate::errors::{AppError, ErrorResponse};
use crate::models::{CurrentWeather, WeatherSnapshot};
use crate::services::orchestrator::WeatherQuery;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct WeatherParams {
    /// Free-text location (e.g. "London"). Ignored when coordinates are given.
    pub location: Option<String>,
    /// Latitude in degrees, -90..=90. Requires `longitude`.
    pub latitude: Option<f64>,
    /// Longitude in degrees, -180..=180. Requires `latitude`.
    pub longitude: Option<f64>,
}

impl WeatherParams {
    /// Coordinates win over a location; neither means the default location.
    fn into_query(self) -> Result<WeatherQuery, AppError> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => {
                if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
                    return Err(AppError::BadRequest(format!(
                        "latitude must be between -90 and 90, got {}",
                        latitude
                    )));
                }
                if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
                    return Err(AppError::BadRequest(format!(
                        "longitude must be between -180 and 180, got {}",
                        longitude
                    )));
                }
                Ok(WeatherQuery::Coordinates {
                    latitude,
                    longitude,
                })
            }
            (Some(_), None) | (None, Some(_)) => Err(AppError::BadRequest(
                "latitude and longitude must be given together".to_string(),
            )),
            (None, None) => Ok(match self.location {
                Some(location) if !location.trim().is_empty() => {
                    WeatherQuery::Location(location.trim().to_string())
                }
                _ => WeatherQuery::DefaultLocation,
            }),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CurrentWeatherResponse {
    pub success: bool,
    pub data: CurrentWeather,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WeatherResponse {
    pub success: bool,
    pub data: WeatherSnapshot,
}

/// Current weather, always fetched fresh and written through to the cache.
///
/// Includes icons for the current and forecast conditions when icon
/// credentials are configured. Icon failures leave the icon `null`.
#[utoipa::path(
    get,
    path = "/api/v1/weather/current",
    tag = "Weather",
    params(WeatherParams),
    responses(
        (status = 200, description = "Fresh weather with condition icons",
         body = CurrentWeatherResponse),
        (status = 400, description = "Invalid coordinates", body = ErrorResponse),
        (status = 502, description = "Weather provider error", body = ErrorResponse),
        (status = 503, description = "Weather API key not configured", body = ErrorResponse),
    )
)]
pub async fn get_current_weather(
    State(state): State<AppState>,
    Query(params): Query<WeatherParams>,
) -> Result<Json<CurrentWeatherResponse>, AppError> {
    let query = params.into_query()?;
    let data = state.service.fetch_current_weather_with_icons(&query).await?;

    Ok(Json(CurrentWeatherResponse {
        success: true,
        data,
    }))
}

/// Weather served from cache when fresh (3 h), otherwise fetched and cached.
#[utoipa::path(
    get,
    path = "/api/v1/weather/cached",
    tag = "Weather",
    params(WeatherParams),
    responses(
        (status = 200, description = "Cached or freshly fetched weather", body = WeatherResponse),
        (status = 400, description = "Invalid coordinates", body = ErrorResponse),
        (status = 502, description = "Weather provider error", body = ErrorResponse),
        (status = 503, description = "Weather API key not configured", body = ErrorResponse),
    )
)]
pub async fn get_cached_weather(
    State(state): State<AppState>,
    Query(params): Query<WeatherParams>,
) -> Result<Json<WeatherResponse>, AppError> {
    let query = params.into_query()?;
    let data = state.service.get_cached_forecast(&query).await?;

    Ok(Json(WeatherResponse {
        success: true,
        data,
    }))
}
