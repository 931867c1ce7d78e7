//! WeatherAPI.com forecast client.
//!
//! Both lookups hit the same forecast endpoint (one day, no air quality, no
//! alerts) and differ only in the `q` parameter.
//! See: https://www.weatherapi.com/docs/

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::errors::ApiError;
use crate::models::{DailyForecast, WeatherSnapshot};

const FORECAST_PATH: &str = "/forecast.json";

/// Client for the weather provider.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

// --- WeatherAPI JSON response types ---

#[derive(Debug, Deserialize)]
struct WaResponse {
    location: WaLocation,
    current: WaCurrent,
    forecast: WaForecast,
}

#[derive(Debug, Deserialize)]
struct WaLocation {
    name: String,
    country: String,
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: String,
    #[serde(default)]
    icon: String,
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    temp_c: f64,
    temp_f: f64,
    condition: WaCondition,
    humidity: f64,
    wind_kph: f64,
}

#[derive(Debug, Deserialize)]
struct WaForecast {
    forecastday: Vec<WaForecastDay>,
}

#[derive(Debug, Deserialize)]
struct WaForecastDay {
    day: WaDay,
}

#[derive(Debug, Deserialize)]
struct WaDay {
    maxtemp_c: f64,
    maxtemp_f: f64,
    mintemp_c: f64,
    mintemp_f: f64,
    condition: WaCondition,
}

#[derive(Debug, Deserialize)]
struct WaErrorBody {
    error: WaErrorDetail,
}

#[derive(Debug, Deserialize)]
struct WaErrorDetail {
    message: String,
}

impl WeatherClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Forecast for a free-text location ("London", "90210", ...).
    pub async fn get_forecast_by_location(
        &self,
        location: &str,
    ) -> Result<WeatherSnapshot, ApiError> {
        self.fetch_forecast(location).await
    }

    /// Forecast for a coordinate pair.
    pub async fn get_forecast_by_coordinates(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<WeatherSnapshot, ApiError> {
        self.fetch_forecast(&format!("{},{}", latitude, longitude))
            .await
    }

    async fn fetch_forecast(&self, query: &str) -> Result<WeatherSnapshot, ApiError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ApiError::Config("weather API key is not set".to_string()))?;

        let response = self
            .client
            .get(format!("{}{}", self.base_url, FORECAST_PATH))
            .query(&[
                ("key", api_key),
                ("q", query),
                ("days", "1"),
                ("aqi", "no"),
                ("alerts", "no"),
            ])
            .send()
            .await
            .map_err(|e| ApiError::Transport(format!("weather request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<WaErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or_else(|_| format!("weather provider returned HTTP {}", status));
            return Err(ApiError::Upstream(message));
        }

        if body.trim().is_empty() {
            return Err(ApiError::Parse(
                "Unable to retrieve weather data".to_string(),
            ));
        }

        let raw: WaResponse = serde_json::from_str(&body)
            .map_err(|e| ApiError::Parse(format!("weather JSON parse error: {}", e)))?;

        normalize(raw, Utc::now())
    }
}

/// Flatten the provider's nested response into a [`WeatherSnapshot`].
///
/// Pure function. Temperatures are copied as supplied in both units.
fn normalize(raw: WaResponse, now: DateTime<Utc>) -> Result<WeatherSnapshot, ApiError> {
    let today = raw
        .forecast
        .forecastday
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::Parse("weather response has no forecast day".to_string()))?;

    Ok(WeatherSnapshot {
        location: raw.location.name,
        country: raw.location.country,
        temp_c: raw.current.temp_c,
        temp_f: raw.current.temp_f,
        condition: raw.current.condition.text,
        condition_icon_url: absolute_icon_url(&raw.current.condition.icon),
        humidity_percent: raw.current.humidity.round().clamp(0.0, 100.0) as u8,
        wind_speed_kph: raw.current.wind_kph.max(0.0),
        forecast: DailyForecast {
            max_temp_c: today.day.maxtemp_c,
            max_temp_f: today.day.maxtemp_f,
            min_temp_c: today.day.mintemp_c,
            min_temp_f: today.day.mintemp_f,
            condition: today.day.condition.text,
            icon_url: absolute_icon_url(&today.day.condition.icon),
        },
        last_updated: now,
    })
}

/// The provider sends protocol-relative icon URLs ("//cdn.weatherapi.com/...").
fn absolute_icon_url(url: &str) -> String {
    match url.strip_prefix("//") {
        Some(rest) => format!("https://{}", rest),
        None => url.to_string(),
    }
}
