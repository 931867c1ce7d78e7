//! Value records exchanged between the clients, the orchestrator and the cache.
//!
//! All records are immutable once built. A new fetch produces a new record;
//! nothing edits a cached one in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Normalised current conditions plus today's forecast for one place.
///
/// Both unit systems come straight from the provider; no conversion is
/// performed locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WeatherSnapshot {
    /// Resolved place name (e.g. "London")
    pub location: String,
    pub country: String,
    /// Current temperature in Celsius
    pub temp_c: f64,
    /// Current temperature in Fahrenheit
    pub temp_f: f64,
    /// Provider condition label (e.g. "Partly cloudy")
    pub condition: String,
    /// Provider CDN URL for the condition icon
    pub condition_icon_url: String,
    /// Relative humidity, 0-100
    pub humidity_percent: u8,
    pub wind_speed_kph: f64,
    pub forecast: DailyForecast,
    pub last_updated: DateTime<Utc>,
}

/// Today's forecast extremes and summary condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DailyForecast {
    pub max_temp_c: f64,
    pub max_temp_f: f64,
    pub min_temp_c: f64,
    pub min_temp_f: f64,
    pub condition: String,
    pub icon_url: String,
}

/// A fresh snapshot enriched with icons for the current and forecast
/// conditions. An icon is `None` when it could not be resolved.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CurrentWeather {
    #[serde(flatten)]
    pub weather: WeatherSnapshot,
    pub icon: Option<IconResult>,
    pub forecast_icon: Option<IconResult>,
}

pub const DEFAULT_ICON_ATTRIBUTION: &str = "Weather icon from The Noun Project";
pub const DEFAULT_ICON_LICENSE: &str = "creative-commons-attribution";
pub const DEFAULT_ICON_TERM: &str = "weather";

/// An icon chosen for a weather condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct IconResult {
    /// Remote thumbnail URL or a `data:` URI with base64 content.
    /// Empty when no icon could be found.
    pub icon_url: String,
    pub attribution: String,
    pub license: String,
    /// The term the icon provider matched
    pub search_term: String,
    pub fetched_at: DateTime<Utc>,
}

impl IconResult {
    /// Placeholder returned when neither the primary nor the fallback search
    /// found anything.
    pub fn default_icon() -> Self {
        Self {
            icon_url: String::new(),
            attribution: DEFAULT_ICON_ATTRIBUTION.to_string(),
            license: DEFAULT_ICON_LICENSE.to_string(),
            search_term: DEFAULT_ICON_TERM.to_string(),
            fetched_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.icon_url.is_empty()
    }
}
