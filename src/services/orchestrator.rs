//! Cache-backed orchestration of weather and icon lookups.
//!
//! Flow per icon request:
//!
//! 1. Cache check on `(condition, color, filetype, size)`; a hit returns with
//!    no network call.
//! 2. Map the condition to a primary term and search (limit 1).
//! 3. Nothing found → search once more with the fallback term.
//! 4. Still nothing → default icon, deliberately *not* cached so the next
//!    call retries.
//! 5. With a colour: download the recoloured icon and embed it as a `data:`
//!    URI. Without a colour, or if the download fails: use the thumbnail URL.
//!    Either way the result is cached for a week.
//!
//! Weather has two entry points with different caching semantics:
//! [`WeatherService::fetch_current_weather`] always goes upstream and writes
//! the result through to the cache, while [`WeatherService::get_cached_forecast`]
//! reads through the cache first.

use chrono::Utc;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{self, CacheError, CacheStore};
use crate::errors::ApiError;
use crate::helpers::{coordinate_hash, slugify};
use crate::models::{CurrentWeather, IconResult, WeatherSnapshot};
use crate::services::icons::{FileType, Icon, IconClient, IconOptions, SearchOptions};
use crate::services::terms::{fallback_term, map_condition_to_term};
use crate::services::weather_api::WeatherClient;

/// Weather snapshots are considered fresh for 3 hours.
pub const WEATHER_CACHE_TTL: Duration = Duration::from_secs(3 * 60 * 60);
/// Icon results are considered fresh for 7 days.
pub const ICON_CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

pub const WEATHER_KEY_PREFIX: &str = "weather_forecast_";
pub const ICON_KEY_PREFIX: &str = "weather_icon_";
const DEFAULT_LOCATION_KEY: &str = "weather_forecast_data";

pub const DEFAULT_ICON_SIZE: u32 = 84;

/// What to fetch weather for.
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherQuery {
    /// The configured default location.
    DefaultLocation,
    Location(String),
    Coordinates { latitude: f64, longitude: f64 },
}

/// Parameters of an icon lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct IconRequest {
    pub condition: String,
    /// Hex colour without `#`.
    pub color: Option<String>,
    pub filetype: FileType,
    pub size: u32,
}

impl IconRequest {
    /// Uncoloured SVG at the default size.
    pub fn new(condition: &str) -> Self {
        Self {
            condition: condition.to_string(),
            color: None,
            filetype: FileType::Svg,
            size: DEFAULT_ICON_SIZE,
        }
    }

    pub fn cache_key(&self) -> String {
        format!(
            "{}{}_{}_{}_{}",
            ICON_KEY_PREFIX,
            slugify(&self.condition),
            self.color.as_deref().unwrap_or("default"),
            self.filetype,
            self.size
        )
    }
}

/// Shared service object. Built once at startup and handed to handlers.
pub struct WeatherService {
    weather: WeatherClient,
    icons: Option<IconClient>,
    cache: Arc<dyn CacheStore>,
    default_location: String,
}

impl WeatherService {
    /// `icons` is `None` when no icon credentials are configured, which
    /// disables every icon lookup.
    pub fn new(
        weather: WeatherClient,
        icons: Option<IconClient>,
        cache: Arc<dyn CacheStore>,
        default_location: &str,
    ) -> Self {
        Self {
            weather,
            icons,
            cache,
            default_location: default_location.to_string(),
        }
    }

    pub fn icons_enabled(&self) -> bool {
        self.icons.is_some()
    }

    pub fn cache(&self) -> &dyn CacheStore {
        self.cache.as_ref()
    }

    // -----------------------------------------------------------------------
    // Weather
    // -----------------------------------------------------------------------

    fn weather_cache_key(&self, query: &WeatherQuery) -> String {
        match query {
            WeatherQuery::DefaultLocation => DEFAULT_LOCATION_KEY.to_string(),
            WeatherQuery::Location(text) => format!("{}{}", WEATHER_KEY_PREFIX, slugify(text)),
            WeatherQuery::Coordinates {
                latitude,
                longitude,
            } => format!(
                "{}coord_{}",
                WEATHER_KEY_PREFIX,
                coordinate_hash(*latitude, *longitude)
            ),
        }
    }

    async fn fetch_upstream(&self, query: &WeatherQuery) -> Result<WeatherSnapshot, ApiError> {
        match query {
            WeatherQuery::DefaultLocation => {
                self.weather
                    .get_forecast_by_location(&self.default_location)
                    .await
            }
            WeatherQuery::Location(text) => self.weather.get_forecast_by_location(text).await,
            WeatherQuery::Coordinates {
                latitude,
                longitude,
            } => {
                self.weather
                    .get_forecast_by_coordinates(*latitude, *longitude)
                    .await
            }
        }
    }

    /// Always fetch fresh, then write the snapshot through to the cache.
    pub async fn fetch_current_weather(
        &self,
        query: &WeatherQuery,
    ) -> Result<WeatherSnapshot, ApiError> {
        let snapshot = self.fetch_upstream(query).await.map_err(|e| {
            tracing::warn!("Weather fetch failed for {:?}: {}", query, e);
            e
        })?;

        self.cache_write(&self.weather_cache_key(query), &snapshot, WEATHER_CACHE_TTL)
            .await;
        Ok(snapshot)
    }

    /// Serve from cache when fresh, otherwise fetch and cache.
    pub async fn get_cached_forecast(
        &self,
        query: &WeatherQuery,
    ) -> Result<WeatherSnapshot, ApiError> {
        let key = self.weather_cache_key(query);
        if let Some(snapshot) = self.cache_read::<WeatherSnapshot>(&key).await {
            tracing::debug!("Weather cache hit: {}", key);
            return Ok(snapshot);
        }
        self.fetch_current_weather(query).await
    }

    /// Fresh weather plus icons for the current and forecast conditions.
    ///
    /// Icon problems never fail the call; the affected icon is just `None`.
    pub async fn fetch_current_weather_with_icons(
        &self,
        query: &WeatherQuery,
    ) -> Result<CurrentWeather, ApiError> {
        let weather = self.fetch_current_weather(query).await?;

        let (icon, forecast_icon) = if self.icons_enabled() {
            self.condition_icons(&weather).await
        } else {
            (None, None)
        };

        Ok(CurrentWeather {
            weather,
            icon,
            forecast_icon,
        })
    }

    async fn condition_icons(
        &self,
        weather: &WeatherSnapshot,
    ) -> (Option<IconResult>, Option<IconResult>) {
        let current = IconRequest::new(&weather.condition);
        let forecast = IconRequest::new(&weather.forecast.condition);

        let requests: Vec<IconRequest> = [&current, &forecast]
            .into_iter()
            .filter(|r| !r.condition.trim().is_empty())
            .cloned()
            .collect();
        let results = self.get_weather_icons(&requests).await;

        let pick = |request: &IconRequest| match results.get(&request.cache_key()) {
            Some(Ok(icon)) if !icon.is_empty() => Some(icon.clone()),
            Some(Err(e)) => {
                tracing::warn!("Icon lookup failed for '{}': {}", request.condition, e);
                None
            }
            _ => None,
        };

        (pick(&current), pick(&forecast))
    }

    // -----------------------------------------------------------------------
    // Icons
    // -----------------------------------------------------------------------

    fn icon_client(&self) -> Result<&IconClient, ApiError> {
        self.icons
            .as_ref()
            .ok_or_else(|| ApiError::Config("Icon provider credentials not set".to_string()))
    }

    /// Icon for one weather condition.
    ///
    /// Never fails because nothing matched: that case yields the default icon.
    pub async fn get_weather_icon(&self, request: &IconRequest) -> Result<IconResult, ApiError> {
        let icons = self.icon_client()?;

        let key = request.cache_key();
        if let Some(cached) = self.cache_read::<IconResult>(&key).await {
            tracing::debug!("Icon cache hit: {}", key);
            return Ok(cached);
        }

        let icon = match find_icon(icons, &request.condition).await {
            Ok(icon) => icon,
            Err(not_found) => {
                tracing::info!("{}; using default icon", not_found);
                return Ok(IconResult::default_icon());
            }
        };

        let icon_url = match request.color.as_deref() {
            Some(color) => match icons
                .download_icon(&icon.id, Some(color), request.filetype, Some(request.size))
                .await
            {
                Ok(download) => download.data_uri(),
                Err(e) => {
                    tracing::warn!("Coloured download of icon {} failed: {}", icon.id, e);
                    None
                }
            },
            None => None,
        }
        .unwrap_or_else(|| icon.preferred_url());

        let result = icon_result(icon, icon_url);
        self.cache_write(&key, &result, ICON_CACHE_TTL).await;
        Ok(result)
    }

    /// Icon by provider id, straight from the provider (not cached).
    pub async fn get_icon_by_id(&self, icon_id: &str) -> Result<IconResult, ApiError> {
        let icons = self.icon_client()?;
        let icon = icons
            .get_icon(icon_id, &IconOptions::default())
            .await
            .map_err(|e| {
                tracing::warn!("Icon {} lookup failed: {}", icon_id, e);
                e
            })?;

        let icon_url = icon.preferred_url();
        Ok(icon_result(icon, icon_url))
    }

    /// Look up several icons at once, keyed by cache key.
    ///
    /// Requests sharing a cache key are resolved once; distinct keys are
    /// resolved concurrently.
    pub async fn get_weather_icons(
        &self,
        requests: &[IconRequest],
    ) -> HashMap<String, Result<IconResult, ApiError>> {
        let mut unique: HashMap<String, &IconRequest> = HashMap::new();
        for request in requests {
            unique.entry(request.cache_key()).or_insert(request);
        }

        let lookups = unique
            .into_iter()
            .map(|(key, request)| async move { (key, self.get_weather_icon(request).await) });

        join_all(lookups).await.into_iter().collect()
    }

    // -----------------------------------------------------------------------
    // Cache maintenance
    // -----------------------------------------------------------------------

    /// Remove every weather and icon entry. Returns the number removed.
    pub async fn purge_cache(&self) -> Result<u64, CacheError> {
        let weather = self.cache.delete_by_prefix(WEATHER_KEY_PREFIX).await?;
        let icons = self.cache.delete_by_prefix(ICON_KEY_PREFIX).await?;
        tracing::info!(
            "Purged {} weather and {} icon cache entries",
            weather,
            icons
        );
        Ok(weather + icons)
    }

    /// A failing cache read is a miss.
    async fn cache_read<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        match cache::get_json(self.cache.as_ref(), key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Cache read failed for '{}': {}", key, e);
                None
            }
        }
    }

    /// A failing cache write is logged and skipped.
    async fn cache_write<T: serde::Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        if let Err(e) = cache::set_json(self.cache.as_ref(), key, value, ttl).await {
            tracing::warn!("Cache write failed for '{}': {}", key, e);
        }
    }
}

fn icon_result(icon: Icon, icon_url: String) -> IconResult {
    IconResult {
        icon_url,
        attribution: icon.attribution,
        license: icon.license_description,
        search_term: icon.term,
        fetched_at: Utc::now(),
    }
}

/// First icon for the primary term, else for the fallback term.
///
/// A failed search counts as an empty one. Both empty → `NotFound`, the
/// only error this returns.
async fn find_icon(icons: &IconClient, condition: &str) -> Result<Icon, ApiError> {
    let options = SearchOptions::with_limit(1);

    for term in [map_condition_to_term(condition), fallback_term(condition)] {
        match icons.search_icons(term, &options).await {
            Ok(response) => {
                if let Some(icon) = response.icons.into_iter().next() {
                    return Ok(icon);
                }
                tracing::debug!("No icons for term '{}'", term);
            }
            Err(e) => tracing::warn!("Icon search for '{}' failed: {}", term, e),
        }
    }

    Err(ApiError::NotFound(format!(
        "no icon found for condition '{}'",
        condition
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::services::oauth::OAuthCredentials;
    use crate::services::weather_api::tests::sample_payload;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Harness {
        server: MockServer,
        cache: Arc<MemoryCache>,
        service: WeatherService,
    }

    async fn harness(with_icons: bool) -> Harness {
        let server = MockServer::start().await;
        let cache = Arc::new(MemoryCache::new());
        let weather = WeatherClient::new(&server.uri(), Some("wkey".to_string())).unwrap();
        let icons = with_icons.then(|| {
            IconClient::new(
                &server.uri(),
                OAuthCredentials {
                    consumer_key: "ck".to_string(),
                    consumer_secret: "cs".to_string(),
                },
            )
            .unwrap()
        });
        let service = WeatherService::new(weather, icons, cache.clone(), "New York");
        Harness {
            server,
            cache,
            service,
        }
    }

    fn search_body(id: u64, term: &str) -> serde_json::Value {
        serde_json::json!({
            "icons": [{
                "id": id,
                "attribution": format!("{} by Artist from Noun Project", term),
                "license_description": "creative-commons-attribution",
                "term": term,
                "thumbnail_url": format!("https://static.thenounproject.com/png/{}-84.png", id),
            }]
        })
    }

    fn empty_search() -> serde_json::Value {
        serde_json::json!({ "icons": [] })
    }

    #[test]
    fn test_icon_cache_key() {
        let request = IconRequest {
            condition: "Partly cloudy".to_string(),
            color: Some("3B82F6".to_string()),
            filetype: FileType::Png,
            size: 120,
        };
        assert_eq!(
            request.cache_key(),
            "weather_icon_partly-cloudy_3B82F6_png_120"
        );
        assert_eq!(
            IconRequest::new("Rain").cache_key(),
            "weather_icon_rain_default_svg_84"
        );
    }

    #[tokio::test]
    async fn test_weather_cache_keys() {
        let h = harness(false).await;
        assert_eq!(
            h.service.weather_cache_key(&WeatherQuery::DefaultLocation),
            "weather_forecast_data"
        );
        assert_eq!(
            h.service
                .weather_cache_key(&WeatherQuery::Location("New York".to_string())),
            "weather_forecast_new-york"
        );
        assert_eq!(
            h.service.weather_cache_key(&WeatherQuery::Coordinates {
                latitude: 40.7128,
                longitude: -74.006
            }),
            "weather_forecast_coord_d726cef4f3377ff3689858a4d3dd7c87"
        );
    }

    #[tokio::test]
    async fn test_colored_icon_fetched_once_within_ttl() {
        let h = harness(true).await;
        Mock::given(method("GET"))
            .and(path("/icon"))
            .and(query_param("query", "rain"))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_body(11, "rain")))
            .expect(1)
            .mount(&h.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/icon/11/download"))
            .and(query_param("color", "3B82F6"))
            .and(query_param("filetype", "svg"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content_type": "image/svg+xml",
                "base64_encoded_file": "PHN2Zy8+"
            })))
            .expect(1)
            .mount(&h.server)
            .await;

        let request = IconRequest {
            condition: "rain".to_string(),
            color: Some("3B82F6".to_string()),
            filetype: FileType::Svg,
            size: 84,
        };
        let first = h.service.get_weather_icon(&request).await.unwrap();
        let second = h.service.get_weather_icon(&request).await.unwrap();

        assert_eq!(first.icon_url, "data:image/svg+xml;base64,PHN2Zy8+");
        assert_eq!(first, second);
        assert_eq!(first.search_term, "rain");
        assert_eq!(h.cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_uncolored_icon_uses_thumbnail_and_is_cached() {
        let h = harness(true).await;
        Mock::given(method("GET"))
            .and(path("/icon"))
            .and(query_param("query", "sunny"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_body(5, "sun")))
            .expect(1)
            .mount(&h.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/icon/5/download"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&h.server)
            .await;

        let result = h
            .service
            .get_weather_icon(&IconRequest::new("Sunny"))
            .await
            .unwrap();
        assert_eq!(
            result.icon_url,
            "https://static.thenounproject.com/png/5-84.png"
        );
        assert_eq!(result.license, "creative-commons-attribution");
        assert!(h
            .cache
            .get("weather_icon_sunny_default_svg_84")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_failed_download_falls_back_to_thumbnail() {
        let h = harness(true).await;
        Mock::given(method("GET"))
            .and(path("/icon"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_body(9, "snow")))
            .mount(&h.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/icon/9/download"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&h.server)
            .await;

        let request = IconRequest {
            color: Some("FF0000".to_string()),
            ..IconRequest::new("Light snow")
        };
        let result = h.service.get_weather_icon(&request).await.unwrap();
        assert_eq!(
            result.icon_url,
            "https://static.thenounproject.com/png/9-84.png"
        );
        assert_eq!(h.cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_fallback_term_used_when_primary_empty() {
        let h = harness(true).await;
        Mock::given(method("GET"))
            .and(path("/icon"))
            .and(query_param("query", "partly cloudy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(empty_search()))
            .expect(1)
            .mount(&h.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/icon"))
            .and(query_param("query", "cloud"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_body(3, "cloud")))
            .expect(1)
            .mount(&h.server)
            .await;

        let result = h
            .service
            .get_weather_icon(&IconRequest::new("Partly cloudy"))
            .await
            .unwrap();
        assert_eq!(result.search_term, "cloud");
    }

    #[tokio::test]
    async fn test_default_icon_when_nothing_found_is_not_cached() {
        let h = harness(true).await;
        Mock::given(method("GET"))
            .and(path("/icon"))
            .respond_with(ResponseTemplate::new(200).set_body_json(empty_search()))
            .expect(4)
            .mount(&h.server)
            .await;

        let request = IconRequest::new("Blizzard");
        let first = h.service.get_weather_icon(&request).await.unwrap();
        assert!(first.is_empty());
        assert_eq!(first.search_term, "weather");
        assert_eq!(first.attribution, "Weather icon from The Noun Project");
        assert_eq!(h.cache.len().await, 0);

        // Not cached, so the second call searches again (primary + fallback).
        let second = h.service.get_weather_icon(&request).await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_search_failures_degrade_to_default() {
        let h = harness(true).await;
        Mock::given(method("GET"))
            .and(path("/icon"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "error": "rate limited" })),
            )
            .expect(2)
            .mount(&h.server)
            .await;

        let result = h
            .service
            .get_weather_icon(&IconRequest::new("Heavy rain"))
            .await
            .unwrap();
        assert!(result.is_empty());
        assert_eq!(h.cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_missing_credentials_short_circuit() {
        let h = harness(false).await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&h.server)
            .await;

        let err = h
            .service
            .get_weather_icon(&IconRequest::new("Rain"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
        assert!(!h.service.icons_enabled());
    }

    #[tokio::test]
    async fn test_fetch_current_writes_through_and_cached_read_hits() {
        let h = harness(false).await;
        Mock::given(method("GET"))
            .and(path("/forecast.json"))
            .and(query_param("q", "London"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(sample_payload("Sunny", "Sunny")),
            )
            .expect(1)
            .mount(&h.server)
            .await;

        let query = WeatherQuery::Location("London".to_string());
        let fresh = h.service.fetch_current_weather(&query).await.unwrap();
        let cached = h.service.get_cached_forecast(&query).await.unwrap();
        assert_eq!(fresh, cached);
        assert!(h
            .cache
            .get("weather_forecast_london")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_coordinate_fetch_is_always_fresh() {
        let h = harness(false).await;
        Mock::given(method("GET"))
            .and(path("/forecast.json"))
            .and(query_param("q", "51.5,-0.12"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(sample_payload("Mist", "Mist")),
            )
            .expect(2)
            .mount(&h.server)
            .await;

        let query = WeatherQuery::Coordinates {
            latitude: 51.5,
            longitude: -0.12,
        };
        h.service.fetch_current_weather(&query).await.unwrap();
        h.service.fetch_current_weather(&query).await.unwrap();
        // Populated by the fresh fetches, so this one is served from cache.
        h.service.get_cached_forecast(&query).await.unwrap();
    }

    #[tokio::test]
    async fn test_cached_forecast_reads_through_on_miss() {
        let h = harness(false).await;
        Mock::given(method("GET"))
            .and(path("/forecast.json"))
            .and(query_param("q", "New York"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(sample_payload("Clear", "Clear")),
            )
            .expect(1)
            .mount(&h.server)
            .await;

        h.service
            .get_cached_forecast(&WeatherQuery::DefaultLocation)
            .await
            .unwrap();
        h.service
            .get_cached_forecast(&WeatherQuery::DefaultLocation)
            .await
            .unwrap();
        assert!(h
            .cache
            .get("weather_forecast_data")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_weather_failure_is_not_cached() {
        let h = harness(false).await;
        Mock::given(method("GET"))
            .and(path("/forecast.json"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": { "code": 1006, "message": "No matching location found." }
            })))
            .expect(2)
            .mount(&h.server)
            .await;

        let query = WeatherQuery::Location("Atlantis".to_string());
        assert!(h.service.get_cached_forecast(&query).await.is_err());
        assert!(h.service.get_cached_forecast(&query).await.is_err());
        assert_eq!(h.cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_identical_icon_keys_are_looked_up_once() {
        let h = harness(true).await;
        Mock::given(method("GET"))
            .and(path("/forecast.json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(sample_payload("Sunny", "Sunny")),
            )
            .mount(&h.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/icon"))
            .and(query_param("query", "sunny"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_body(1, "sun")))
            .expect(1)
            .mount(&h.server)
            .await;

        let current = h
            .service
            .fetch_current_weather_with_icons(&WeatherQuery::DefaultLocation)
            .await
            .unwrap();
        let icon = current.icon.unwrap();
        let forecast_icon = current.forecast_icon.unwrap();
        assert_eq!(icon.icon_url, forecast_icon.icon_url);
    }

    #[tokio::test]
    async fn test_icon_failure_keeps_weather() {
        let h = harness(true).await;
        Mock::given(method("GET"))
            .and(path("/forecast.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(sample_payload("Partly cloudy", "Light rain")),
            )
            .mount(&h.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/icon"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&h.server)
            .await;

        let current = h
            .service
            .fetch_current_weather_with_icons(&WeatherQuery::DefaultLocation)
            .await
            .unwrap();
        assert_eq!(current.weather.condition, "Partly cloudy");
        assert!(current.icon.is_none());
        assert!(current.forecast_icon.is_none());
    }

    #[tokio::test]
    async fn test_without_icon_credentials_weather_has_no_icons() {
        let h = harness(false).await;
        Mock::given(method("GET"))
            .and(path("/forecast.json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(sample_payload("Sunny", "Sunny")),
            )
            .mount(&h.server)
            .await;

        let current = h
            .service
            .fetch_current_weather_with_icons(&WeatherQuery::DefaultLocation)
            .await
            .unwrap();
        assert!(current.icon.is_none());
    }

    #[tokio::test]
    async fn test_purge_cache_removes_both_namespaces() {
        let h = harness(false).await;
        let hour = Duration::from_secs(3600);
        for key in [
            "weather_forecast_data",
            "weather_forecast_coord_abc",
            "weather_icon_rain_default_svg_84",
            "unrelated",
        ] {
            h.cache.set(key, serde_json::json!(1), hour).await.unwrap();
        }

        let removed = h.service.purge_cache().await.unwrap();
        assert_eq!(removed, 3);
        assert_eq!(h.cache.len().await, 1);
    }

    fn assert_expires_in(expires_at: chrono::DateTime<Utc>, ttl: Duration) {
        let ttl = chrono::Duration::from_std(ttl).unwrap();
        let remaining = expires_at - Utc::now();
        assert!(remaining <= ttl, "expiry {} beyond TTL", remaining);
        assert!(
            remaining > ttl - chrono::Duration::seconds(60),
            "expiry {} well short of TTL",
            remaining
        );
    }

    #[tokio::test]
    async fn test_entries_carry_their_own_ttl() {
        let h = harness(true).await;
        Mock::given(method("GET"))
            .and(path("/forecast.json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(sample_payload("Sunny", "Sunny")),
            )
            .mount(&h.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/icon"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_body(2, "sun")))
            .mount(&h.server)
            .await;

        h.service
            .fetch_current_weather(&WeatherQuery::DefaultLocation)
            .await
            .unwrap();
        h.service
            .get_weather_icon(&IconRequest::new("Sunny"))
            .await
            .unwrap();

        let weather_expiry = h.cache.expires_at("weather_forecast_data").await.unwrap();
        assert_expires_in(weather_expiry, Duration::from_secs(3 * 60 * 60));

        let icon_expiry = h
            .cache
            .expires_at("weather_icon_sunny_default_svg_84")
            .await
            .unwrap();
        assert_expires_in(icon_expiry, Duration::from_secs(7 * 24 * 60 * 60));
    }

    #[tokio::test]
    async fn test_expired_icon_is_fetched_again() {
        let h = harness(true).await;
        Mock::given(method("GET"))
            .and(path("/icon"))
            .and(query_param("query", "rain"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_body(11, "rain")))
            .expect(2)
            .mount(&h.server)
            .await;

        let request = IconRequest::new("Rain");
        h.service.get_weather_icon(&request).await.unwrap();
        // still fresh: served from cache
        h.service.get_weather_icon(&request).await.unwrap();

        h.cache.force_expire(&request.cache_key()).await;
        let refetched = h.service.get_weather_icon(&request).await.unwrap();
        assert_eq!(refetched.search_term, "rain");
    }

    #[tokio::test]
    async fn test_expired_forecast_is_fetched_again() {
        let h = harness(false).await;
        Mock::given(method("GET"))
            .and(path("/forecast.json"))
            .and(query_param("q", "London"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(sample_payload("Cloudy", "Cloudy")),
            )
            .expect(2)
            .mount(&h.server)
            .await;

        let query = WeatherQuery::Location("London".to_string());
        h.service.get_cached_forecast(&query).await.unwrap();
        h.service.get_cached_forecast(&query).await.unwrap();

        h.cache.force_expire("weather_forecast_london").await;
        h.service.get_cached_forecast(&query).await.unwrap();
    }

    #[tokio::test]
    async fn test_icon_by_id() {
        let h = harness(true).await;
        Mock::given(method("GET"))
            .and(path("/icon/42"))
            .and(query_param("thumbnail_size", "84"))
            .and(query_param("blacklist", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "icon": {
                    "id": 42,
                    "attribution": "Snowflake by Artist from Noun Project",
                    "license_description": "public-domain",
                    "term": "snowflake",
                    "thumbnail_url": "https://static.thenounproject.com/png/42-84.png"
                }
            })))
            .expect(1)
            .mount(&h.server)
            .await;

        let result = h.service.get_icon_by_id("42").await.unwrap();
        assert_eq!(result.icon_url, "https://static.thenounproject.com/png/42-84.png");
        assert_eq!(result.license, "public-domain");
        assert_eq!(result.search_term, "snowflake");
        assert_eq!(h.cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_icon_by_id_errors() {
        let h = harness(false).await;
        let err = h.service.get_icon_by_id("42").await.unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));

        let h = harness(true).await;
        Mock::given(method("GET"))
            .and(path("/icon/7"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&h.server)
            .await;
        let err = h.service.get_icon_by_id("7").await.unwrap_err();
        assert!(matches!(err, ApiError::Upstream(_)));
    }
}
