use crate::services::oauth::OAuthCredentials;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_WEATHER_API_BASE_URL: &str = "https://api.weatherapi.com/v1";
const DEFAULT_ICON_API_BASE_URL: &str = "https://api.thenounproject.com/v2";
const DEFAULT_LOCATION: &str = "New York";

/// Application configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// Postgres connection string. When absent the cache lives in memory.
    pub database_url: Option<String>,
    pub weather_api_key: Option<String>,
    pub weather_api_base_url: String,
    /// Icon provider consumer key/secret. `None` disables icon lookups.
    pub icon_credentials: Option<OAuthCredentials>,
    pub icon_api_base_url: String,
    /// Location used when a weather request names none.
    pub default_location: String,
    pub purge_cache_on_shutdown: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} is invalid: {value:?}")]
    Invalid { name: &'static str, value: String },
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match var("PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                value: raw,
            })?,
            None => DEFAULT_PORT,
        };

        let purge_cache_on_shutdown = match var("PURGE_CACHE_ON_SHUTDOWN") {
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid {
                name: "PURGE_CACHE_ON_SHUTDOWN",
                value: raw,
            })?,
            None => false,
        };

        let icon_credentials = match (var("NOUN_PROJECT_API_KEY"), var("NOUN_PROJECT_SECRET_KEY")) {
            (Some(consumer_key), Some(consumer_secret)) => Some(OAuthCredentials {
                consumer_key,
                consumer_secret,
            }),
            _ => None,
        };

        Ok(Self {
            port,
            database_url: var("DATABASE_URL"),
            weather_api_key: var("WEATHER_API_KEY"),
            weather_api_base_url: var("WEATHER_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_WEATHER_API_BASE_URL.to_string()),
            icon_credentials,
            icon_api_base_url: var("ICON_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_ICON_API_BASE_URL.to_string()),
            default_location: var("DEFAULT_LOCATION")
                .unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
            purge_cache_on_shutdown,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
