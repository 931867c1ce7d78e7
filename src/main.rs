// Weather Icon API v0.1
use axum::routing::{delete, get};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod cache;
mod config;
mod db;
mod errors;
mod helpers;
mod models;
mod routes;
mod services;

use cache::{run_expiry_sweep, CacheStore, MemoryCache, PgCache, EXPIRY_SWEEP_INTERVAL};
use config::AppConfig;
use routes::AppState;
use services::icons::IconClient;
use services::orchestrator::{WeatherQuery, WeatherService};
use services::weather_api::WeatherClient;

/// Maximum number of connections in the database pool.
const DB_POOL_MAX_CONNECTIONS: u32 = 5;
/// Minimum number of connections kept alive in the database pool.
const DB_POOL_MIN_CONNECTIONS: u32 = 1;

/// Weather Icon API OpenAPI document.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Weather Icon API",
        version = "0.1.0",
        description = "Weather widget backend. Fetches current conditions and today's \
            forecast from WeatherAPI.com, finds a matching condition icon on The Noun \
            Project (OAuth 1.0a signed), and caches both with per-entry expiry.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Weather", description = "Current weather and forecast"),
        (name = "Icons", description = "Condition icons"),
        (name = "Cache", description = "Cache maintenance"),
    ),
    paths(
        routes::health::health_check,
        routes::weather::get_current_weather,
        routes::weather::get_cached_weather,
        routes::icons::get_weather_icon,
        routes::icons::get_icon_by_id,
        routes::cache::purge_cache,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            routes::weather::CurrentWeatherResponse,
            routes::weather::WeatherResponse,
            routes::icons::IconResponse,
            routes::cache::PurgeResponse,
            routes::cache::PurgeResult,
            models::WeatherSnapshot,
            models::DailyForecast,
            models::CurrentWeather,
            models::IconResult,
            services::icons::FileType,
            errors::ErrorResponse,
        )
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weather_icon_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let cache = connect_cache(&config).await;

    // Spawn background expiry sweep (first pass runs immediately)
    tokio::spawn(run_expiry_sweep(cache.clone(), EXPIRY_SWEEP_INTERVAL));

    if config.weather_api_key.is_none() {
        tracing::warn!("WEATHER_API_KEY not set; weather requests will fail");
    }

    let weather_client = WeatherClient::new(
        &config.weather_api_base_url,
        config.weather_api_key.clone(),
    )
    .expect("Failed to build weather HTTP client");

    let icon_client = match config.icon_credentials.clone() {
        Some(credentials) => Some(
            IconClient::new(&config.icon_api_base_url, credentials)
                .expect("Failed to build icon HTTP client"),
        ),
        None => {
            tracing::warn!("Icon provider credentials not set; icon lookups are disabled");
            None
        }
    };

    let service = Arc::new(WeatherService::new(
        weather_client,
        icon_client,
        cache,
        &config.default_location,
    ));

    // Warm the cache for the default location in the background
    let warmup = service.clone();
    tokio::spawn(async move {
        match warmup.get_cached_forecast(&WeatherQuery::DefaultLocation).await {
            Ok(snapshot) => tracing::info!(
                "Warmed weather cache for {} ({})",
                snapshot.location,
                snapshot.condition
            ),
            Err(e) => tracing::warn!("Weather cache warm-up failed: {}", e),
        }
    });

    let app_state = AppState {
        service: service.clone(),
    };

    // CORS: GET for the widget, DELETE for cache purge
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::DELETE])
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/weather/current", get(routes::weather::get_current_weather))
        .route("/api/v1/weather/cached", get(routes::weather::get_cached_weather))
        .route("/api/v1/icons/weather", get(routes::icons::get_weather_icon))
        .route("/api/v1/icons/:icon_id", get(routes::icons::get_icon_by_id))
        .route("/api/v1/cache", delete(routes::cache::purge_cache))
        .with_state(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API server listening on {}", addr);
    tracing::info!(
        "Swagger UI available at http://localhost:{}/swagger-ui/",
        config.port
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server terminated unexpectedly");

    if config.purge_cache_on_shutdown {
        match service.purge_cache().await {
            Ok(n) => tracing::info!("Purged {} cache entries on shutdown", n),
            Err(e) => tracing::error!("Cache purge on shutdown failed: {}", e),
        }
    }
    tracing::info!("Shut down");
}

/// Postgres when `DATABASE_URL` is set, otherwise an in-process cache.
async fn connect_cache(config: &AppConfig) -> Arc<dyn CacheStore> {
    let Some(database_url) = config.database_url.as_deref() else {
        tracing::info!("DATABASE_URL not set; using in-memory cache");
        return Arc::new(MemoryCache::new());
    };

    let pool = PgPoolOptions::new()
        .max_connections(DB_POOL_MAX_CONNECTIONS)
        .min_connections(DB_POOL_MIN_CONNECTIONS)
        .connect(database_url)
        .await
        .expect("Failed to connect to database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database migrations completed; using Postgres cache");
    Arc::new(PgCache::new(pool))
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
