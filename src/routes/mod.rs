pub mod cache;
pub mod health;
pub mod icons;
pub mod weather;

use std::sync::Arc;

use crate::services::orchestrator::WeatherService;

/// Shared application state for all endpoints.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) service: Arc<WeatherService>,
}
