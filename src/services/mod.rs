pub mod icons;
pub mod oauth;
pub mod orchestrator;
pub mod terms;
pub mod weather_api;
