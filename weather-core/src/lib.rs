//! Core library for the `weather` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Weather sources (OpenWeather, WeatherAPI.com) behind one async trait
//! - Shared domain models and the fetch failure taxonomy
//! - The forecast aggregator that reduces a multi-day sample series to one
//!   entry per future day
//! - The refresh orchestrator and its recent-locations cache
//!
//! It is used by `weather-cli`, but can also be reused by other binaries or services.

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod provider;

pub use aggregate::{DEFAULT_FORECAST_DAYS, aggregate};
pub use cache::RecentLocationCache;
pub use config::{Config, ProviderConfig, RefreshConfig};
pub use error::FetchFailure;
pub use model::{
    CurrentSnapshot, DailyForecastEntry, RecentLocationEntry, SampleRecord, WeatherReport,
};
pub use orchestrator::{DisplayUpdate, QueryState, RefreshOrchestrator, SubmitOutcome};
pub use provider::{ProviderId, WeatherSource};
