//! Core library for the weather dashboard.
//!
//! This crate defines:
//! - Forecast aggregation into daily cards and trend chart series
//! - Location resolution across geolocation, saved-city fallback and search
//! - The persisted list of saved locations
//! - The OpenWeather client, geolocation sources and configuration
//!
//! It is used by `weather-dashboard`, but holds no rendering code and can
//! back any other front end.

pub mod aggregate;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod geolocation;
pub mod model;
pub mod provider;
pub mod resolver;
pub mod store;

pub use aggregate::{build_chart_series, group_into_daily_summaries, provider_calendar_date, summarize};
pub use config::{Config, GeolocationConfig};
pub use dashboard::{Dashboard, Processed};
pub use error::{FetchError, GeolocationError, StorageError};
pub use geolocation::Geolocator;
pub use model::{
    ChartMetric, ChartPoint, Coordinates, CurrentConditions, DailySummary, Forecast, LocationContext,
    LocationQuery, RawSample, WeatherReport, WeatherView,
};
pub use provider::WeatherProvider;
pub use resolver::{
    CommitOutcome, DisplayState, LocationResolver, RequestId, ResolutionRequest, ResolverState,
};
pub use store::{KeyValueStorage, SavedLocationStore};
