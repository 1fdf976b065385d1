use crate::{
    Config,
    error::FetchError,
    model::{CurrentConditions, Forecast, LocationQuery},
    provider::openweather::OpenWeatherProvider,
};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn current(&self, query: &LocationQuery) -> Result<CurrentConditions, FetchError>;

    async fn forecast(&self, query: &LocationQuery) -> Result<Forecast, FetchError>;
}

/// Construct the OpenWeather client from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let api_key = config.api_key().ok_or_else(|| {
        anyhow::anyhow!(
            "No OpenWeather API key configured.\n\
             Hint: run `weather-dashboard configure` or set OPENWEATHER_API_KEY."
        )
    })?;

    Ok(Box::new(OpenWeatherProvider::with_base_url(api_key.to_owned(), config.base_url())))
}
