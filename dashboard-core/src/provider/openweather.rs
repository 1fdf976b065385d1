use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer, de::DeserializeOwned};

use crate::{
    error::FetchError,
    model::{CurrentConditions, Forecast, LocationContext, LocationQuery, RawSample},
};

use super::WeatherProvider;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn with_base_url(api_key: String, base_url: &str) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    fn query_params(&self, query: &LocationQuery) -> Vec<(&'static str, String)> {
        let mut params = match query {
            LocationQuery::ByCity(name) => vec![("q", name.clone())],
            LocationQuery::ByCoordinates(coords) => {
                vec![("lat", coords.lat.to_string()), ("lon", coords.lon.to_string())]
            }
        };
        params.push(("units", "metric".to_string()));
        params.push(("appid", self.api_key.clone()));
        params
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &LocationQuery,
    ) -> Result<T, FetchError> {
        let url = format!("{}/{endpoint}", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(&self.query_params(query))
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Failed to send OpenWeather {endpoint} request for {query}: {e}");
                FetchError::Network { status: e.status().map(|s| s.as_u16()), message: None }
            })?;

        let status = res.status();
        let body = res.text().await.map_err(|e| {
            tracing::warn!("Failed to read OpenWeather {endpoint} response body: {e}");
            FetchError::Network { status: Some(status.as_u16()), message: None }
        })?;

        if !status.is_success() {
            tracing::warn!(
                "OpenWeather {endpoint} request for {query} failed with status {status}: {}",
                truncate_body(&body),
            );
            return Err(FetchError::Network {
                status: Some(status.as_u16()),
                message: provider_message(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::warn!("Failed to parse OpenWeather {endpoint} JSON: {e}");
            FetchError::MalformedResponse(e.to_string())
        })
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    main: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    icon: String,
}

#[derive(Debug, Deserialize, Default)]
struct OwWind {
    #[serde(default)]
    speed: f64,
}

#[derive(Debug, Deserialize, Default)]
struct OwSys {
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    #[serde(default)]
    sys: OwSys,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    #[serde(default)]
    wind: OwWind,
}

#[derive(Debug, Deserialize, Default)]
struct OwCity {
    #[serde(default)]
    timezone: i64,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    dt_txt: Option<String>,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    #[serde(default)]
    wind: OwWind,
    pop: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    #[serde(default)]
    city: Option<OwCity>,
    #[serde(default, deserialize_with = "lenient_entries")]
    list: Vec<OwForecastEntry>,
}

/// Keeps the entries that decode and drops the rest, so one bad sample
/// doesn't cost the whole forecast.
fn lenient_entries<'de, D>(deserializer: D) -> Result<Vec<OwForecastEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<serde_json::Value>> = Option::deserialize(deserializer)?;

    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .filter_map(|(idx, value)| match serde_json::from_value(value) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Skipping malformed OpenWeather forecast entry {idx}: {e}");
                None
            }
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct OwErrorBody {
    message: Option<String>,
}

impl From<OwCurrentResponse> for CurrentConditions {
    fn from(parsed: OwCurrentResponse) -> Self {
        let (condition_main, condition_description, condition_icon) = match parsed.weather.first() {
            Some(w) => (w.main.clone(), w.description.clone(), w.icon.clone()),
            None => ("Unknown".to_string(), String::new(), String::new()),
        };

        CurrentConditions {
            city_name: parsed.name,
            country: parsed.sys.country,
            temp_c: parsed.main.temp,
            feels_like_c: parsed.main.feels_like,
            humidity_pct: parsed.main.humidity,
            wind_speed_mps: parsed.wind.speed,
            condition_main,
            condition_description,
            condition_icon,
        }
    }
}

impl From<OwForecastEntry> for RawSample {
    fn from(entry: OwForecastEntry) -> Self {
        let (condition_main, condition_icon) = match entry.weather.first() {
            Some(w) => (w.main.clone(), w.icon.clone()),
            None => ("Unknown".to_string(), String::new()),
        };

        RawSample {
            timestamp_utc: entry.dt,
            local_time_text: entry.dt_txt,
            temp_c: entry.main.temp,
            feels_like_c: entry.main.feels_like,
            humidity_pct: entry.main.humidity,
            wind_speed_mps: entry.wind.speed,
            precip_probability: entry.pop,
            condition_main,
            condition_icon,
        }
    }
}

impl From<OwForecastResponse> for Forecast {
    fn from(parsed: OwForecastResponse) -> Self {
        Forecast {
            context: LocationContext {
                utc_offset_seconds: parsed.city.map(|c| c.timezone).unwrap_or(0),
            },
            samples: parsed.list.into_iter().map(RawSample::from).collect(),
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn current(&self, query: &LocationQuery) -> Result<CurrentConditions, FetchError> {
        let parsed: OwCurrentResponse = self.get_json("weather", query).await?;
        Ok(parsed.into())
    }

    async fn forecast(&self, query: &LocationQuery) -> Result<Forecast, FetchError> {
        let parsed: OwForecastResponse = self.get_json("forecast", query).await?;
        Ok(parsed.into())
    }
}

fn provider_message(body: &str) -> Option<String> {
    serde_json::from_str::<OwErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.is_empty())
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
