//! Single-shot sources of the user's coordinates.
//!
//! Sources never apply the attempt timeout themselves; the dashboard races
//! them against it so every source times out the same way.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::{fmt::Debug, time::Duration};

use crate::{Config, error::GeolocationError, model::Coordinates};

pub const DEFAULT_IP_LOOKUP_URL: &str = "http://ip-api.com/json/?fields=status,message,lat,lon";

const USER_AGENT: &str = concat!("weather-dashboard/", env!("CARGO_PKG_VERSION"));

#[async_trait]
pub trait Geolocator: Send + Sync + Debug {
    async fn locate(&self) -> Result<Coordinates, GeolocationError>;
}

/// The user refused location access.
#[derive(Debug, Clone, Default)]
pub struct DisabledGeolocator;

#[async_trait]
impl Geolocator for DisabledGeolocator {
    async fn locate(&self) -> Result<Coordinates, GeolocationError> {
        Err(GeolocationError::Denied)
    }
}

/// Always reports the same configured position.
#[derive(Debug, Clone)]
pub struct FixedGeolocator {
    coords: Coordinates,
}

impl FixedGeolocator {
    pub fn new(coords: Coordinates) -> Self {
        Self { coords }
    }
}

#[async_trait]
impl Geolocator for FixedGeolocator {
    async fn locate(&self) -> Result<Coordinates, GeolocationError> {
        Ok(self.coords)
    }
}

/// Approximate position from the public IP address.
#[derive(Debug, Clone)]
pub struct IpGeolocator {
    url: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct IpLookupResponse {
    status: String,
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

impl IpGeolocator {
    pub fn new(url: impl Into<String>) -> Self {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build geolocation client, using defaults: {e}");
                Client::new()
            });

        Self { url: url.into(), http }
    }
}

impl Default for IpGeolocator {
    fn default() -> Self {
        Self::new(DEFAULT_IP_LOOKUP_URL)
    }
}

#[async_trait]
impl Geolocator for IpGeolocator {
    async fn locate(&self) -> Result<Coordinates, GeolocationError> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| GeolocationError::Unavailable(format!("lookup request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(GeolocationError::Unavailable(format!(
                "lookup returned status {}",
                response.status()
            )));
        }

        let body: IpLookupResponse = response
            .json()
            .await
            .map_err(|e| GeolocationError::Unavailable(format!("lookup parse error: {e}")))?;

        match (body.status.as_str(), body.lat, body.lon) {
            ("success", Some(lat), Some(lon)) => {
                tracing::info!("IP geolocation resolved to {lat}, {lon}");
                Ok(Coordinates { lat, lon })
            }
            _ => Err(GeolocationError::Unavailable(
                body.message.unwrap_or_else(|| format!("lookup status '{}'", body.status)),
            )),
        }
    }
}

/// Picks a source: disabled, then fixed coordinates, then IP lookup.
pub fn geolocator_from_config(config: &Config) -> Box<dyn Geolocator> {
    let geo = &config.geolocation;

    if !geo.enabled {
        return Box::new(DisabledGeolocator);
    }

    if let Some(coords) = geo.fixed_coordinates() {
        return Box::new(FixedGeolocator::new(coords));
    }

    Box::new(IpGeolocator::new(geo.ip_lookup_url.as_deref().unwrap_or(DEFAULT_IP_LOOKUP_URL)))
}

/// Geolocation attempt timeout from config.
pub fn attempt_timeout(config: &Config) -> Duration {
    Duration::from_millis(config.geolocation.timeout_ms)
}
