use serde::{Deserialize, Serialize};
use std::fmt;

const ICON_BASE_URL: &str = "https://openweathermap.org/img/wn";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.lat, self.lon)
    }
}

/// What a single resolution fetches weather for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LocationQuery {
    ByCity(String),
    ByCoordinates(Coordinates),
}

impl fmt::Display for LocationQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationQuery::ByCity(name) => write!(f, "city '{name}'"),
            LocationQuery::ByCoordinates(coords) => write!(f, "coordinates ({coords})"),
        }
    }
}

/// One 3-hour entry of the provider's forecast list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub timestamp_utc: i64,
    /// Provider-formatted timestamp (`"2024-08-28 12:00:00"`), the source of
    /// the sample's calendar date.
    pub local_time_text: Option<String>,
    pub temp_c: f64,
    pub feels_like_c: f64,
    pub humidity_pct: u8,
    pub wind_speed_mps: f64,
    /// Probability of precipitation in `0..=1`.
    pub precip_probability: Option<f64>,
    pub condition_main: String,
    pub condition_icon: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LocationContext {
    pub utc_offset_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Forecast {
    pub context: LocationContext,
    pub samples: Vec<RawSample>,
}

/// Current conditions as shown on the weather card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub city_name: String,
    pub country: Option<String>,
    pub temp_c: f64,
    pub feels_like_c: f64,
    pub humidity_pct: u8,
    pub wind_speed_mps: f64,
    pub condition_main: String,
    pub condition_description: String,
    pub condition_icon: String,
}

impl CurrentConditions {
    /// "Lahore, PK", or just the city when the provider sent no country.
    pub fn display_name(&self) -> String {
        match self.country.as_deref() {
            Some(country) if !country.is_empty() => format!("{}, {}", self.city_name, country),
            _ => self.city_name.clone(),
        }
    }
}

/// Both payloads of one resolved request.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    pub current: CurrentConditions,
    pub forecast: Forecast,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySummary {
    /// `YYYY-MM-DD`
    pub calendar_date: String,
    pub day_label: String,
    pub date_label: String,
    pub avg_temp_c: i64,
    pub representative_condition: String,
    pub representative_icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub local_time_label: String,
    pub temp_c: f64,
    pub feels_like_c: f64,
    pub humidity_pct: u8,
    pub wind_speed_mps: f64,
    pub precip_pct: u8,
}

/// Everything rendered for one committed report.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherView {
    pub current: CurrentConditions,
    pub context: LocationContext,
    pub daily: Vec<DailySummary>,
    pub chart: Vec<ChartPoint>,
}

/// The series a caller picks for the trend chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartMetric {
    #[default]
    Temp,
    Feels,
    Humidity,
    Wind,
    Pop,
}

impl ChartMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartMetric::Temp => "temp",
            ChartMetric::Feels => "feels",
            ChartMetric::Humidity => "humidity",
            ChartMetric::Wind => "wind",
            ChartMetric::Pop => "pop",
        }
    }

    pub const fn all() -> &'static [ChartMetric] {
        &[
            ChartMetric::Temp,
            ChartMetric::Feels,
            ChartMetric::Humidity,
            ChartMetric::Wind,
            ChartMetric::Pop,
        ]
    }

    /// Short label for the metric selector.
    pub fn label(&self) -> &'static str {
        match self {
            ChartMetric::Temp => "Temp",
            ChartMetric::Feels => "Feels",
            ChartMetric::Humidity => "Humidity",
            ChartMetric::Wind => "Wind",
            ChartMetric::Pop => "Precip",
        }
    }

    pub fn axis_label(&self) -> &'static str {
        match self {
            ChartMetric::Temp | ChartMetric::Feels => "Temperature (°C)",
            ChartMetric::Humidity => "Humidity (%)",
            ChartMetric::Wind => "Wind (m/s)",
            ChartMetric::Pop => "Precip (%)",
        }
    }

    pub fn value(&self, point: &ChartPoint) -> f64 {
        match self {
            ChartMetric::Temp => point.temp_c,
            ChartMetric::Feels => point.feels_like_c,
            ChartMetric::Humidity => f64::from(point.humidity_pct),
            ChartMetric::Wind => point.wind_speed_mps,
            ChartMetric::Pop => f64::from(point.precip_pct),
        }
    }

    /// Value formatted the way the chart tooltip shows it.
    pub fn format_value(&self, point: &ChartPoint) -> String {
        match self {
            ChartMetric::Temp | ChartMetric::Feels => {
                format!("{}°C", crate::aggregate::round_half_up(self.value(point)))
            }
            ChartMetric::Humidity | ChartMetric::Pop => format!("{}%", self.value(point)),
            ChartMetric::Wind => format!("{} m/s", point.wind_speed_mps),
        }
    }
}

impl fmt::Display for ChartMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ChartMetric {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "temp" => Ok(ChartMetric::Temp),
            "feels" => Ok(ChartMetric::Feels),
            "humidity" => Ok(ChartMetric::Humidity),
            "wind" => Ok(ChartMetric::Wind),
            "pop" => Ok(ChartMetric::Pop),
            _ => Err(anyhow::anyhow!(
                "Unknown metric '{value}'. Supported metrics: temp, feels, humidity, wind, pop."
            )),
        }
    }
}

/// URL of the provider's 2x condition icon.
pub fn icon_url(icon: &str) -> String {
    format!("{ICON_BASE_URL}/{icon}@2x.png")
}
