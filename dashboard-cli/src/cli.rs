use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use std::io::{self, Write};

use weather_dashboard_core::{
    ChartMetric, Config, Coordinates, Dashboard, ResolverState, SavedLocationStore,
    store::FileStorage,
};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-dashboard", version, about = "Current weather and 5-day forecast")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key.
    Configure,

    /// Show weather. Without a city or coordinates, uses your location and
    /// falls back to the first saved city.
    Show {
        /// City to search for, e.g. "Lahore".
        city: Option<String>,

        #[arg(long, requires = "lon", conflicts_with = "city", allow_hyphen_values = true)]
        lat: Option<f64>,

        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,

        /// Ask for the current location instead of startup resolution.
        #[arg(long, conflicts_with_all = ["city", "lat"])]
        locate: bool,

        /// Trend series to print: temp, feels, humidity, wind or pop.
        #[arg(long, default_value = "temp", value_parser = parse_metric)]
        metric: ChartMetric,

        /// Save the displayed city.
        #[arg(long)]
        save: bool,
    },

    /// Manage saved locations.
    Saved {
        #[command(subcommand)]
        action: SavedAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum SavedAction {
    /// List saved cities in the order they were saved.
    List,
    Add { city: String },
    Remove { city: String },
    /// Show weather for a saved city.
    Open {
        city: String,

        #[arg(long, default_value = "temp", value_parser = parse_metric)]
        metric: ChartMetric,
    },
}

fn parse_metric(value: &str) -> Result<ChartMetric, String> {
    ChartMetric::try_from(value).map_err(|e| e.to_string())
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { city, lat, lon, locate, metric, save } => {
                let config = Config::load()?;
                let mut dashboard = Dashboard::from_config(&config)?;

                match (city, lat.zip(lon)) {
                    (Some(city), _) => {
                        dashboard
                            .search(&city)
                            .ok_or_else(|| anyhow!("City name must not be empty"))?;
                    }
                    (None, Some((lat, lon))) => {
                        dashboard.search_coordinates(Coordinates { lat, lon });
                    }
                    (None, None) if locate => dashboard.locate_me(),
                    (None, None) => {
                        dashboard.start();
                    }
                }

                show(&mut dashboard, metric, save).await
            }
            Command::Saved { action } => saved(action).await,
        }
    }
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let api_key = inquire::Password::new("OpenWeather API key:")
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    config.set_api_key(api_key.trim().to_string());
    config.save()?;

    println!("Configuration saved to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn show(dashboard: &mut Dashboard, metric: ChartMetric, save: bool) -> anyhow::Result<()> {
    dashboard.settle().await;

    if save {
        let shown = dashboard.display().weather.as_ref().map(|w| w.current.city_name.clone());
        if let Some(city) = shown {
            dashboard.saved_mut().add(&city).context("Failed to save location")?;
        }
    }

    let display = dashboard.display();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if let Some(view) = display.weather.as_deref() {
        let is_saved = dashboard.saved().is_saved(&view.current.city_name);
        render::weather_card(&mut out, view, is_saved)?;
        render::daily_cards(&mut out, &view.daily)?;
        render::trend(&mut out, &view.chart, metric)?;
    }

    if let Some(message) = display.error.as_deref() {
        return Err(anyhow!(message.to_string()));
    }

    if *dashboard.resolver().state() == ResolverState::AwaitingManualInput {
        writeln!(
            out,
            "Could not detect your location and there are no saved locations yet.\n\
             Search for a city: weather-dashboard show <CITY>"
        )?;
    }

    Ok(())
}

/// Saved entries are stored trimmed, so lookups trim too.
fn city_arg(raw: &str) -> anyhow::Result<&str> {
    let city = raw.trim();
    if city.is_empty() {
        return Err(anyhow!("City name must not be empty"));
    }
    Ok(city)
}

fn load_saved(config: &Config) -> anyhow::Result<SavedLocationStore> {
    Ok(SavedLocationStore::load(Box::new(FileStorage::new(config.data_dir()?))))
}

async fn saved(action: SavedAction) -> anyhow::Result<()> {
    let config = Config::load()?;

    match action {
        SavedAction::List => {
            let store = load_saved(&config)?;
            render::saved_list(&mut io::stdout().lock(), store.list())?;
        }
        SavedAction::Add { city } => {
            let mut store = load_saved(&config)?;
            let city = city_arg(&city)?;
            if store.add(city).context("Failed to save location")? {
                println!("Saved {city}");
            } else {
                println!("{city} is already saved");
            }
        }
        SavedAction::Remove { city } => {
            let mut store = load_saved(&config)?;
            let city = city_arg(&city)?;
            if store.remove(city).context("Failed to update saved locations")? {
                println!("Removed {city}");
            } else {
                println!("{city} is not saved");
            }
        }
        SavedAction::Open { city, metric } => {
            let mut dashboard = Dashboard::from_config(&config)?;
            dashboard.select_saved(&city);
            show(&mut dashboard, metric, false).await?;
        }
    }

    Ok(())
}
