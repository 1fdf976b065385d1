//! Async driver around [`LocationResolver`].
//!
//! Geolocation and weather fetches run as spawned tasks; their results come
//! back over a channel and are applied one at a time, so resolver state is
//! only ever touched from the task that owns the `Dashboard`.

use std::{sync::Arc, time::Duration};

use tokio::sync::mpsc;

use crate::{
    Config,
    error::{FetchError, GeolocationError, StorageError},
    geolocation::{self, Geolocator},
    model::{Coordinates, WeatherReport},
    provider::{self, WeatherProvider},
    resolver::{
        CommitOutcome, DisplayState, GeolocationAttempt, LocationResolver, RequestId,
        ResolutionRequest,
    },
    store::{FileStorage, SavedLocationStore},
};

#[derive(Debug)]
enum Event {
    Geolocated { attempt: GeolocationAttempt, result: Result<Coordinates, GeolocationError> },
    Fetched { id: RequestId, result: Result<WeatherReport, FetchError> },
}

/// What applying one event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Processed {
    /// A geolocation attempt finished; `dispatched` is the request it led
    /// to, if any.
    Geolocation { dispatched: Option<RequestId> },
    Response { id: RequestId, outcome: CommitOutcome },
}

#[derive(Debug)]
pub struct Dashboard {
    provider: Arc<dyn WeatherProvider>,
    geolocator: Arc<dyn Geolocator>,
    geolocation_timeout: Duration,
    resolver: LocationResolver,
    saved: SavedLocationStore,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
}

impl Dashboard {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        geolocator: Arc<dyn Geolocator>,
        saved: SavedLocationStore,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            provider,
            geolocator,
            geolocation_timeout: Duration::from_millis(crate::config::DEFAULT_GEOLOCATION_TIMEOUT_MS),
            resolver: LocationResolver::new(),
            saved,
            events_tx,
            events_rx,
        }
    }

    pub fn with_geolocation_timeout(mut self, timeout: Duration) -> Self {
        self.geolocation_timeout = timeout;
        self
    }

    /// Provider, geolocation source and on-disk saved locations from config.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let provider: Arc<dyn WeatherProvider> = Arc::from(provider::provider_from_config(config)?);
        let geolocator: Arc<dyn Geolocator> = Arc::from(geolocation::geolocator_from_config(config));
        let saved = SavedLocationStore::load(Box::new(FileStorage::new(config.data_dir()?)));

        Ok(Self::new(provider, geolocator, saved)
            .with_geolocation_timeout(geolocation::attempt_timeout(config)))
    }

    pub fn resolver(&self) -> &LocationResolver {
        &self.resolver
    }

    pub fn display(&self) -> &DisplayState {
        self.resolver.display()
    }

    pub fn saved(&self) -> &SavedLocationStore {
        &self.saved
    }

    pub fn saved_mut(&mut self) -> &mut SavedLocationStore {
        &mut self.saved
    }

    /// Startup: geolocate, falling back to the first saved city. Returns
    /// `false` if already started.
    pub fn start(&mut self) -> bool {
        match self.resolver.start() {
            Some(attempt) => {
                self.spawn_geolocation(attempt);
                true
            }
            None => false,
        }
    }

    /// "Use my location".
    pub fn locate_me(&mut self) {
        let attempt = self.resolver.request_geolocation();
        self.spawn_geolocation(attempt);
    }

    /// Manual search; blank input is ignored.
    pub fn search(&mut self, city: &str) -> Option<RequestId> {
        let city = city.trim();
        if city.is_empty() {
            return None;
        }

        let request = self.resolver.search(city);
        Some(self.spawn_fetch(request))
    }

    pub fn search_coordinates(&mut self, coords: Coordinates) -> RequestId {
        let request = self.resolver.search_coordinates(coords);
        self.spawn_fetch(request)
    }

    pub fn select_saved(&mut self, city: &str) -> RequestId {
        let request = self.resolver.select_saved(city);
        self.spawn_fetch(request)
    }

    /// Saves the displayed city, or unsaves it if already saved.
    ///
    /// Returns `Some(true)` when it is now saved, `Some(false)` when it was
    /// removed and `None` when no weather is displayed.
    pub fn toggle_save_current(&mut self) -> Result<Option<bool>, StorageError> {
        let Some(city) = self.display().weather.as_ref().map(|w| w.current.city_name.clone()) else {
            return Ok(None);
        };

        if self.saved.is_saved(&city) {
            self.saved.remove(&city)?;
            Ok(Some(false))
        } else {
            self.saved.add(&city)?;
            Ok(Some(true))
        }
    }

    /// Waits for the next finished task and applies it.
    pub async fn process_next(&mut self) -> Option<Processed> {
        let event = self.events_rx.recv().await?;
        Some(self.apply(event))
    }

    /// Applies events until no geolocation attempt or current request is
    /// outstanding. Older requests may still be in flight afterwards.
    pub async fn settle(&mut self) -> &DisplayState {
        while self.resolver.is_busy() {
            if self.process_next().await.is_none() {
                break;
            }
        }
        self.resolver.display()
    }

    fn apply(&mut self, event: Event) -> Processed {
        match event {
            Event::Geolocated { attempt, result } => {
                let request = self.resolver.on_geolocation_result(attempt, result, self.saved.list());
                let dispatched = request.map(|request| self.spawn_fetch(request));
                Processed::Geolocation { dispatched }
            }
            Event::Fetched { id, result } => {
                let outcome = self.resolver.on_response(id, result);
                Processed::Response { id, outcome }
            }
        }
    }

    fn spawn_geolocation(&self, attempt: GeolocationAttempt) {
        let geolocator = Arc::clone(&self.geolocator);
        let tx = self.events_tx.clone();
        let timeout = self.geolocation_timeout;

        tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, geolocator.locate()).await {
                Ok(result) => result,
                Err(_) => Err(GeolocationError::Timeout),
            };
            // The receiver only goes away with the dashboard itself.
            let _ = tx.send(Event::Geolocated { attempt, result });
        });
    }

    fn spawn_fetch(&self, request: ResolutionRequest) -> RequestId {
        let ResolutionRequest { id, query } = request;
        let provider = Arc::clone(&self.provider);
        let tx = self.events_tx.clone();

        tokio::spawn(async move {
            let result = tokio::try_join!(provider.current(&query), provider.forecast(&query))
                .map(|(current, forecast)| WeatherReport { current, forecast });
            let _ = tx.send(Event::Fetched { id, result });
        });

        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{CurrentConditions, Forecast, LocationContext, LocationQuery, RawSample},
        resolver::ResolverState,
        store::{MemoryStorage, SAVED_CITIES_KEY},
    };
    use async_trait::async_trait;
    use std::{
        collections::{HashMap, HashSet},
        sync::atomic::{AtomicUsize, Ordering},
    };

    const HERE: Coordinates = Coordinates { lat: 31.52, lon: 74.36 };

    /// Answers every city after a per-city delay; coordinates answer as "Here".
    #[derive(Debug, Default)]
    struct ScriptedProvider {
        delays: HashMap<String, u64>,
        missing: HashSet<String>,
        broken_forecast: HashSet<String>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn delay(mut self, city: &str, secs: u64) -> Self {
            self.delays.insert(city.to_string(), secs);
            self
        }

        fn missing(mut self, city: &str) -> Self {
            self.missing.insert(city.to_string());
            self
        }

        fn broken_forecast(mut self, city: &str) -> Self {
            self.broken_forecast.insert(city.to_string());
            self
        }

        async fn lookup(&self, query: &LocationQuery) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let name = match query {
                LocationQuery::ByCity(city) => city.clone(),
                LocationQuery::ByCoordinates(_) => "Here".to_string(),
            };

            let secs = self.delays.get(&name).copied().unwrap_or(1);
            tokio::time::sleep(Duration::from_secs(secs)).await;

            if self.missing.contains(&name) {
                return Err(FetchError::Network {
                    status: Some(404),
                    message: Some("city not found".to_string()),
                });
            }
            Ok(name)
        }
    }

    #[async_trait]
    impl WeatherProvider for ScriptedProvider {
        async fn current(&self, query: &LocationQuery) -> Result<CurrentConditions, FetchError> {
            let name = self.lookup(query).await?;
            Ok(CurrentConditions {
                city_name: name,
                country: None,
                temp_c: 25.0,
                feels_like_c: 26.0,
                humidity_pct: 50,
                wind_speed_mps: 2.0,
                condition_main: "Clear".to_string(),
                condition_description: "clear sky".to_string(),
                condition_icon: "01d".to_string(),
            })
        }

        async fn forecast(&self, query: &LocationQuery) -> Result<Forecast, FetchError> {
            let name = self.lookup(query).await?;
            if self.broken_forecast.contains(&name) {
                return Err(FetchError::Network { status: Some(500), message: None });
            }

            Ok(Forecast {
                context: LocationContext { utc_offset_seconds: 0 },
                samples: vec![RawSample {
                    timestamp_utc: 1_724_803_200,
                    local_time_text: Some("2024-08-28 00:00:00".to_string()),
                    temp_c: 24.0,
                    feels_like_c: 25.0,
                    humidity_pct: 55,
                    wind_speed_mps: 2.5,
                    precip_probability: None,
                    condition_main: "Clear".to_string(),
                    condition_icon: "01n".to_string(),
                }],
            })
        }
    }

    #[derive(Debug)]
    struct SlowGeolocator {
        after: Duration,
        result: Result<Coordinates, GeolocationError>,
    }

    #[async_trait]
    impl Geolocator for SlowGeolocator {
        async fn locate(&self) -> Result<Coordinates, GeolocationError> {
            tokio::time::sleep(self.after).await;
            self.result.clone()
        }
    }

    fn geolocator(secs: u64, result: Result<Coordinates, GeolocationError>) -> Arc<SlowGeolocator> {
        Arc::new(SlowGeolocator { after: Duration::from_secs(secs), result })
    }

    fn saved(raw: &str) -> SavedLocationStore {
        SavedLocationStore::load(Box::new(MemoryStorage::with_value(SAVED_CITIES_KEY, raw)))
    }

    fn shown_city(dashboard: &Dashboard) -> Option<String> {
        dashboard.display().weather.as_ref().map(|w| w.current.city_name.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn startup_geolocation_success_shows_local_weather() {
        let mut dashboard =
            Dashboard::new(Arc::new(ScriptedProvider::default()), geolocator(1, Ok(HERE)), saved("[]"));

        assert!(dashboard.start());
        assert!(!dashboard.start());
        dashboard.settle().await;

        assert_eq!(shown_city(&dashboard).as_deref(), Some("Here"));
        assert_eq!(*dashboard.resolver().state(), ResolverState::ResolvedByCoordinates(HERE));
    }

    #[tokio::test(start_paused = true)]
    async fn geolocation_timeout_falls_back_to_first_saved_city() {
        let mut dashboard = Dashboard::new(
            Arc::new(ScriptedProvider::default()),
            geolocator(60, Ok(HERE)),
            saved(r#"["Multan","Lahore"]"#),
        );

        dashboard.start();
        dashboard.settle().await;

        assert_eq!(shown_city(&dashboard).as_deref(), Some("Multan"));
        assert_eq!(*dashboard.resolver().state(), ResolverState::ResolvedByCity("Multan".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn denial_with_nothing_saved_issues_no_query() {
        let provider = Arc::new(ScriptedProvider::default());
        let mut dashboard = Dashboard::new(
            provider.clone(),
            geolocator(0, Err(GeolocationError::Denied)),
            saved("not json"),
        );

        dashboard.start();
        let display = dashboard.settle().await.clone();

        assert_eq!(display, DisplayState::default());
        assert_eq!(*dashboard.resolver().state(), ResolverState::AwaitingManualInput);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_earlier_search_cannot_clobber_newer_one() {
        let provider = ScriptedProvider::default().delay("Lahore", 5).delay("Karachi", 1);
        let mut dashboard =
            Dashboard::new(Arc::new(provider), geolocator(0, Ok(HERE)), saved("[]"));

        let lahore = dashboard.search("Lahore").unwrap();
        let karachi = dashboard.search("  Karachi ").unwrap();
        dashboard.settle().await;
        assert_eq!(shown_city(&dashboard).as_deref(), Some("Karachi"));

        let late = dashboard.process_next().await;
        assert_eq!(late, Some(Processed::Response { id: lahore, outcome: CommitOutcome::Stale }));
        assert_eq!(shown_city(&dashboard).as_deref(), Some("Karachi"));
        assert_eq!(dashboard.resolver().latest_request(), Some(karachi));
    }

    #[tokio::test(start_paused = true)]
    async fn manual_search_wins_over_slow_geolocation() {
        let mut dashboard = Dashboard::new(
            Arc::new(ScriptedProvider::default()),
            geolocator(3, Ok(HERE)),
            saved("[]"),
        );

        dashboard.start();
        dashboard.search("Karachi");
        dashboard.settle().await;
        assert_eq!(shown_city(&dashboard).as_deref(), Some("Karachi"));

        let late = dashboard.process_next().await;
        assert_eq!(late, Some(Processed::Geolocation { dispatched: None }));
        assert_eq!(shown_city(&dashboard).as_deref(), Some("Karachi"));
    }

    #[tokio::test(start_paused = true)]
    async fn blank_search_is_ignored() {
        let mut dashboard =
            Dashboard::new(Arc::new(ScriptedProvider::default()), geolocator(0, Ok(HERE)), saved("[]"));

        assert_eq!(dashboard.search("   "), None);
        assert_eq!(dashboard.resolver().latest_request(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn half_failed_pair_commits_nothing_but_the_error() {
        let provider = ScriptedProvider::default().broken_forecast("Quetta").missing("Atlantis");
        let mut dashboard = Dashboard::new(Arc::new(provider), geolocator(0, Ok(HERE)), saved("[]"));

        dashboard.search("Lahore");
        dashboard.settle().await;
        assert_eq!(shown_city(&dashboard).as_deref(), Some("Lahore"));

        dashboard.search("Quetta");
        let display = dashboard.settle().await;
        assert_eq!(display.weather, None);
        assert_eq!(display.error.as_deref(), Some("Request failed with status code 500"));

        dashboard.search("Atlantis");
        let display = dashboard.settle().await;
        assert_eq!(display.error.as_deref(), Some("city not found"));
    }

    #[tokio::test(start_paused = true)]
    async fn select_saved_and_toggle_save_current() {
        let mut dashboard =
            Dashboard::new(Arc::new(ScriptedProvider::default()), geolocator(0, Ok(HERE)), saved("[]"));

        assert_eq!(dashboard.toggle_save_current().unwrap(), None);

        dashboard.search("Lahore");
        dashboard.settle().await;
        assert_eq!(dashboard.toggle_save_current().unwrap(), Some(true));
        assert_eq!(dashboard.saved().list(), ["Lahore"]);

        dashboard.select_saved("Lahore");
        dashboard.settle().await;
        assert_eq!(dashboard.toggle_save_current().unwrap(), Some(false));
        assert!(dashboard.saved().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn locate_me_failure_keeps_weather_and_reports() {
        let mut dashboard = Dashboard::new(
            Arc::new(ScriptedProvider::default()),
            geolocator(0, Err(GeolocationError::Denied)),
            saved(r#"["Multan"]"#),
        );

        dashboard.search("Lahore");
        dashboard.settle().await;

        dashboard.locate_me();
        let display = dashboard.settle().await;

        assert_eq!(
            display.error.as_deref(),
            Some(crate::resolver::GEOLOCATION_FAILED_MESSAGE)
        );
        assert_eq!(shown_city(&dashboard).as_deref(), Some("Lahore"));
    }

    #[tokio::test(start_paused = true)]
    async fn search_by_coordinates_resolves() {
        let mut dashboard =
            Dashboard::new(Arc::new(ScriptedProvider::default()), geolocator(0, Ok(HERE)), saved("[]"))
                .with_geolocation_timeout(Duration::from_secs(2));

        let id = dashboard.search_coordinates(HERE);
        dashboard.settle().await;

        assert_eq!(dashboard.resolver().latest_request(), Some(id));
        assert_eq!(shown_city(&dashboard).as_deref(), Some("Here"));
    }
}
