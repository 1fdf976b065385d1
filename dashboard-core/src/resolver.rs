//! Decides which location's weather is on screen.
//!
//! The resolver is a synchronous state machine. It never performs I/O: it
//! hands out [`ResolutionRequest`]s and geolocation attempt numbers, and is
//! fed their outcomes back. Every request carries a strictly increasing id
//! and only the response for the highest id issued so far may change what
//! is displayed; anything older is dropped, even when it succeeded.

use std::{fmt, sync::Arc};

use tokio::sync::watch;

use crate::{
    aggregate::summarize,
    error::{FetchError, GeolocationError},
    model::{Coordinates, LocationQuery, WeatherReport, WeatherView},
};

/// Shown when a user-requested geolocation fails.
pub const GEOLOCATION_FAILED_MESSAGE: &str =
    "Unable to fetch your location. Please allow location or search manually.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeolocationAttempt(u64);

/// A fetch the caller must perform: current weather and forecast for
/// `query`, reported back under `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionRequest {
    pub id: RequestId,
    pub query: LocationQuery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeolocationOrigin {
    /// First attempt at startup; failure falls back to saved cities.
    Startup,
    /// "Use my location"; failure is reported to the user.
    UserRequested,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolverState {
    Idle,
    AttemptingGeolocation { attempt: GeolocationAttempt, origin: GeolocationOrigin },
    AttemptingSavedFallback,
    /// Nothing to show until the user searches or picks a saved city.
    AwaitingManualInput,
    ResolvedByCoordinates(Coordinates),
    ResolvedByCity(String),
}

/// What the screen shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayState {
    /// Request currently loading, if any.
    pub pending: Option<RequestId>,
    pub weather: Option<Arc<WeatherView>>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The report is now displayed.
    Committed,
    /// The current request failed; weather was cleared and an error shown.
    Failed,
    /// Superseded by a newer request; nothing changed.
    Stale,
}

/// State handed to subscribers after every change.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverSnapshot {
    pub state: ResolverState,
    pub display: DisplayState,
}

#[derive(Debug)]
pub struct LocationResolver {
    state: ResolverState,
    display: DisplayState,
    last_request: u64,
    last_attempt: u64,
    /// Query behind the most recent request.
    resolved: Option<LocationQuery>,
    updates: watch::Sender<ResolverSnapshot>,
}

impl Default for LocationResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationResolver {
    pub fn new() -> Self {
        let state = ResolverState::Idle;
        let display = DisplayState::default();
        let (updates, _) =
            watch::channel(ResolverSnapshot { state: state.clone(), display: display.clone() });

        Self { state, display, last_request: 0, last_attempt: 0, resolved: None, updates }
    }

    pub fn state(&self) -> &ResolverState {
        &self.state
    }

    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    /// Highest request id issued so far.
    pub fn latest_request(&self) -> Option<RequestId> {
        (self.last_request > 0).then_some(RequestId(self.last_request))
    }

    /// Whether a geolocation attempt or the current request is outstanding.
    pub fn is_busy(&self) -> bool {
        matches!(self.state, ResolverState::AttemptingGeolocation { .. })
            || self.display.pending.is_some()
    }

    pub fn snapshot(&self) -> ResolverSnapshot {
        ResolverSnapshot { state: self.state.clone(), display: self.display.clone() }
    }

    /// Latest snapshot, updated after every transition. Drop the receiver to
    /// unsubscribe.
    pub fn subscribe(&self) -> watch::Receiver<ResolverSnapshot> {
        self.updates.subscribe()
    }

    /// Begins the startup geolocation attempt. Only the first call from
    /// `Idle` does anything.
    pub fn start(&mut self) -> Option<GeolocationAttempt> {
        if self.state != ResolverState::Idle {
            tracing::debug!("Resolver already started ({:?}), not geolocating again", self.state);
            return None;
        }

        Some(self.begin_geolocation(GeolocationOrigin::Startup))
    }

    /// Begins a geolocation attempt on the user's behalf, from any state.
    pub fn request_geolocation(&mut self) -> GeolocationAttempt {
        self.begin_geolocation(GeolocationOrigin::UserRequested)
    }

    fn begin_geolocation(&mut self, origin: GeolocationOrigin) -> GeolocationAttempt {
        self.last_attempt += 1;
        let attempt = GeolocationAttempt(self.last_attempt);

        tracing::debug!("Geolocation attempt {} ({origin:?})", self.last_attempt);
        self.state = ResolverState::AttemptingGeolocation { attempt, origin };
        self.notify();
        attempt
    }

    /// Applies the outcome of a geolocation attempt.
    ///
    /// Results for an attempt that is no longer current (superseded by a
    /// search, or answered already) are ignored. On a startup failure the
    /// first of `saved` is queried; with nothing saved the resolver waits
    /// for the user. Returns the request to perform, if any.
    pub fn on_geolocation_result(
        &mut self,
        attempt: GeolocationAttempt,
        result: Result<Coordinates, GeolocationError>,
        saved: &[String],
    ) -> Option<ResolutionRequest> {
        let origin = match self.state {
            ResolverState::AttemptingGeolocation { attempt: current, origin } if current == attempt => {
                origin
            }
            _ => {
                tracing::debug!("Ignoring result of superseded geolocation attempt {}", attempt.0);
                return None;
            }
        };

        let err = match result {
            Ok(coords) => return Some(self.dispatch(LocationQuery::ByCoordinates(coords))),
            Err(err) => err,
        };

        match origin {
            GeolocationOrigin::Startup => {
                tracing::info!("Geolocation unavailable ({err}), falling back to saved locations");
                self.state = ResolverState::AttemptingSavedFallback;

                match saved.first() {
                    Some(city) => Some(self.dispatch(LocationQuery::ByCity(city.clone()))),
                    None => {
                        tracing::debug!("No saved locations, awaiting manual input");
                        self.state = ResolverState::AwaitingManualInput;
                        self.notify();
                        None
                    }
                }
            }
            GeolocationOrigin::UserRequested => {
                tracing::warn!("User-requested geolocation failed: {err}");
                self.state = match &self.resolved {
                    Some(LocationQuery::ByCity(city)) => ResolverState::ResolvedByCity(city.clone()),
                    Some(LocationQuery::ByCoordinates(coords)) => {
                        ResolverState::ResolvedByCoordinates(*coords)
                    }
                    None => ResolverState::AwaitingManualInput,
                };
                self.display.error = Some(GEOLOCATION_FAILED_MESSAGE.to_string());
                self.notify();
                None
            }
        }
    }

    /// Manual search. Supersedes anything in flight.
    pub fn search(&mut self, city: &str) -> ResolutionRequest {
        self.dispatch(LocationQuery::ByCity(city.to_string()))
    }

    /// A saved city was picked. Supersedes anything in flight.
    pub fn select_saved(&mut self, city: &str) -> ResolutionRequest {
        self.dispatch(LocationQuery::ByCity(city.to_string()))
    }

    /// Manual search by coordinates. Supersedes anything in flight.
    pub fn search_coordinates(&mut self, coords: Coordinates) -> ResolutionRequest {
        self.dispatch(LocationQuery::ByCoordinates(coords))
    }

    fn dispatch(&mut self, query: LocationQuery) -> ResolutionRequest {
        self.last_request += 1;
        let id = RequestId(self.last_request);

        self.state = match &query {
            LocationQuery::ByCity(city) => ResolverState::ResolvedByCity(city.clone()),
            LocationQuery::ByCoordinates(coords) => ResolverState::ResolvedByCoordinates(*coords),
        };
        self.resolved = Some(query.clone());
        self.display.pending = Some(id);
        self.display.error = None;

        tracing::debug!("Dispatching request {id} for {query}");
        self.notify();
        ResolutionRequest { id, query }
    }

    /// Applies the paired current + forecast outcome for request `id`.
    pub fn on_response(
        &mut self,
        id: RequestId,
        result: Result<WeatherReport, FetchError>,
    ) -> CommitOutcome {
        if self.latest_request() != Some(id) || self.display.pending != Some(id) {
            tracing::debug!(
                "Discarding stale response for request {id} (latest is {:?})",
                self.latest_request()
            );
            return CommitOutcome::Stale;
        }

        self.display.pending = None;
        let outcome = match result {
            Ok(report) => {
                tracing::info!(
                    "Request {id} resolved to {}",
                    report.current.display_name()
                );
                self.display.weather = Some(Arc::new(summarize(report)));
                self.display.error = None;
                CommitOutcome::Committed
            }
            Err(err) => {
                tracing::warn!("Request {id} failed: {err}");
                self.display.weather = None;
                self.display.error = Some(err.user_message());
                CommitOutcome::Failed
            }
        };

        self.notify();
        outcome
    }

    fn notify(&mut self) {
        self.updates.send_replace(self.snapshot());
    }
}
