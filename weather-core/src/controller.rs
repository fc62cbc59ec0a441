//! Application state controller.
//!
//! Connects location availability and throttle decisions to the synchronizer
//! and exposes the observable state a UI renders. `current_weather` is written
//! only by the cache subscription started in [`WeatherController::new`].

use chrono::Utc;
use futures_util::StreamExt;
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;

use crate::{
    error::LocationError,
    location::LocationProvider,
    model::{LocationFix, LocationSuggestion, WeatherDocument},
    state::StateCell,
    sync::WeatherSynchronizer,
    throttle::{DEFAULT_MIN_UPDATE_INTERVAL, LocationThrottle},
};

pub const WAITING_FOR_LOCATION: &str = "Waiting for location...";
pub const PERMISSION_REQUIRED: &str =
    "Location permission is required to show weather for your current location";

/// Queries shorter than this never reach the remote source.
pub const MIN_SEARCH_QUERY_CHARS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    pub min_update_interval: Duration,
    /// Bound on the one-shot last-known-location lookup.
    pub location_timeout: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self { min_update_interval: DEFAULT_MIN_UPDATE_INTERVAL, location_timeout: Duration::from_secs(15) }
    }
}

/// Observable channels consumed by the UI.
#[derive(Debug)]
pub struct WeatherState {
    pub search_query: StateCell<String>,
    pub suggestions: StateCell<Vec<LocationSuggestion>>,
    pub current_weather: StateCell<Option<WeatherDocument>>,
    pub is_loading: StateCell<bool>,
    pub error: StateCell<Option<String>>,
}

impl Default for WeatherState {
    fn default() -> Self {
        Self {
            search_query: StateCell::default(),
            suggestions: StateCell::default(),
            current_weather: StateCell::default(),
            is_loading: StateCell::new(true),
            error: StateCell::default(),
        }
    }
}

struct Inner {
    state: WeatherState,
    sync: Arc<WeatherSynchronizer>,
    location: Arc<dyn LocationProvider>,
    throttle: Mutex<LocationThrottle>,
    settings: ControllerSettings,
}

#[derive(Default)]
struct Tasks {
    cache: Option<JoinHandle<()>>,
    location_updates: Option<JoinHandle<()>>,
}

pub struct WeatherController {
    inner: Arc<Inner>,
    tasks: Mutex<Tasks>,
}

impl WeatherController {
    /// Build the controller and start observing the cache.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        sync: Arc<WeatherSynchronizer>,
        location: Arc<dyn LocationProvider>,
        settings: ControllerSettings,
    ) -> Self {
        let inner = Arc::new(Inner {
            state: WeatherState::default(),
            sync,
            location,
            throttle: Mutex::new(LocationThrottle::new(settings.min_update_interval)),
            settings,
        });

        let cache_task = tokio::spawn(Arc::clone(&inner).observe_current_location_weather());

        Self { inner, tasks: Mutex::new(Tasks { cache: Some(cache_task), location_updates: None }) }
    }

    pub fn state(&self) -> &WeatherState {
        &self.inner.state
    }

    /// Fetch for the last known position, then follow continuous updates.
    pub async fn on_location_permission_granted(&self) {
        tracing::debug!("Location permission granted, fetching initial location");
        let inner = &self.inner;
        inner.state.is_loading.set(true);

        match inner.last_known_location().await {
            Ok(Some(fix)) => {
                tracing::debug!(lat = fix.latitude, lon = fix.longitude, "Initial location available");
                // The one-shot fetch bypasses the throttle but starts its window.
                inner.throttle.lock().mark_accepted(Utc::now());
                inner.fetch_for_current_location(fix).await;
            }
            Ok(None) => {
                tracing::debug!("No initial location available, waiting for location updates");
                inner.state.error.set(Some(WAITING_FOR_LOCATION.to_string()));
                inner.state.is_loading.set(false);
            }
            Err(e) => {
                tracing::error!(error = %e, "Error getting initial location");
                inner.state.error.set(Some(e.user_message()));
                inner.state.is_loading.set(false);
            }
        }

        self.start_location_updates();
    }

    pub fn on_location_permission_denied(&self) {
        tracing::debug!("Location permission denied");
        self.inner.state.error.set(Some(PERMISSION_REQUIRED.to_string()));
        self.inner.state.is_loading.set(false);
    }

    /// Publish the query and refresh suggestions for it.
    pub async fn on_search_query_changed(&self, query: &str) {
        let state = &self.inner.state;
        state.search_query.set(query.to_string());

        if query.chars().count() < MIN_SEARCH_QUERY_CHARS {
            state.suggestions.set(Vec::new());
            return;
        }

        match self.inner.sync.search_locations(query).await {
            // A newer query owns the suggestion list now.
            Ok(_) | Err(_) if state.search_query.get() != query => {
                tracing::debug!(query, "Dropping search result for superseded query");
            }
            Ok(suggestions) => {
                state.suggestions.set(suggestions);
            }
            Err(e) => {
                tracing::error!(query, error = %e, "Error searching locations");
                state.error.set(Some(e.user_message()));
            }
        }
    }

    /// Fetch weather for a picked suggestion (not the current location).
    pub async fn on_suggestion_selected(&self, suggestion: &LocationSuggestion) {
        let state = &self.inner.state;
        let query = suggestion.coordinate_query();
        tracing::debug!(name = %suggestion.name, query, "Selecting location");

        state.is_loading.set(true);
        match self.inner.sync.fetch_weather(&query, false).await {
            Ok(outcome) => {
                state.error.set(outcome.storage_warning.map(|e| e.user_message()));
                state.search_query.set(String::new());
                state.suggestions.set(Vec::new());
            }
            Err(e) => {
                tracing::error!(query, error = %e, "Error selecting location");
                state.error.set(Some(e.user_message()));
            }
        }
        state.is_loading.set(false);
    }

    pub fn clear_error(&self) {
        self.inner.state.error.set(None);
    }

    /// Stop both background subscriptions and wait for them to finish.
    pub async fn shutdown(&self) {
        let handles = {
            let mut tasks = self.tasks.lock();
            [tasks.cache.take(), tasks.location_updates.take()]
        };

        for handle in handles.into_iter().flatten() {
            handle.abort();
            // Cancellation is the expected outcome.
            let _ = handle.await;
        }
        tracing::debug!("Weather controller stopped");
    }

    fn start_location_updates(&self) {
        let mut tasks = self.tasks.lock();
        if tasks.location_updates.as_ref().is_some_and(|h| !h.is_finished()) {
            tracing::debug!("Location updates already running");
            return;
        }
        tasks.location_updates = Some(tokio::spawn(Arc::clone(&self.inner).follow_location_updates()));
    }
}

impl Drop for WeatherController {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut();
        for handle in [tasks.cache.take(), tasks.location_updates.take()].into_iter().flatten() {
            handle.abort();
        }
    }
}

impl Inner {
    async fn last_known_location(&self) -> Result<Option<LocationFix>, LocationError> {
        tokio::time::timeout(self.settings.location_timeout, self.location.last_known_location())
            .await
            .map_err(|_| LocationError::Timeout)?
    }

    async fn observe_current_location_weather(self: Arc<Self>) {
        let mut updates = self.sync.observe_current_location_weather();

        while let Some(item) = updates.next().await {
            match item {
                Ok(Some(weather)) => {
                    tracing::debug!(location = %weather.location.name, "Received weather update from cache");
                    self.state.current_weather.set(Some(weather));
                    self.state.is_loading.set(false);
                    self.state.error.set(None);
                }
                Ok(None) => {
                    self.state.current_weather.set(None);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Error observing current location weather");
                    self.state.error.set(Some(e.user_message()));
                    self.state.is_loading.set(false);
                }
            }
        }
        tracing::debug!("Cache subscription ended");
    }

    async fn follow_location_updates(self: Arc<Self>) {
        let mut updates = match self.location.location_updates() {
            Ok(updates) => updates,
            Err(e) => {
                tracing::error!(error = %e, "Could not start location updates");
                self.state.error.set(Some(e.user_message()));
                return;
            }
        };

        while let Some(item) = updates.next().await {
            match item {
                Ok(fix) => {
                    tracing::debug!(lat = fix.latitude, lon = fix.longitude, "Location update received");
                    let accepted = self.throttle.lock().try_accept(Utc::now());
                    if accepted {
                        self.fetch_for_current_location(fix).await;
                    } else {
                        tracing::debug!("Skipping weather update - too soon since last update");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Error getting location updates");
                    self.state.error.set(Some(e.user_message()));
                }
            }
        }
        tracing::debug!("Location update stream ended");
    }

    async fn fetch_for_current_location(&self, fix: LocationFix) {
        self.state.is_loading.set(true);
        let query = fix.coordinate_query();

        match self.sync.fetch_weather(&query, true).await {
            Ok(outcome) => {
                tracing::debug!(location = %outcome.document.location.name, "Fetched weather for current location");
                self.state.error.set(outcome.storage_warning.map(|e| e.user_message()));
            }
            Err(e) => {
                tracing::error!(query, error = %e, "Error fetching current location weather");
                self.state.error.set(Some(e.user_message()));
            }
        }
        self.state.is_loading.set(false);
    }
}
