//! Weather synchronizer: the repository between the remote source, the
//! snapshot cache and observers.
//!
//! Fetches write to the cache; observers read only from the cache stream.
//! A fetch's return value is for the immediate caller and is never pushed to
//! observers directly.

use chrono::Utc;
use futures_util::stream::{self, BoxStream, StreamExt};
use std::{sync::Arc, time::Duration};

use crate::{
    cache::CacheStore,
    error::{RemoteError, StorageError, SyncError},
    model::{LocationSuggestion, WeatherDocument, WeatherSnapshot, coordinate_query},
    provider::WeatherProvider,
};

pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60 * 60);

/// Delete snapshots fetched more than `retention` ago. Needs no remote source.
pub async fn purge_stale_snapshots(
    store: &dyn CacheStore,
    retention: Duration,
) -> Result<usize, StorageError> {
    let retention_millis = i64::try_from(retention.as_millis()).unwrap_or(i64::MAX);
    let cutoff = Utc::now().timestamp_millis().saturating_sub(retention_millis);

    let removed = store.delete_older_than(cutoff).await?;
    tracing::debug!(removed, "Purged stale weather snapshots");
    Ok(removed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    pub forecast_days: u8,
    pub retention: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self { forecast_days: 5, retention: DEFAULT_RETENTION }
    }
}

/// Result of a successful remote fetch.
#[derive(Debug)]
pub struct FetchOutcome {
    pub document: WeatherDocument,
    /// Set when the document could not be cached. The document is still valid,
    /// but observers of the cache will not see it.
    pub storage_warning: Option<StorageError>,
}

pub type CurrentWeatherStream = BoxStream<'static, Result<Option<WeatherDocument>, SyncError>>;

pub struct WeatherSynchronizer {
    provider: Arc<dyn WeatherProvider>,
    store: Arc<dyn CacheStore>,
    settings: SyncSettings,
}

impl std::fmt::Debug for WeatherSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherSynchronizer")
            .field("provider", &self.provider)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl WeatherSynchronizer {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        store: Arc<dyn CacheStore>,
        settings: SyncSettings,
    ) -> Self {
        Self { provider, store, settings }
    }

    /// Live view of the current-location weather.
    ///
    /// Yields the present value first, then every change. A payload that fails
    /// to deserialize is reported as an `Err` item; the stream keeps going.
    pub fn observe_current_location_weather(&self) -> CurrentWeatherStream {
        let rx = self.store.read_current();
        tracing::debug!("Observing current location weather from cache");

        stream::unfold(rx, |mut rx| async move {
            rx.changed().await.ok()?;
            let snapshot = rx.borrow_and_update().clone();
            Some((decode(snapshot), rx))
        })
        .boxed()
    }

    /// Fetch a forecast and cache it.
    ///
    /// For the current location the existing flag is cleared before the new
    /// snapshot is written. Cache failures do not fail the fetch; they come
    /// back in [`FetchOutcome::storage_warning`].
    pub async fn fetch_weather(
        &self,
        query: &str,
        is_current_location: bool,
    ) -> Result<FetchOutcome, RemoteError> {
        tracing::debug!(query, is_current_location, "Fetching weather");

        let document = self.provider.fetch_forecast(query, self.settings.forecast_days).await?;
        tracing::info!(location = %document.location.name, "Fetched weather");

        let storage_warning = self.persist(&document, is_current_location).await.err();
        if let Some(e) = &storage_warning {
            tracing::warn!(location = %document.location.name, error = %e, "Failed to cache weather");
        }

        Ok(FetchOutcome { document, storage_warning })
    }

    async fn persist(
        &self,
        document: &WeatherDocument,
        is_current_location: bool,
    ) -> Result<(), StorageError> {
        if is_current_location {
            tracing::debug!("Clearing previous current location data");
            self.store.clear_current_flag().await?;
        }

        let snapshot = WeatherSnapshot::from_document(document, Utc::now(), is_current_location)?;
        self.store.write(&snapshot).await
    }

    pub async fn search_locations(&self, query: &str) -> Result<Vec<LocationSuggestion>, RemoteError> {
        let results = self.provider.search(query).await?;
        tracing::debug!(query, count = results.len(), "Location search finished");
        Ok(results)
    }

    /// Best-effort reverse lookup. Falls back to `"lat,lon"` on any failure.
    pub async fn resolve_location_name(&self, lat: f64, lon: f64) -> String {
        let query = coordinate_query(lat, lon);
        match self.provider.fetch_current(&query).await {
            Ok(doc) => doc.location.name,
            Err(e) => {
                tracing::warn!(error = %e, "Reverse lookup failed, using coordinates");
                query
            }
        }
    }

    pub async fn clear_current_location_flag(&self) -> Result<(), StorageError> {
        self.store.clear_current_flag().await
    }

    /// Delete snapshots older than the retention window.
    pub async fn purge_stale_entries(&self) -> Result<usize, StorageError> {
        purge_stale_snapshots(self.store.as_ref(), self.settings.retention).await
    }

    /// Cached copy of a location's weather, if any.
    pub async fn cached_weather(
        &self,
        location_key: &str,
    ) -> Result<Option<(WeatherSnapshot, WeatherDocument)>, SyncError> {
        let Some(snapshot) = self.store.read_by_key(location_key).await? else {
            return Ok(None);
        };
        let document = snapshot.document().map_err(|source| SyncError::CorruptPayload {
            location_key: snapshot.location_key.clone(),
            source,
        })?;
        Ok(Some((snapshot, document)))
    }
}

fn decode(snapshot: Option<WeatherSnapshot>) -> Result<Option<WeatherDocument>, SyncError> {
    let Some(snapshot) = snapshot else {
        tracing::debug!("No current location weather in cache");
        return Ok(None);
    };

    snapshot.document().map(Some).map_err(|source| {
        tracing::error!(location = %snapshot.location_key, "Cached payload failed to deserialize");
        SyncError::CorruptPayload { location_key: snapshot.location_key, source }
    })
}
