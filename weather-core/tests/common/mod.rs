//! In-process fakes shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::sync::{mpsc, watch};

use weather_core::{
    CacheStore, LocationError, LocationFix, LocationProvider, LocationSuggestion, LocationUpdates,
    RemoteError, SqliteCacheStore, StorageError, WeatherDocument, WeatherProvider, WeatherSnapshot,
};

pub fn document(name: &str) -> WeatherDocument {
    serde_json::from_value(serde_json::json!({
        "location": {
            "name": name, "region": "Region", "country": "Country",
            "lat": 51.52, "lon": -0.11, "localtime": "2024-09-08 14:05"
        },
        "current": {
            "temp_c": 18.0, "temp_f": 64.4,
            "condition": { "text": "Sunny", "icon": "//cdn.weatherapi.com/113.png", "code": 1000 },
            "wind_kph": 11.2, "wind_dir": "WSW", "humidity": 72, "feelslike_c": 17.5
        },
        "forecast": { "forecastday": [ {
            "date": "2024-09-08",
            "day": {
                "maxtemp_c": 20.1, "mintemp_c": 12.4, "daily_chance_of_rain": 10,
                "condition": { "text": "Sunny", "icon": "//cdn.weatherapi.com/113.png", "code": 1000 }
            },
            "astro": { "sunrise": "06:29 AM", "sunset": "07:31 PM" },
            "hour": []
        } ] }
    }))
    .expect("fixture document must parse")
}

pub fn suggestion(id: i64, name: &str, lat: f64, lon: f64) -> LocationSuggestion {
    LocationSuggestion {
        id,
        name: name.to_string(),
        region: "Region".into(),
        country: "Country".into(),
        lat,
        lon,
    }
}

fn remote_failure() -> RemoteError {
    RemoteError::Status { status: 500, body: "boom".into() }
}

/// Scriptable remote source that records every call.
#[derive(Debug, Default)]
pub struct FakeProvider {
    /// query -> location name of the returned document; defaults to the query.
    names: Mutex<HashMap<String, String>>,
    search_results: Mutex<Vec<LocationSuggestion>>,
    /// Per-query overrides of `search_results`.
    search_results_for: Mutex<HashMap<String, Vec<LocationSuggestion>>>,
    search_delays: Mutex<HashMap<String, Duration>>,
    failing_searches: Mutex<HashSet<String>>,
    pub fail_forecast: AtomicBool,
    pub fail_search: AtomicBool,
    pub fail_current: AtomicBool,
    pub forecast_calls: Mutex<Vec<(String, u8)>>,
    pub search_calls: Mutex<Vec<String>>,
    pub current_calls: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn resolve(&self, query: &str, name: &str) {
        self.names.lock().insert(query.to_string(), name.to_string());
    }

    pub fn set_search_results(&self, results: Vec<LocationSuggestion>) {
        *self.search_results.lock() = results;
    }

    pub fn set_search_results_for(&self, query: &str, results: Vec<LocationSuggestion>) {
        self.search_results_for.lock().insert(query.to_string(), results);
    }

    /// Make searches for `query` take `delay` before answering.
    pub fn delay_search(&self, query: &str, delay: Duration) {
        self.search_delays.lock().insert(query.to_string(), delay);
    }

    pub fn fail_search_for(&self, query: &str) {
        self.failing_searches.lock().insert(query.to_string());
    }

    pub fn forecast_queries(&self) -> Vec<String> {
        self.forecast_calls.lock().iter().map(|(q, _)| q.clone()).collect()
    }

    fn name_for(&self, query: &str) -> String {
        self.names.lock().get(query).cloned().unwrap_or_else(|| query.to_string())
    }
}

#[async_trait]
impl WeatherProvider for FakeProvider {
    async fn fetch_forecast(&self, query: &str, days: u8) -> Result<WeatherDocument, RemoteError> {
        self.forecast_calls.lock().push((query.to_string(), days));
        if self.fail_forecast.load(Ordering::SeqCst) {
            return Err(remote_failure());
        }
        Ok(document(&self.name_for(query)))
    }

    async fn search(&self, query: &str) -> Result<Vec<LocationSuggestion>, RemoteError> {
        self.search_calls.lock().push(query.to_string());
        let delay = self.search_delays.lock().get(query).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_search.load(Ordering::SeqCst) || self.failing_searches.lock().contains(query) {
            return Err(remote_failure());
        }
        if let Some(results) = self.search_results_for.lock().get(query) {
            return Ok(results.clone());
        }
        Ok(self.search_results.lock().clone())
    }

    async fn fetch_current(&self, query: &str) -> Result<WeatherDocument, RemoteError> {
        self.current_calls.lock().push(query.to_string());
        if self.fail_current.load(Ordering::SeqCst) {
            return Err(remote_failure());
        }
        let mut doc = document(&self.name_for(query));
        doc.forecast.days.clear();
        Ok(doc)
    }
}

/// Wraps an in-memory SQLite store, recording mutations and optionally failing writes.
pub struct RecordingStore {
    inner: SqliteCacheStore,
    pub ops: Mutex<Vec<String>>,
    pub fail_writes: AtomicBool,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: SqliteCacheStore::in_memory().expect("in-memory store"),
            ops: Mutex::new(Vec::new()),
            fail_writes: AtomicBool::new(false),
        })
    }

    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().clone()
    }

    pub fn current_key(&self) -> Option<String> {
        self.inner.read_current().borrow().as_ref().map(|s| s.location_key.clone())
    }
}

#[async_trait]
impl CacheStore for RecordingStore {
    fn read_current(&self) -> watch::Receiver<Option<WeatherSnapshot>> {
        self.inner.read_current()
    }

    async fn read_by_key(&self, location_key: &str) -> Result<Option<WeatherSnapshot>, StorageError> {
        self.inner.read_by_key(location_key).await
    }

    async fn write(&self, snapshot: &WeatherSnapshot) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other("disk full")));
        }
        self.ops.lock().push(format!(
            "write {} current={}",
            snapshot.location_key, snapshot.is_current_location
        ));
        self.inner.write(snapshot).await
    }

    async fn clear_current_flag(&self) -> Result<(), StorageError> {
        self.ops.lock().push("clear_current_flag".into());
        self.inner.clear_current_flag().await
    }

    async fn delete_older_than(&self, epoch_millis: i64) -> Result<usize, StorageError> {
        self.inner.delete_older_than(epoch_millis).await
    }

    async fn delete(&self, location_key: &str) -> Result<(), StorageError> {
        self.inner.delete(location_key).await
    }

    async fn count(&self) -> Result<usize, StorageError> {
        self.inner.count().await
    }
}

/// Sets its flag when dropped along with the update stream.
struct Registration(Arc<AtomicBool>);

impl Drop for Registration {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

pub enum LastKnown {
    Fix(LocationFix),
    Absent,
    Fails(LocationError),
    Hangs,
}

/// Location provider driven by the test through a channel.
pub struct ScriptedLocation {
    last_known: Mutex<LastKnown>,
    updates: Mutex<Option<mpsc::UnboundedReceiver<Result<LocationFix, LocationError>>>>,
    pub started: Arc<AtomicBool>,
    pub released: Arc<AtomicBool>,
}

impl ScriptedLocation {
    pub fn new(last_known: LastKnown) -> (Arc<Self>, mpsc::UnboundedSender<Result<LocationFix, LocationError>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let provider = Arc::new(Self {
            last_known: Mutex::new(last_known),
            updates: Mutex::new(Some(rx)),
            started: Arc::new(AtomicBool::new(false)),
            released: Arc::new(AtomicBool::new(false)),
        });
        (provider, tx)
    }
}

#[async_trait]
impl LocationProvider for ScriptedLocation {
    async fn last_known_location(&self) -> Result<Option<LocationFix>, LocationError> {
        let outcome = match &*self.last_known.lock() {
            LastKnown::Fix(fix) => Some(Ok(Some(*fix))),
            LastKnown::Absent => Some(Ok(None)),
            LastKnown::Fails(e) => Some(Err(e.clone())),
            LastKnown::Hangs => None,
        };
        match outcome {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }

    fn location_updates(&self) -> Result<LocationUpdates, LocationError> {
        let rx = self
            .updates
            .lock()
            .take()
            .ok_or_else(|| LocationError::Provider("updates already started".into()))?;
        self.started.store(true, Ordering::SeqCst);
        let guard = Registration(Arc::clone(&self.released));

        Ok(stream::unfold((rx, guard), |(mut rx, guard)| async move {
            let item = rx.recv().await?;
            Some((item, (rx, guard)))
        })
        .boxed())
    }
}

/// Wait until `rx` satisfies `pred`, failing the test after a few seconds.
pub async fn wait_for<T: Clone>(rx: &mut watch::Receiver<T>, pred: impl FnMut(&T) -> bool) -> T {
    let value = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
        .await
        .expect("timed out waiting for state")
        .expect("state sender dropped");
    value.clone()
}

/// Poll `cond` until it holds, failing the test after a few seconds.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
