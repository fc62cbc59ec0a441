//! Core library for the `weather` app.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The weatherapi.com remote source
//! - A SQLite snapshot cache with a live current-location view
//! - The synchronizer tying fetches to the cache
//! - Location throttling and the application state controller
//!
//! It is used by `weather-cli`, but can also be reused by other front ends.

pub mod cache;
pub mod config;
pub mod controller;
pub mod error;
pub mod location;
pub mod model;
pub mod provider;
pub mod state;
pub mod sync;
pub mod throttle;

pub use cache::{CacheStore, SqliteCacheStore};
pub use config::Config;
pub use controller::{ControllerSettings, WeatherController, WeatherState};
pub use error::{LocationError, RemoteError, StorageError, SyncError};
pub use location::{FixedLocationProvider, LocationProvider, LocationUpdates};
pub use model::{LocationFix, LocationSuggestion, WeatherDocument, WeatherSnapshot};
pub use provider::{WeatherProvider, provider_from_config};
pub use state::StateCell;
pub use sync::{FetchOutcome, SyncSettings, WeatherSynchronizer};
pub use throttle::LocationThrottle;
