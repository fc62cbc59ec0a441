//! Error taxonomy shared by the weather core.
//!
//! Each error exposes a `user_message()` that the state controller publishes on
//! its `error` channel; `Display` keeps the detailed form for logs.

use thiserror::Error;

/// Failures from the device location provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocationError {
    #[error("Missing location permissions")]
    PermissionDenied,

    #[error("Location services are disabled")]
    Disabled,

    #[error("Location request timed out")]
    Timeout,

    #[error("Location provider error: {0}")]
    Provider(String),
}

impl LocationError {
    pub fn user_message(&self) -> String {
        format!("Unable to get location: {self}")
    }
}

/// Failures talking to the remote weather API.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Weather API request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse weather API response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Weather API client error: {0}")]
    Client(String),
}

impl RemoteError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Http(e) if e.is_timeout() => {
                "The weather service did not respond in time.".to_string()
            }
            Self::Http(_) => "Network error. Check your connection.".to_string(),
            Self::Status { status: 400, .. } => "No matching location found.".to_string(),
            Self::Status { status: 401 | 403, .. } => {
                "The weather API key was rejected.".to_string()
            }
            Self::Status { status, .. } => format!("Weather service error (HTTP {status})."),
            Self::Parse(_) => "Unexpected response from the weather service.".to_string(),
            Self::Client(msg) => format!("Weather client error: {msg}"),
        }
    }
}

/// Failures in the local snapshot cache.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Cache database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize weather payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StorageError {
    pub fn user_message(&self) -> String {
        format!("Weather was fetched but could not be cached: {self}")
    }
}

/// Failures surfaced on the synchronizer's read path.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Cached payload for '{location_key}' is not a valid weather document: {source}")]
    CorruptPayload {
        location_key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SyncError {
    pub fn user_message(&self) -> String {
        match self {
            Self::CorruptPayload { location_key, .. } => {
                format!("Cached weather for {location_key} is unreadable")
            }
            Self::Storage(e) => format!("Local cache error: {e}"),
        }
    }
}
