use crate::{
    Config,
    error::RemoteError,
    model::{LocationSuggestion, WeatherDocument},
    provider::weatherapi::WeatherApiProvider,
};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod weatherapi;

/// Remote weather source.
///
/// `query` is either a place name or a `"lat,lon"` pair. Implementations hold
/// their own credential; nothing here caches or retries.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// Current conditions plus a `days`-day forecast.
    async fn fetch_forecast(&self, query: &str, days: u8) -> Result<WeatherDocument, RemoteError>;

    /// Location autocomplete. An empty result is not an error.
    async fn search(&self, query: &str) -> Result<Vec<LocationSuggestion>, RemoteError>;

    /// Current conditions only. Used to resolve a place name from coordinates.
    async fn fetch_current(&self, query: &str) -> Result<WeatherDocument, RemoteError>;
}

/// Construct the weatherapi.com provider from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let api_key = config.require_api_key()?;

    let provider = WeatherApiProvider::new(
        api_key.to_owned(),
        &config.base_url,
        config.request_timeout(),
    )?;

    Ok(Box::new(provider))
}
