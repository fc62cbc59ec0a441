use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::{
    error::RemoteError,
    model::{LocationSuggestion, WeatherDocument},
};

use super::WeatherProvider;

/// weatherapi.com client.
#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    api_key: String,
    base_url: Url,
    http: Client,
}

impl WeatherApiProvider {
    /// `base_url` is normally [`crate::config::DEFAULT_BASE_URL`]; tests point
    /// it at a mock server. Every request is bounded by `timeout`.
    pub fn new(api_key: String, base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| RemoteError::Client(format!("Invalid base URL '{base_url}': {e}")))?;

        // Url::join drops the last path segment unless it ends with '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self { api_key, base_url, http })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T, RemoteError> {
        let url = self
            .base_url
            .join(endpoint)
            .map_err(|e| RemoteError::Client(format!("Invalid endpoint '{endpoint}': {e}")))?;

        tracing::debug!(endpoint, "Sending WeatherAPI request");

        let res = self
            .http
            .get(url)
            .query(&[("key", self.api_key.as_str())])
            .query(params)
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            tracing::warn!(endpoint, %status, "WeatherAPI request failed");
            return Err(RemoteError::Status { status: status.as_u16(), body: truncate_body(&body) });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl WeatherProvider for WeatherApiProvider {
    async fn fetch_forecast(&self, query: &str, days: u8) -> Result<WeatherDocument, RemoteError> {
        let days = days.to_string();
        self.get_json("v1/forecast.json", &[("q", query), ("days", &days), ("aqi", "no")])
            .await
    }

    async fn search(&self, query: &str) -> Result<Vec<LocationSuggestion>, RemoteError> {
        self.get_json("v1/search.json", &[("q", query)]).await
    }

    async fn fetch_current(&self, query: &str) -> Result<WeatherDocument, RemoteError> {
        self.get_json("v1/current.json", &[("q", query)]).await
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
