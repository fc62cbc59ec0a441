//! Device location contract.

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use std::time::Duration;

use crate::{error::LocationError, model::LocationFix};

/// Continuous location fixes. Dropping the stream releases the underlying
/// provider registration.
pub type LocationUpdates = BoxStream<'static, Result<LocationFix, LocationError>>;

#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// One-shot position lookup. `Ok(None)` means no fix is available yet.
    async fn last_known_location(&self) -> Result<Option<LocationFix>, LocationError>;

    /// Start continuous updates. The returned stream is not restartable.
    fn location_updates(&self) -> Result<LocationUpdates, LocationError>;
}

pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(10);

/// Reports a fixed coordinate, re-emitting it on an interval.
///
/// Stands in for a positioning service on hosts that have none.
#[derive(Debug, Clone)]
pub struct FixedLocationProvider {
    latitude: f64,
    longitude: f64,
    interval: Duration,
}

impl FixedLocationProvider {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude, interval: DEFAULT_UPDATE_INTERVAL }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

#[async_trait]
impl LocationProvider for FixedLocationProvider {
    async fn last_known_location(&self) -> Result<Option<LocationFix>, LocationError> {
        Ok(Some(LocationFix::new(self.latitude, self.longitude)))
    }

    fn location_updates(&self) -> Result<LocationUpdates, LocationError> {
        if self.interval.is_zero() {
            return Err(LocationError::Provider("update interval must be non-zero".into()));
        }

        let (lat, lon) = (self.latitude, self.longitude);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let updates = stream::unfold(ticker, move |mut ticker| async move {
            ticker.tick().await;
            Some((Ok(LocationFix::new(lat, lon)), ticker))
        });
        Ok(updates.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_provider_reports_its_coordinate() {
        let provider = FixedLocationProvider::new(51.5, -0.12);
        let fix = provider.last_known_location().await.unwrap().unwrap();
        assert_eq!(fix.coordinate_query(), "51.5,-0.12");
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_provider_emits_on_interval() {
        let provider = FixedLocationProvider::new(1.0, 2.0).with_interval(Duration::from_secs(10));
        let mut updates = provider.location_updates().unwrap();

        let first = updates.next().await.unwrap().unwrap();
        let second = updates.next().await.unwrap().unwrap();
        assert_eq!((first.latitude, first.longitude), (1.0, 2.0));
        assert_eq!((second.latitude, second.longitude), (1.0, 2.0));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let provider = FixedLocationProvider::new(1.0, 2.0).with_interval(Duration::ZERO);
        assert!(provider.location_updates().is_err());
    }
}
