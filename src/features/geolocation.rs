use crate::features::error::GeolocationError;
use crate::structs::GeoFix;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Options handed to the platform for a single fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Oldest cached fix the platform may return. Zero forces a fresh reading.
    pub maximum_age: Duration,
}

/// A reading as reported by the platform, before validation.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct RawPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
}

/// Platform location access.
#[async_trait]
pub trait GeolocationProvider: Send + Sync {
    async fn current_position(&self, options: &PositionOptions) -> Result<RawPosition, GeolocationError>;
}

/// Performs one-shot fixes with a bounded wait. Never retries on its own.
#[derive(Clone)]
pub struct GeolocationAcquirer {
    provider: Arc<dyn GeolocationProvider>,
}

impl GeolocationAcquirer {
    pub fn new(provider: Arc<dyn GeolocationProvider>) -> Self {
        Self { provider }
    }

    /// Requests a fresh fix, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// * [`GeolocationError::Timeout`] when the platform does not answer in time.
    /// * [`GeolocationError::PositionUnavailable`] when the reading has non-finite or
    ///   out-of-range values, or the platform cannot produce one.
    /// * [`GeolocationError::PermissionDenied`] as reported by the platform.
    pub async fn acquire(
        &self,
        timeout: Duration,
        high_accuracy: bool,
    ) -> Result<GeoFix, GeolocationError> {
        let options = PositionOptions {
            high_accuracy,
            timeout,
            maximum_age: Duration::ZERO,
        };
        let raw = tokio::time::timeout(timeout, self.provider.current_position(&options))
            .await
            .map_err(|_| GeolocationError::Timeout)
            .and_then(|result| result)
            .inspect_err(|e| warn!(error = %e, "Location fix failed"))?;

        let Some(fix) = GeoFix::new(raw.latitude, raw.longitude, raw.accuracy) else {
            warn!(?raw, "Discarding invalid location reading");
            return Err(GeolocationError::PositionUnavailable);
        };
        info!(
            latitude = fix.latitude(),
            longitude = fix.longitude(),
            accuracy = fix.accuracy_meters(),
            "Location fix acquired"
        );
        Ok(fix)
    }
}
