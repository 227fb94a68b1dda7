//! Reverse geocoding with region-routed providers.
//!
//! A coordinate inside the domestic bounding box goes to the AMap (Gaode)
//! regeo API, everything else to the Google Maps geocoding API — the two
//! services have very different coverage inside and outside that region.
//! Both normalize into the same [`PlaceDescription`] shape; field
//! availability varies by provider and absent fields are simply omitted.
//!
//! Provider errors are retried a bounded number of times with a fixed delay.
//! A missing credential for the routed provider is a configuration failure
//! and is not retried. After exhausting retries the last error is surfaced —
//! this call never quietly returns a partially-filled structure.

mod amap;
mod google;

pub use amap::AmapProvider;
pub use google::GoogleProvider;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::GeocodingConfig;
use crate::error::EnrichError;

/// Network timeout for a single geocoding request.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// A coordinate is "domestic" when it falls inside this fixed bounding box
/// (mainland China, approximately).
pub fn is_domestic(latitude: f64, longitude: f64) -> bool {
    (18.0..=54.0).contains(&latitude) && (73.0..=135.0).contains(&longitude)
}

/// A structured place description, normalized across providers.
///
/// All fields are optional; absence means "not returned by the provider",
/// not an error.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceDescription {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted_address: Option<String>,
    /// Up to 3 nearby named points of interest.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pois: Option<Vec<String>>,
}

/// A reverse-geocoding backend.
#[async_trait::async_trait]
pub trait GeoProvider: Send + Sync {
    /// The display name of this provider (e.g., "AMap", "Google").
    fn name(&self) -> &str;
    /// Resolve one coordinate into a place description.
    async fn reverse(&self, latitude: f64, longitude: f64) -> anyhow::Result<PlaceDescription>;
}

/// Region-routing resolver with retry.
pub struct GeoResolver {
    config: GeocodingConfig,
}

impl GeoResolver {
    pub fn new(config: GeocodingConfig) -> Self {
        Self { config }
    }

    /// Resolve a coordinate, selecting the provider by region and retrying
    /// transient failures per the configured policy.
    pub async fn resolve(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<PlaceDescription, EnrichError> {
        let provider = self.provider_for(latitude, longitude)?;
        reverse_geocode(
            provider.as_ref(),
            latitude,
            longitude,
            self.config.retries,
            Duration::from_millis(self.config.retry_delay_ms),
        )
        .await
    }

    fn provider_for(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Box<dyn GeoProvider>, EnrichError> {
        if is_domestic(latitude, longitude) {
            if self.config.amap_key.is_empty() {
                return Err(EnrichError::MissingCredential {
                    provider: "domestic",
                });
            }
            Ok(Box::new(AmapProvider::new(self.config.amap_key.clone())))
        } else {
            if self.config.google_key.is_empty() {
                return Err(EnrichError::MissingCredential {
                    provider: "international",
                });
            }
            Ok(Box::new(GoogleProvider::new(
                self.config.google_key.clone(),
            )))
        }
    }
}

/// Call a provider with a bounded retry loop and fixed delay between
/// attempts. Exhaustion surfaces the last error.
pub async fn reverse_geocode(
    provider: &dyn GeoProvider,
    latitude: f64,
    longitude: f64,
    retries: u32,
    delay: Duration,
) -> Result<PlaceDescription, EnrichError> {
    let attempts = retries.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match provider.reverse(latitude, longitude).await {
            Ok(place) => return Ok(place),
            Err(e) => {
                last_error = e.to_string();
                log::warn!(
                    "{} reverse geocoding attempt {attempt}/{attempts} failed: {last_error}",
                    provider.name()
                );
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(EnrichError::GeocodingExhausted {
        attempts,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    // ── is_domestic ──────────────────────────────────────────────────

    #[test]
    fn beijing_is_domestic() {
        assert!(is_domestic(39.9, 116.4));
    }

    #[test]
    fn paris_is_international() {
        assert!(!is_domestic(48.85, 2.35));
    }

    #[test]
    fn bounding_box_edges_are_inclusive() {
        assert!(is_domestic(18.0, 73.0));
        assert!(is_domestic(54.0, 135.0));
        assert!(!is_domestic(17.99, 100.0));
        assert!(!is_domestic(30.0, 135.01));
    }

    // ── retry loop ───────────────────────────────────────────────────

    /// Fails a configurable number of times, then succeeds.
    struct FlakyProvider {
        calls: AtomicU32,
        failures_before_success: u32,
    }

    impl FlakyProvider {
        fn new(failures_before_success: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures_before_success,
            }
        }
    }

    #[async_trait::async_trait]
    impl GeoProvider for FlakyProvider {
        fn name(&self) -> &str {
            "Flaky"
        }

        async fn reverse(&self, _lat: f64, _lon: f64) -> anyhow::Result<PlaceDescription> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                anyhow::bail!("simulated provider outage");
            }
            Ok(PlaceDescription {
                city: Some("Springfield".into()),
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn third_attempt_success_is_returned() {
        let provider = FlakyProvider::new(2);
        let place = reverse_geocode(&provider, 48.85, 2.35, 3, Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(place.city.as_deref(), Some("Springfield"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_last_error() {
        let provider = FlakyProvider::new(u32::MAX);
        let err = reverse_geocode(&provider, 48.85, 2.35, 3, Duration::from_millis(1))
            .await
            .unwrap_err();

        match err {
            EnrichError::GeocodingExhausted {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("simulated provider outage"));
            }
            other => panic!("expected GeocodingExhausted, got {other:?}"),
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn zero_retries_still_attempts_once() {
        let provider = FlakyProvider::new(0);
        let place = reverse_geocode(&provider, 48.85, 2.35, 0, Duration::from_millis(1))
            .await
            .unwrap();
        assert!(place.city.is_some());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    // ── credential routing ───────────────────────────────────────────

    fn keyless_resolver() -> GeoResolver {
        GeoResolver::new(GeocodingConfig {
            amap_key: String::new(),
            google_key: String::new(),
            retries: 3,
            retry_delay_ms: 1,
        })
    }

    #[tokio::test]
    async fn missing_domestic_credential_is_config_failure() {
        let err = keyless_resolver().resolve(39.9, 116.4).await.unwrap_err();
        assert!(matches!(
            err,
            EnrichError::MissingCredential {
                provider: "domestic"
            }
        ));
    }

    #[tokio::test]
    async fn missing_international_credential_is_config_failure() {
        let err = keyless_resolver().resolve(48.85, 2.35).await.unwrap_err();
        assert!(matches!(
            err,
            EnrichError::MissingCredential {
                provider: "international"
            }
        ));
    }
}
