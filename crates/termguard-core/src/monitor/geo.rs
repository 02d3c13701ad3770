//! Best-effort session origin geolocation.
//!
//! Lookup failures of any kind degrade to `None`; the session alert still
//! goes out without a location.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const GEO_TIMEOUT: Duration = Duration::from_secs(3);

#[async_trait]
pub trait GeoResolver: Send + Sync {
    /// Resolve `host` to a human-readable location, if possible.
    async fn locate(&self, host: &str) -> Option<String>;
}

/// ip-api.com backed resolver.
pub struct IpApiResolver {
    client: Client,
}

impl Default for IpApiResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl IpApiResolver {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeoResponse {
    status: String,
    country: Option<String>,
    city: Option<String>,
}

#[async_trait]
impl GeoResolver for IpApiResolver {
    async fn locate(&self, host: &str) -> Option<String> {
        let url = format!("http://ip-api.com/json/{host}?fields=status,country,city");
        let response = self
            .client
            .get(&url)
            .timeout(GEO_TIMEOUT)
            .send()
            .await
            .ok()?;

        let body: GeoResponse = response.json().await.ok()?;
        if body.status != "success" {
            debug!("Geolocation lookup failed for {}", host);
            return None;
        }

        match (body.city, body.country) {
            (Some(city), Some(country)) => Some(format!("{city}, {country}")),
            (None, Some(country)) => Some(country),
            _ => None,
        }
    }
}

/// Resolver that never finds anything.
#[cfg(any(test, feature = "test-utils"))]
pub struct NoGeoResolver;

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl GeoResolver for NoGeoResolver {
    async fn locate(&self, _host: &str) -> Option<String> {
        None
    }
}
