//! Enrichment pipeline: geography from the source address, device/browser/
//! OS from the client descriptor.
//!
//! Strictly best-effort. Any internal failure (unreachable geo service,
//! unparseable address, timeout) collapses to default values; enrichment
//! never aborts ingestion and never holds a lock across the network call.

pub mod device;
pub mod geoip;

use std::time::Duration;

use tracing::{debug, warn};

use crate::config::EnrichConfig;
use crate::utils::ip::is_private_or_local;

pub use device::{DeviceClass, DeviceResult, parse_device};
pub use geoip::{GeoInfo, GeoIpLookup, GeoIpProvider};

pub const UNKNOWN_COUNTRY: &str = "Unknown";

/// Resolved geography. `country` is always present; `"Unknown"` stands in
/// for every failure mode.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoResult {
    pub country: String,
    pub region: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Default for GeoResult {
    fn default() -> Self {
        Self {
            country: UNKNOWN_COUNTRY.to_string(),
            region: None,
            city: None,
            latitude: None,
            longitude: None,
        }
    }
}

impl From<GeoInfo> for GeoResult {
    fn from(info: GeoInfo) -> Self {
        Self {
            country: info
                .country
                .unwrap_or_else(|| UNKNOWN_COUNTRY.to_string()),
            region: info.region,
            city: info.city,
            latitude: info.latitude,
            longitude: info.longitude,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Enrichment {
    pub geo: GeoResult,
    pub device: Option<DeviceResult>,
}

pub struct EnrichmentPipeline {
    geo: Option<GeoIpProvider>,
    timeout: Duration,
}

impl EnrichmentPipeline {
    pub fn new(config: &EnrichConfig) -> Self {
        let geo = config
            .geo_lookup_enabled
            .then(|| GeoIpProvider::new(config));
        Self {
            geo,
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    /// Pipeline with an explicit provider (tests inject mock lookups here).
    pub fn with_provider(provider: GeoIpProvider, timeout: Duration) -> Self {
        Self {
            geo: Some(provider),
            timeout,
        }
    }

    /// Pipeline with geo lookup off entirely; device parsing still runs.
    pub fn disabled() -> Self {
        Self {
            geo: None,
            timeout: Duration::from_millis(0),
        }
    }

    /// Resolve geography and device data for one event.
    ///
    /// The geo lookup is bounded by the configured timeout so a slow
    /// upstream cannot visibly delay the caller's redirect.
    pub async fn enrich(
        &self,
        source_addr: Option<&str>,
        client_descriptor: Option<&str>,
    ) -> Enrichment {
        let device = client_descriptor
            .filter(|d| !d.is_empty())
            .map(parse_device);

        let geo = self.resolve_geo(source_addr).await;

        Enrichment { geo, device }
    }

    async fn resolve_geo(&self, source_addr: Option<&str>) -> GeoResult {
        let Some(ref provider) = self.geo else {
            return GeoResult::default();
        };
        let Some(addr) = source_addr else {
            return GeoResult::default();
        };

        let Ok(parsed) = addr.parse::<std::net::IpAddr>() else {
            debug!("Geo enrichment skipped, unparseable address: {}", addr);
            return GeoResult::default();
        };
        if is_private_or_local(&parsed) {
            return GeoResult::default();
        }

        match tokio::time::timeout(self.timeout, provider.lookup(addr)).await {
            Ok(Some(info)) => GeoResult::from(info),
            Ok(None) => {
                debug!("Geo lookup for {} returned no result", addr);
                GeoResult::default()
            }
            Err(_) => {
                warn!(
                    "Geo lookup for {} exceeded {}ms, using Unknown",
                    addr,
                    self.timeout.as_millis()
                );
                GeoResult::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct FixedLookup(GeoInfo);

    #[async_trait]
    impl GeoIpLookup for FixedLookup {
        async fn lookup(&self, _ip: &str) -> Option<GeoInfo> {
            Some(self.0.clone())
        }

        fn name(&self) -> &'static str {
            "Fixed"
        }
    }

    struct FailingLookup;

    #[async_trait]
    impl GeoIpLookup for FailingLookup {
        async fn lookup(&self, _ip: &str) -> Option<GeoInfo> {
            None
        }

        fn name(&self) -> &'static str {
            "Failing"
        }
    }

    struct SlowLookup;

    #[async_trait]
    impl GeoIpLookup for SlowLookup {
        async fn lookup(&self, _ip: &str) -> Option<GeoInfo> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Some(GeoInfo::default())
        }

        fn name(&self) -> &'static str {
            "Slow"
        }
    }

    fn pipeline_with(lookup: Arc<dyn GeoIpLookup>) -> EnrichmentPipeline {
        EnrichmentPipeline::with_provider(
            GeoIpProvider::from_lookup(lookup),
            Duration::from_millis(50),
        )
    }

    #[tokio::test]
    async fn test_successful_lookup_maps_fields() {
        let pipeline = pipeline_with(Arc::new(FixedLookup(GeoInfo {
            country: Some("DE".to_string()),
            region: Some("Berlin".to_string()),
            city: Some("Berlin".to_string()),
            latitude: Some(52.52),
            longitude: Some(13.405),
        })));

        let enrichment = pipeline.enrich(Some("93.184.216.34"), None).await;
        assert_eq!(enrichment.geo.country, "DE");
        assert_eq!(enrichment.geo.city.as_deref(), Some("Berlin"));
        assert_eq!(enrichment.geo.latitude, Some(52.52));
    }

    #[tokio::test]
    async fn test_failed_lookup_degrades_to_unknown() {
        let pipeline = pipeline_with(Arc::new(FailingLookup));
        let enrichment = pipeline.enrich(Some("93.184.216.34"), None).await;
        assert_eq!(enrichment.geo.country, UNKNOWN_COUNTRY);
    }

    #[tokio::test]
    async fn test_slow_lookup_times_out_to_unknown() {
        let pipeline = pipeline_with(Arc::new(SlowLookup));
        let enrichment = pipeline.enrich(Some("93.184.216.34"), None).await;
        assert_eq!(enrichment.geo.country, UNKNOWN_COUNTRY);
    }

    #[tokio::test]
    async fn test_private_address_is_not_looked_up() {
        let pipeline = pipeline_with(Arc::new(FixedLookup(GeoInfo {
            country: Some("XX".to_string()),
            ..Default::default()
        })));
        let enrichment = pipeline.enrich(Some("192.168.1.10"), None).await;
        assert_eq!(enrichment.geo.country, UNKNOWN_COUNTRY);
    }

    #[tokio::test]
    async fn test_device_parsing_runs_without_geo() {
        let pipeline = EnrichmentPipeline::disabled();
        let enrichment = pipeline
            .enrich(
                None,
                Some("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1"),
            )
            .await;
        let device = enrichment.device.expect("device parsed");
        assert_eq!(device.device_class, DeviceClass::Mobile);
        assert_eq!(enrichment.geo.country, UNKNOWN_COUNTRY);
    }
}
