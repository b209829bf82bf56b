//! Local GeoLite2-City database lookup.
//!
//! Decodes the whole City record: country and subdivision feed the
//! dashboard breakdowns, coordinates feed the visitors table. Everything
//! stays optional; a Country-tier database simply yields fewer fields.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use maxminddb::{Reader, geoip2};
use tracing::trace;

use super::provider::{GeoInfo, GeoIpLookup};

pub struct MaxMindProvider {
    db: Arc<Reader<Vec<u8>>>,
}

impl MaxMindProvider {
    pub fn new(path: &str) -> Result<Self, maxminddb::MaxMindDbError> {
        Ok(Self {
            db: Arc::new(Reader::open_readfile(path)?),
        })
    }

    fn resolve(&self, addr: IpAddr) -> Option<GeoInfo> {
        let result = self.db.lookup(addr).ok()?;
        let record: geoip2::City = result.decode().ok()??;

        // Most-specific subdivision first; GeoLite2 orders them
        // country-outward, so the first entry is the state/province.
        let region = record
            .subdivisions
            .into_iter()
            .next()
            .and_then(|s| s.names.english.map(|n| n.to_string()));

        Some(GeoInfo {
            country: record.country.iso_code.map(String::from),
            region,
            city: record.city.names.english.map(|n| n.to_string()),
            latitude: record.location.latitude,
            longitude: record.location.longitude,
        })
    }
}

#[async_trait]
impl GeoIpLookup for MaxMindProvider {
    async fn lookup(&self, ip: &str) -> Option<GeoInfo> {
        let addr: IpAddr = ip.parse().ok()?;
        let info = self.resolve(addr);
        trace!("MaxMind lookup for {}: {:?}", ip, info);
        info
    }

    fn name(&self) -> &'static str {
        "MaxMind"
    }
}
