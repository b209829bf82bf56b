//! GeoIP lookup: MaxMind GeoLite2 local database with external API
//! (ip-api.com) fallback.

mod external_api;
mod maxmind;
mod provider;

pub use external_api::ExternalApiProvider;
pub use provider::{GeoInfo, GeoIpLookup, GeoIpProvider};
