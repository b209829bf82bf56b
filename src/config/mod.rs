//! Application configuration.
//!
//! Layered sources: built-in defaults, then an optional `linkpulse.toml`
//! next to the binary, then `LINKPULSE_*` environment variables (with `__`
//! separating sections, e.g. `LINKPULSE_SERVER__PORT=9000`). The merged
//! result lives in a process-wide `OnceLock` behind [`get_config`].

use std::sync::OnceLock;

use serde::Deserialize;
use tracing::warn;

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub ingest: IngestConfig,
    pub enrich: EnrichConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://linkpulse.db?mode=rwc".to_string(),
            pool_size: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// EnvFilter directive, e.g. `info` or `linkpulse=debug,sea_orm=warn`.
    pub level: String,
    /// Log file path; empty or unset means stdout.
    pub file: Option<String>,
    /// `plain` or `json`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            format: "plain".to_string(),
        }
    }
}

/// Abuse-control budgets for the ingestion endpoints.
///
/// These are per call-site values, not hard constants; other collaborators
/// (login, registration) run their own budgets against the same limiter
/// primitive.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub rate_limit_max_attempts: u32,
    pub rate_limit_window_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            rate_limit_max_attempts: 10,
            rate_limit_window_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    /// Geo lookup toggle; device parsing is always on (pure, no I/O).
    pub geo_lookup_enabled: bool,
    /// External geo API template, `{ip}` is substituted.
    pub geoip_api_url: String,
    /// Optional MaxMind GeoLite2-City database; preferred over the API.
    pub maxminddb_path: Option<String>,
    /// Upper bound on how long an ingest call waits for geo resolution.
    pub timeout_ms: u64,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            geo_lookup_enabled: true,
            geoip_api_url:
                "http://ip-api.com/json/{ip}?fields=status,countryCode,country,regionName,city,lat,lon"
                    .to_string(),
            maxminddb_path: None,
            timeout_ms: 800,
        }
    }
}

impl AppConfig {
    fn load() -> Self {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("linkpulse").required(false))
            .add_source(
                config::Environment::with_prefix("LINKPULSE")
                    .separator("__")
                    .try_parsing(true),
            );

        match builder.build().and_then(|c| c.try_deserialize()) {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load configuration, using defaults: {}", e);
                AppConfig::default()
            }
        }
    }
}

/// Initialize the global configuration. Safe to call more than once; the
/// first call wins.
pub fn init_config() {
    let _ = CONFIG.set(AppConfig::load());
}

pub fn get_config() -> &'static AppConfig {
    CONFIG.get_or_init(AppConfig::load)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.ingest.rate_limit_max_attempts, 10);
        assert_eq!(config.ingest.rate_limit_window_secs, 60);
        assert!(config.enrich.geoip_api_url.contains("{ip}"));
    }

    #[test]
    fn test_get_config_is_idempotent() {
        init_config();
        let a = get_config() as *const AppConfig;
        init_config();
        let b = get_config() as *const AppConfig;
        assert_eq!(a, b);
    }
}
