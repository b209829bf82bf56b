//! HTTP server assembly and startup.

use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware::Compress, web};
use anyhow::Result;
use tracing::warn;

use crate::api::{self, AppStartTime};
use crate::config::get_config;
use crate::enrich::EnrichmentPipeline;
use crate::ingest::IngestService;
use crate::ratelimit::SlidingWindowLimiter;
use crate::reader::ReconciliationReader;
use crate::storage::SeaOrmStorage;

const SWEEP_INTERVAL_SECS: u64 = 60;

/// Build all services and run the HTTP server until it exits.
///
/// Logging must already be initialized.
pub async fn run_server() -> Result<()> {
    let config = get_config();
    let app_start_time = AppStartTime {
        start_datetime: chrono::Utc::now(),
    };

    let storage = SeaOrmStorage::new(&config.database.url).await?;

    let limiter = Arc::new(SlidingWindowLimiter::new());
    tokio::spawn(
        Arc::clone(&limiter).run_sweeper(Duration::from_secs(SWEEP_INTERVAL_SECS)),
    );

    let enrichment = EnrichmentPipeline::new(&config.enrich);
    let ingest = web::Data::new(IngestService::new(
        storage.clone(),
        Arc::clone(&limiter),
        enrichment,
        &config.ingest,
    ));
    let reader = web::Data::new(ReconciliationReader::new(storage.clone()));
    let storage_data = web::Data::new(storage);
    let start_data = web::Data::new(app_start_time);

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    warn!("Starting server at http://{}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::default())
            .wrap(Compress::default())
            .app_data(ingest.clone())
            .app_data(reader.clone())
            .app_data(storage_data.clone())
            .app_data(start_data.clone())
            .app_data(web::PayloadConfig::new(64 * 1024))
            .service(api::event_routes())
            .configure(api::configure_root)
    })
    .keep_alive(Duration::from_secs(30))
    .client_request_timeout(Duration::from_millis(5000))
    .bind(&bind_address)?
    .run()
    .await?;

    Ok(())
}
