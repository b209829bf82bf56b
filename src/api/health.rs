//! Liveness/readiness endpoint.

use actix_web::{HttpResponse, web};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::types::success_response;
use crate::storage::SeaOrmStorage;

/// Recorded once at startup, shared as app data.
#[derive(Debug, Clone)]
pub struct AppStartTime {
    pub start_datetime: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub uptime_secs: i64,
}

pub async fn health(
    storage: web::Data<SeaOrmStorage>,
    start_time: web::Data<AppStartTime>,
) -> HttpResponse {
    let database_up = storage.ping().await.is_ok();

    success_response(HealthResponse {
        status: if database_up { "ok" } else { "degraded" },
        database: if database_up { "up" } else { "down" },
        uptime_secs: (Utc::now() - start_time.start_datetime).num_seconds(),
    })
}
