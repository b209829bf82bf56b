//! HTTP surface: ingestion endpoints, dashboard reads, health probe.

pub mod events;
pub mod health;
pub mod stats;
pub mod types;

use actix_web::web;

pub use health::AppStartTime;

/// `POST /events/view`, `POST /events/click`.
pub fn event_routes() -> actix_web::Scope {
    web::scope("/events")
        .route("/view", web::post().to(events::record_view))
        .route("/click", web::post().to(events::record_click))
}

/// Dashboard read endpoints and the health probe at the root scope.
pub fn configure_root(cfg: &mut web::ServiceConfig) {
    cfg.route("/aggregate", web::get().to(stats::get_aggregate))
        .route("/visitors", web::get().to(stats::get_visitors))
        .route("/health", web::get().to(health::health));
}
