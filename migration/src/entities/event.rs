//! Event entity: one ingested view/click interaction, enriched and durably
//! logged. The table is append-only; rows are never updated or deleted by
//! the engine.
//!
//! `dedup_key` carries a UNIQUE index. It is populated only for the first
//! (counted) event of a `(kind, subject, session_token)` triple; duplicate
//! submissions are stored with `is_duplicate = true` and a NULL key.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub link_id: String,
    pub destination_id: Option<String>,
    /// Owning user, copied from the link at ingestion time.
    pub user_id: String,
    /// `view` or `click`.
    pub kind: String,
    pub occurred_at: DateTimeUtc,
    pub ip_address: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub client_descriptor: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub referrer: Option<String>,
    /// Resolved country; `"Unknown"` when enrichment degraded.
    pub country: String,
    pub region: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub browser: Option<String>,
    pub os: Option<String>,
    /// `mobile`, `tablet` or `desktop`.
    pub device_class: Option<String>,
    pub session_token: Option<String>,
    pub screen_resolution: Option<String>,
    pub locale: Option<String>,
    pub timezone: Option<String>,
    pub is_duplicate: bool,
    pub dedup_key: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
