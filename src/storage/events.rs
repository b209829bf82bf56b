//! Write path: link/destination resolution, the append-only event log, and
//! atomic counter increments.
//!
//! Deduplication happens here, inside the insert itself. `dedup_key`
//! carries a UNIQUE index; the first insert for a key wins and any
//! conflicting insert surfaces as `DbErr::RecordNotInserted`, which we turn
//! into a persisted duplicate row (NULL key, `is_duplicate = true`). There
//! is no separate existence check to race against.

use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, DbErr, EntityTrait, ExprTrait, QueryFilter};
use tracing::debug;

use super::SeaOrmStorage;
use crate::errors::{LinkpulseError, Result};
use migration::entities::{destination, event, link};

/// Whether an insert landed as the first event for its key or as a replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// First write for this key (or no key at all). Counters may move.
    Counted,
    /// The key already existed; stored with `is_duplicate = true`.
    Duplicate,
}

/// A fully enriched event, ready to be appended to the log.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub link_id: String,
    pub destination_id: Option<String>,
    pub user_id: String,
    pub kind: String,
    pub occurred_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub client_descriptor: Option<String>,
    pub referrer: Option<String>,
    pub country: String,
    pub region: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub device_class: Option<String>,
    pub session_token: Option<String>,
    pub screen_resolution: Option<String>,
    pub locale: Option<String>,
    pub timezone: Option<String>,
    /// `None` means the event is always unique (no session token).
    pub dedup_key: Option<String>,
}

impl EventRecord {
    fn active_model(&self, is_duplicate: bool, dedup_key: Option<String>) -> event::ActiveModel {
        event::ActiveModel {
            link_id: Set(self.link_id.clone()),
            destination_id: Set(self.destination_id.clone()),
            user_id: Set(self.user_id.clone()),
            kind: Set(self.kind.clone()),
            occurred_at: Set(self.occurred_at),
            ip_address: Set(self.ip_address.clone()),
            client_descriptor: Set(self.client_descriptor.clone()),
            referrer: Set(self.referrer.clone()),
            country: Set(self.country.clone()),
            region: Set(self.region.clone()),
            city: Set(self.city.clone()),
            latitude: Set(self.latitude),
            longitude: Set(self.longitude),
            browser: Set(self.browser.clone()),
            os: Set(self.os.clone()),
            device_class: Set(self.device_class.clone()),
            session_token: Set(self.session_token.clone()),
            screen_resolution: Set(self.screen_resolution.clone()),
            locale: Set(self.locale.clone()),
            timezone: Set(self.timezone.clone()),
            is_duplicate: Set(is_duplicate),
            dedup_key: Set(dedup_key),
            ..Default::default()
        }
    }
}

impl SeaOrmStorage {
    pub async fn get_link(&self, link_id: &str) -> Result<Option<link::Model>> {
        link::Entity::find_by_id(link_id)
            .one(&self.db)
            .await
            .map_err(|e| LinkpulseError::database_operation(format!("Link lookup failed: {}", e)))
    }

    /// Resolve a destination together with its owning link.
    pub async fn get_destination_with_link(
        &self,
        destination_id: &str,
    ) -> Result<Option<(destination::Model, link::Model)>> {
        let Some(dest) = destination::Entity::find_by_id(destination_id)
            .one(&self.db)
            .await
            .map_err(|e| {
                LinkpulseError::database_operation(format!("Destination lookup failed: {}", e))
            })?
        else {
            return Ok(None);
        };

        let link = self.get_link(&dest.link_id).await?;
        Ok(link.map(|l| (dest, l)))
    }

    /// Append one event, deciding dedup atomically inside the insert.
    ///
    /// Returns [`PersistOutcome::Duplicate`] when the key already existed;
    /// the replay is still persisted, flagged, with a NULL key.
    pub async fn insert_event(&self, record: &EventRecord) -> Result<PersistOutcome> {
        let Some(key) = &record.dedup_key else {
            event::Entity::insert(record.active_model(false, None))
                .exec(&self.db)
                .await
                .map_err(|e| {
                    LinkpulseError::database_operation(format!("Event insert failed: {}", e))
                })?;
            return Ok(PersistOutcome::Counted);
        };

        let insert = event::Entity::insert(record.active_model(false, Some(key.clone())))
            .on_conflict(
                OnConflict::column(event::Column::DedupKey)
                    .do_nothing()
                    .to_owned(),
            )
            .exec(&self.db)
            .await;

        match insert {
            Ok(_) => Ok(PersistOutcome::Counted),
            Err(DbErr::RecordNotInserted) => {
                debug!("Duplicate event for key {}, recording replay", key);
                event::Entity::insert(record.active_model(true, None))
                    .exec(&self.db)
                    .await
                    .map_err(|e| {
                        LinkpulseError::database_operation(format!(
                            "Duplicate event insert failed: {}",
                            e
                        ))
                    })?;
                Ok(PersistOutcome::Duplicate)
            }
            Err(e) => Err(LinkpulseError::database_operation(format!(
                "Event insert failed: {}",
                e
            ))),
        }
    }

    /// Atomic `col = col + 1` on the link's view and click counters.
    ///
    /// A page view is also the one guaranteed "click" on the link itself, so
    /// both counters move together.
    pub async fn bump_link_view(&self, link_id: &str) -> Result<()> {
        link::Entity::update_many()
            .col_expr(
                link::Column::ViewCount,
                Expr::col(link::Column::ViewCount).add(1),
            )
            .col_expr(
                link::Column::ClickCount,
                Expr::col(link::Column::ClickCount).add(1),
            )
            .filter(link::Column::Id.eq(link_id))
            .exec(&self.db)
            .await
            .map_err(|e| {
                LinkpulseError::database_operation(format!("Link counter update failed: {}", e))
            })?;
        Ok(())
    }

    /// Atomic `col = col + 1` on a destination's click counter.
    pub async fn bump_destination_click(&self, destination_id: &str) -> Result<()> {
        destination::Entity::update_many()
            .col_expr(
                destination::Column::ClickCount,
                Expr::col(destination::Column::ClickCount).add(1),
            )
            .filter(destination::Column::Id.eq(destination_id))
            .exec(&self.db)
            .await
            .map_err(|e| {
                LinkpulseError::database_operation(format!(
                    "Destination counter update failed: {}",
                    e
                ))
            })?;
        Ok(())
    }

    /// Current `(view_count, click_count)` for a link.
    pub async fn link_counters(&self, link_id: &str) -> Result<(i64, i64)> {
        let link = self
            .get_link(link_id)
            .await?
            .ok_or_else(|| LinkpulseError::not_found(format!("Link not found: {}", link_id)))?;
        Ok((link.view_count, link.click_count))
    }
}
