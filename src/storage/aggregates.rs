//! Read path: scoped statistics over the event log and counter tables.
//!
//! Log-derived numbers only count non-duplicate events; duplicates stay in
//! the table for audit but never show up in a total or breakdown.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, EntityTrait, FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Select,
};

use super::SeaOrmStorage;
use crate::errors::{LinkpulseError, Result};
use migration::entities::{destination, event, link};

/// What slice of the event log a dashboard query covers: a single link, a
/// whole user, or both, always bounded by a start time.
#[derive(Debug, Clone, Default)]
pub struct EventScope {
    pub link_id: Option<String>,
    pub user_id: Option<String>,
    pub start: Option<DateTime<Utc>>,
}

impl EventScope {
    fn apply(&self, mut query: Select<event::Entity>) -> Select<event::Entity> {
        query = query.filter(event::Column::IsDuplicate.eq(false));
        if let Some(start) = self.start {
            query = query.filter(event::Column::OccurredAt.gte(start));
        }
        if let Some(ref link_id) = self.link_id {
            query = query.filter(event::Column::LinkId.eq(link_id));
        }
        if let Some(ref user_id) = self.user_id {
            query = query.filter(event::Column::UserId.eq(user_id));
        }
        query
    }
}

#[derive(Debug, FromQueryResult)]
pub struct TrendRow {
    pub label: String,
    pub count: i64,
}

#[derive(Debug, FromQueryResult)]
pub struct BreakdownRow {
    pub label: Option<String>,
    pub count: i64,
}

/// Summed denormalized counters for a scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterSums {
    pub views: i64,
    pub clicks: i64,
}

#[derive(Debug, FromQueryResult)]
struct SumRow {
    total: Option<i64>,
}

#[derive(Debug, FromQueryResult)]
struct LinkSumRow {
    views: Option<i64>,
    clicks: Option<i64>,
}

#[derive(Debug, FromQueryResult)]
struct CountRow {
    count: i64,
}

/// One page of enriched events for the visitors table.
#[derive(Debug)]
pub struct VisitorPage {
    pub events: Vec<event::Model>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

impl SeaOrmStorage {
    /// Count non-duplicate events of one kind in the scope.
    pub async fn count_events(&self, scope: &EventScope, kind: &str) -> Result<u64> {
        scope
            .apply(event::Entity::find())
            .filter(event::Column::Kind.eq(kind))
            .count(&self.db)
            .await
            .map_err(|e| LinkpulseError::database_operation(format!("Event count failed: {}", e)))
    }

    /// Counter-derived totals. Views come from the link `view_count` sums.
    /// Clicks span both counter tables: a counted view bumps the link's own
    /// click counter at ingestion, so the click total is the link
    /// `click_count` sums plus the destination `click_count` sums.
    pub async fn counter_sums(&self, scope: &EventScope) -> Result<CounterSums> {
        let mut link_query = link::Entity::find()
            .select_only()
            .column_as(link::Column::ViewCount.sum(), "views")
            .column_as(link::Column::ClickCount.sum(), "clicks");
        if let Some(ref link_id) = scope.link_id {
            link_query = link_query.filter(link::Column::Id.eq(link_id));
        }
        if let Some(ref user_id) = scope.user_id {
            link_query = link_query.filter(link::Column::UserId.eq(user_id));
        }
        let (views, link_clicks) = link_query
            .into_model::<LinkSumRow>()
            .one(&self.db)
            .await
            .map_err(|e| {
                LinkpulseError::database_operation(format!("Counter sum failed: {}", e))
            })?
            .map(|r| (r.views.unwrap_or(0), r.clicks.unwrap_or(0)))
            .unwrap_or((0, 0));

        let link_ids = self.scope_link_ids(scope).await?;
        let destination_clicks = if link_ids.is_empty() {
            0
        } else {
            destination::Entity::find()
                .select_only()
                .column_as(destination::Column::ClickCount.sum(), "total")
                .filter(destination::Column::LinkId.is_in(link_ids))
                .into_model::<SumRow>()
                .one(&self.db)
                .await
                .map_err(|e| {
                    LinkpulseError::database_operation(format!("Counter sum failed: {}", e))
                })?
                .and_then(|r| r.total)
                .unwrap_or(0)
        };

        Ok(CounterSums {
            views,
            clicks: link_clicks + destination_clicks,
        })
    }

    async fn scope_link_ids(&self, scope: &EventScope) -> Result<Vec<String>> {
        if let Some(ref link_id) = scope.link_id {
            return Ok(vec![link_id.clone()]);
        }
        let mut query = link::Entity::find();
        if let Some(ref user_id) = scope.user_id {
            query = query.filter(link::Column::UserId.eq(user_id));
        }
        Ok(query
            .all(&self.db)
            .await
            .map_err(|e| {
                LinkpulseError::database_operation(format!("Link listing failed: {}", e))
            })?
            .into_iter()
            .map(|l| l.id)
            .collect())
    }

    /// Distinct source addresses in the scope. An approximation of unique
    /// visitors, stated as such on the dashboard.
    pub async fn unique_visitors(&self, scope: &EventScope) -> Result<u64> {
        let row = scope
            .apply(event::Entity::find())
            .select_only()
            .column_as(Expr::cust("COUNT(DISTINCT ip_address)"), "count")
            .into_model::<CountRow>()
            .one(&self.db)
            .await
            .map_err(|e| {
                LinkpulseError::database_operation(format!("Visitor count failed: {}", e))
            })?;
        Ok(row.map(|r| r.count as u64).unwrap_or(0))
    }

    /// Events-per-bucket trend for one kind; `date_expr` is the
    /// backend-specific date bucket over `occurred_at`.
    pub async fn daily_counts(
        &self,
        scope: &EventScope,
        kind: &str,
        date_expr: Expr,
    ) -> Result<Vec<TrendRow>> {
        scope
            .apply(event::Entity::find())
            .select_only()
            .column_as(date_expr.clone(), "label")
            .column_as(event::Column::Id.count(), "count")
            .filter(event::Column::Kind.eq(kind))
            .group_by(date_expr)
            .order_by_asc(Expr::cust("label"))
            .into_model::<TrendRow>()
            .all(&self.db)
            .await
            .map_err(|e| LinkpulseError::database_operation(format!("Trend query failed: {}", e)))
    }

    /// Click counts per destination, most-clicked first.
    pub async fn top_destinations(
        &self,
        scope: &EventScope,
        kind: &str,
        limit: u64,
    ) -> Result<Vec<BreakdownRow>> {
        scope
            .apply(event::Entity::find())
            .select_only()
            .column_as(event::Column::DestinationId, "label")
            .column_as(event::Column::Id.count(), "count")
            .filter(event::Column::Kind.eq(kind))
            .filter(event::Column::DestinationId.is_not_null())
            .group_by(event::Column::DestinationId)
            .order_by_desc(Expr::cust("count"))
            .limit(limit)
            .into_model::<BreakdownRow>()
            .all(&self.db)
            .await
            .map_err(|e| {
                LinkpulseError::database_operation(format!("Destination breakdown failed: {}", e))
            })
    }

    /// View counts per referrer; direct traffic (NULL referrer) excluded.
    pub async fn top_referrers(&self, scope: &EventScope, limit: u64) -> Result<Vec<BreakdownRow>> {
        scope
            .apply(event::Entity::find())
            .select_only()
            .column_as(event::Column::Referrer, "label")
            .column_as(event::Column::Id.count(), "count")
            .filter(event::Column::Referrer.is_not_null())
            .group_by(event::Column::Referrer)
            .order_by_desc(Expr::cust("count"))
            .limit(limit)
            .into_model::<BreakdownRow>()
            .all(&self.db)
            .await
            .map_err(|e| {
                LinkpulseError::database_operation(format!("Referrer breakdown failed: {}", e))
            })
    }

    /// Event counts per resolved country, `"Unknown"` included.
    pub async fn top_countries(&self, scope: &EventScope, limit: u64) -> Result<Vec<TrendRow>> {
        scope
            .apply(event::Entity::find())
            .select_only()
            .column_as(event::Column::Country, "label")
            .column_as(event::Column::Id.count(), "count")
            .group_by(event::Column::Country)
            .order_by_desc(Expr::cust("count"))
            .limit(limit)
            .into_model::<TrendRow>()
            .all(&self.db)
            .await
            .map_err(|e| {
                LinkpulseError::database_operation(format!("Country breakdown failed: {}", e))
            })
    }

    /// Event counts per device class.
    pub async fn top_devices(&self, scope: &EventScope, limit: u64) -> Result<Vec<BreakdownRow>> {
        scope
            .apply(event::Entity::find())
            .select_only()
            .column_as(event::Column::DeviceClass, "label")
            .column_as(event::Column::Id.count(), "count")
            .filter(event::Column::DeviceClass.is_not_null())
            .group_by(event::Column::DeviceClass)
            .order_by_desc(Expr::cust("count"))
            .limit(limit)
            .into_model::<BreakdownRow>()
            .all(&self.db)
            .await
            .map_err(|e| {
                LinkpulseError::database_operation(format!("Device breakdown failed: {}", e))
            })
    }

    /// Destination models for a set of ids, so breakdown rows can carry
    /// target URLs.
    pub async fn destinations_by_ids(&self, ids: Vec<String>) -> Result<Vec<destination::Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        destination::Entity::find()
            .filter(destination::Column::Id.is_in(ids))
            .all(&self.db)
            .await
            .map_err(|e| {
                LinkpulseError::database_operation(format!("Destination fetch failed: {}", e))
            })
    }

    /// One page of a link's events, newest first. `page` is 1-based.
    pub async fn get_visitor_page(
        &self,
        link_id: &str,
        page: u64,
        limit: u64,
        device_filter: Option<&str>,
    ) -> Result<VisitorPage> {
        let mut query = event::Entity::find()
            .filter(event::Column::LinkId.eq(link_id))
            .filter(event::Column::IsDuplicate.eq(false));
        if let Some(device) = device_filter {
            query = query.filter(event::Column::DeviceClass.eq(device));
        }
        let paginator = query
            .order_by_desc(event::Column::OccurredAt)
            .paginate(&self.db, limit);

        let total = paginator.num_items().await.map_err(|e| {
            LinkpulseError::database_operation(format!("Visitor count failed: {}", e))
        })?;
        let events = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(|e| {
                LinkpulseError::database_operation(format!("Visitor page fetch failed: {}", e))
            })?;

        Ok(VisitorPage {
            events,
            total,
            page,
            limit,
        })
    }
}
