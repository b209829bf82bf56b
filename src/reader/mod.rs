//! Reconciliation reader: dashboard aggregates over the event log and the
//! denormalized counters.
//!
//! The log and the counters can legitimately disagree (a crash between
//! insert and increment loses the increment, never the row). Rather than
//! hide that, every total is computed from both sources and resolved by
//! [`reconcile_totals`], which picks the larger value: both paths only
//! undercount, so the maximum is the best estimate.

use chrono::{DateTime, Duration, Utc};
use sea_orm::DbBackend;
use sea_orm::sea_query::Expr;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::errors::Result;
use crate::ingest::EventKind;
use crate::storage::{EventScope, SeaOrmStorage};

const DEFAULT_RANGE_DAYS: u32 = 30;
const BREAKDOWN_LIMIT: u64 = 10;

/// Pick the authoritative total out of the log-derived and counter-derived
/// values. Undercounting is the only failure mode on either side, so the
/// larger of the two is closest to the truth.
pub fn reconcile_totals(log_count: u64, counter_value: u64) -> u64 {
    log_count.max(counter_value)
}

/// Query scope for [`ReconciliationReader::get_aggregate`].
#[derive(Debug, Clone, Default)]
pub struct AggregateScope {
    pub link_id: Option<String>,
    pub user_id: Option<String>,
    /// Day range for the breakdowns; totals are lifetime. Defaults to 30.
    pub days: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct DailyEntry {
    pub date: String,
    pub views: i64,
    pub clicks: i64,
}

#[derive(Debug, Serialize)]
pub struct DestinationEntry {
    pub destination_id: String,
    pub target_url: Option<String>,
    pub clicks: i64,
}

#[derive(Debug, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct AggregateReport {
    pub total_views: u64,
    pub total_clicks: u64,
    pub unique_visitors: u64,
    pub daily_breakdown: Vec<DailyEntry>,
    pub top_destinations: Vec<DestinationEntry>,
    pub top_referrers: Vec<LabelCount>,
    pub top_countries: Vec<LabelCount>,
    pub top_devices: Vec<LabelCount>,
}

#[derive(Debug, Serialize)]
pub struct VisitorEntry {
    pub occurred_at: DateTime<Utc>,
    pub kind: String,
    pub country: String,
    pub city: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub device_class: Option<String>,
    pub referrer: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VisitorsReport {
    pub visitors: Vec<VisitorEntry>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

/// Day-bucket expression over `occurred_at` for the active backend.
fn day_bucket_expr(backend: DbBackend) -> Expr {
    match backend {
        DbBackend::Sqlite => Expr::cust("strftime('%Y-%m-%d', occurred_at)"),
        DbBackend::MySql => Expr::cust("DATE_FORMAT(occurred_at, '%Y-%m-%d')"),
        _ => Expr::cust("TO_CHAR(occurred_at, 'YYYY-MM-DD')"),
    }
}

#[derive(Clone)]
pub struct ReconciliationReader {
    storage: SeaOrmStorage,
}

impl ReconciliationReader {
    pub fn new(storage: SeaOrmStorage) -> Self {
        Self { storage }
    }

    pub async fn get_aggregate(&self, scope: AggregateScope) -> Result<AggregateReport> {
        let lifetime = EventScope {
            link_id: scope.link_id.clone(),
            user_id: scope.user_id.clone(),
            start: None,
        };
        let days = scope.days.unwrap_or(DEFAULT_RANGE_DAYS);
        let windowed = EventScope {
            start: Some(Utc::now() - Duration::days(days as i64)),
            ..lifetime.clone()
        };

        let log_views = self
            .storage
            .count_events(&lifetime, EventKind::View.as_str())
            .await?;
        let log_click_events = self
            .storage
            .count_events(&lifetime, EventKind::Click.as_str())
            .await?;
        // A counted view bumps the link's click counter too, so the
        // log-derived click total includes views. This keeps both sources
        // measuring the same quantity before max-selection.
        let log_clicks = log_views + log_click_events;
        let counters = self.storage.counter_sums(&lifetime).await?;

        let total_views = reconcile_totals(log_views, counters.views.max(0) as u64);
        let total_clicks = reconcile_totals(log_clicks, counters.clicks.max(0) as u64);
        debug!(
            "Aggregate totals reconciled: views log={} counter={} -> {}, clicks log={} counter={} -> {}",
            log_views, counters.views, total_views, log_clicks, counters.clicks, total_clicks
        );

        let unique_visitors = self.storage.unique_visitors(&lifetime).await?;

        let daily_breakdown = self.daily_breakdown(&windowed).await?;
        let top_destinations = self.top_destinations(&windowed).await?;

        let top_referrers = self
            .storage
            .top_referrers(&windowed, BREAKDOWN_LIMIT)
            .await?
            .into_iter()
            .filter_map(|row| {
                row.label.map(|label| LabelCount {
                    label,
                    count: row.count,
                })
            })
            .collect();

        let top_countries = self
            .storage
            .top_countries(&windowed, BREAKDOWN_LIMIT)
            .await?
            .into_iter()
            .map(|row| LabelCount {
                label: row.label,
                count: row.count,
            })
            .collect();

        let top_devices = self
            .storage
            .top_devices(&windowed, BREAKDOWN_LIMIT)
            .await?
            .into_iter()
            .filter_map(|row| {
                row.label.map(|label| LabelCount {
                    label,
                    count: row.count,
                })
            })
            .collect();

        Ok(AggregateReport {
            total_views,
            total_clicks,
            unique_visitors,
            daily_breakdown,
            top_destinations,
            top_referrers,
            top_countries,
            top_devices,
        })
    }

    /// Merge the per-kind trends into one row per day.
    async fn daily_breakdown(&self, scope: &EventScope) -> Result<Vec<DailyEntry>> {
        let bucket = day_bucket_expr(self.storage.db_backend());

        let views = self
            .storage
            .daily_counts(scope, EventKind::View.as_str(), bucket.clone())
            .await?;
        let clicks = self
            .storage
            .daily_counts(scope, EventKind::Click.as_str(), bucket)
            .await?;

        let mut merged: BTreeMap<String, (i64, i64)> = BTreeMap::new();
        for row in views {
            merged.entry(row.label).or_default().0 = row.count;
        }
        for row in clicks {
            merged.entry(row.label).or_default().1 = row.count;
        }

        Ok(merged
            .into_iter()
            .map(|(date, (views, clicks))| DailyEntry {
                date,
                views,
                clicks,
            })
            .collect())
    }

    async fn top_destinations(&self, scope: &EventScope) -> Result<Vec<DestinationEntry>> {
        let rows = self
            .storage
            .top_destinations(scope, EventKind::Click.as_str(), BREAKDOWN_LIMIT)
            .await?;

        let ids: Vec<String> = rows.iter().filter_map(|r| r.label.clone()).collect();
        let urls: BTreeMap<String, String> = self
            .storage
            .destinations_by_ids(ids)
            .await?
            .into_iter()
            .map(|d| (d.id, d.target_url))
            .collect();

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                row.label.map(|id| DestinationEntry {
                    target_url: urls.get(&id).cloned(),
                    destination_id: id,
                    clicks: row.count,
                })
            })
            .collect())
    }

    /// Paginated enriched events for the "recent visitors" table.
    pub async fn get_visitors(
        &self,
        link_id: &str,
        page: u64,
        limit: u64,
        device_filter: Option<&str>,
    ) -> Result<VisitorsReport> {
        let page = page.max(1);
        let limit = limit.clamp(1, 100);

        let result = self
            .storage
            .get_visitor_page(link_id, page, limit, device_filter)
            .await?;

        Ok(VisitorsReport {
            visitors: result
                .events
                .into_iter()
                .map(|e| VisitorEntry {
                    occurred_at: e.occurred_at,
                    kind: e.kind,
                    country: e.country,
                    city: e.city,
                    browser: e.browser,
                    os: e.os,
                    device_class: e.device_class,
                    referrer: e.referrer,
                })
                .collect(),
            total: result.total,
            page: result.page,
            limit: result.limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconcile_picks_the_larger_total() {
        assert_eq!(reconcile_totals(7, 9), 9);
        assert_eq!(reconcile_totals(9, 7), 9);
        assert_eq!(reconcile_totals(5, 5), 5);
        assert_eq!(reconcile_totals(0, 0), 0);
    }
}
