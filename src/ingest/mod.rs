//! Ingestion gateway: the single write path for view and click events.
//!
//! Stage order is fixed: resolve the subject, bot filter, rate limit,
//! enrichment, atomic insert (dedup decided inside the insert), counter
//! increments. Bots get a success response with nothing persisted; rate
//! limit rejections surface as `RateLimited` with a retry-after hint;
//! enrichment never fails the call.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use crate::config::IngestConfig;
use crate::enrich::EnrichmentPipeline;
use crate::errors::{LinkpulseError, Result};
use crate::filter;
use crate::ratelimit::SlidingWindowLimiter;
use crate::storage::{EventRecord, PersistOutcome, SeaOrmStorage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    View,
    Click,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::View => "view",
            EventKind::Click => "click",
        }
    }
}

/// Per-request input for a page view.
#[derive(Debug, Clone, Default)]
pub struct ViewInput {
    pub link_id: String,
    pub session_token: Option<String>,
    pub referrer: Option<String>,
    pub client_descriptor: Option<String>,
    pub screen_resolution: Option<String>,
    pub locale: Option<String>,
    pub timezone: Option<String>,
    pub source_addr: Option<String>,
}

/// Per-request input for a destination click.
#[derive(Debug, Clone, Default)]
pub struct ClickInput {
    pub destination_id: String,
    pub session_token: Option<String>,
    pub client_descriptor: Option<String>,
    pub screen_resolution: Option<String>,
    pub locale: Option<String>,
    pub timezone: Option<String>,
    pub source_addr: Option<String>,
}

/// What a view submission did. `counted = false` covers both bots (nothing
/// persisted) and duplicates (persisted, flagged, counters untouched).
#[derive(Debug, Clone, Copy)]
pub struct ViewOutcome {
    pub counted: bool,
    pub is_duplicate: bool,
    pub views: i64,
    pub clicks: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct ClickOutcome {
    pub counted: bool,
    pub is_duplicate: bool,
}

/// First-write-wins key for the unique index. `None` when no session token
/// was supplied, which makes the event unconditionally unique.
fn dedup_key(kind: EventKind, subject_id: &str, session_token: Option<&str>) -> Option<String> {
    session_token
        .filter(|t| !t.is_empty())
        .map(|t| format!("{}:{}:{}", kind.as_str(), subject_id, t))
}

pub struct IngestService {
    storage: SeaOrmStorage,
    limiter: Arc<SlidingWindowLimiter>,
    enrichment: EnrichmentPipeline,
    rate_limit_max_attempts: u32,
    rate_limit_window: Duration,
}

impl IngestService {
    pub fn new(
        storage: SeaOrmStorage,
        limiter: Arc<SlidingWindowLimiter>,
        enrichment: EnrichmentPipeline,
        config: &IngestConfig,
    ) -> Self {
        Self {
            storage,
            limiter,
            enrichment,
            rate_limit_max_attempts: config.rate_limit_max_attempts,
            rate_limit_window: Duration::from_secs(config.rate_limit_window_secs),
        }
    }

    /// Record a page view. Counts against the link's view and click
    /// counters; a view is also the guaranteed click on the link itself.
    pub async fn record_view(&self, input: ViewInput) -> Result<ViewOutcome> {
        let link = self
            .storage
            .get_link(&input.link_id)
            .await?
            .filter(|l| l.active)
            .ok_or_else(|| {
                LinkpulseError::not_found(format!("Link not found: {}", input.link_id))
            })?;

        if self.is_bot(input.client_descriptor.as_deref()) {
            debug!("Bot view on link {} suppressed", link.id);
            return Ok(ViewOutcome {
                counted: false,
                is_duplicate: false,
                views: link.view_count,
                clicks: link.click_count,
            });
        }

        self.check_rate_limit(input.source_addr.as_deref())?;

        let enrichment = self
            .enrichment
            .enrich(
                input.source_addr.as_deref(),
                input.client_descriptor.as_deref(),
            )
            .await;

        let record = EventRecord {
            link_id: link.id.clone(),
            destination_id: None,
            user_id: link.user_id.clone(),
            kind: EventKind::View.as_str().to_string(),
            occurred_at: Utc::now(),
            ip_address: input.source_addr.clone(),
            client_descriptor: input.client_descriptor.clone(),
            referrer: input.referrer.clone(),
            country: enrichment.geo.country,
            region: enrichment.geo.region,
            city: enrichment.geo.city,
            latitude: enrichment.geo.latitude,
            longitude: enrichment.geo.longitude,
            browser: enrichment.device.as_ref().map(|d| d.browser.clone()),
            os: enrichment.device.as_ref().map(|d| d.os.clone()),
            device_class: enrichment
                .device
                .as_ref()
                .map(|d| d.device_class.as_str().to_string()),
            session_token: input.session_token.clone(),
            screen_resolution: input.screen_resolution.clone(),
            locale: input.locale.clone(),
            timezone: input.timezone.clone(),
            dedup_key: dedup_key(
                EventKind::View,
                &link.id,
                input.session_token.as_deref(),
            ),
        };

        let outcome = self.storage.insert_event(&record).await?;
        let counted = outcome == PersistOutcome::Counted;
        if counted {
            self.storage.bump_link_view(&link.id).await?;
        }

        let (views, clicks) = self.storage.link_counters(&link.id).await?;
        debug!(
            "View on link {} counted={} (views={}, clicks={})",
            link.id, counted, views, clicks
        );

        Ok(ViewOutcome {
            counted,
            is_duplicate: !counted,
            views,
            clicks,
        })
    }

    /// Record a click on one destination. Counts only against that
    /// destination's click counter.
    pub async fn record_click(&self, input: ClickInput) -> Result<ClickOutcome> {
        let (dest, link) = self
            .storage
            .get_destination_with_link(&input.destination_id)
            .await?
            .filter(|(d, l)| d.active && l.active)
            .ok_or_else(|| {
                LinkpulseError::not_found(format!(
                    "Destination not found: {}",
                    input.destination_id
                ))
            })?;

        if self.is_bot(input.client_descriptor.as_deref()) {
            debug!("Bot click on destination {} suppressed", dest.id);
            return Ok(ClickOutcome {
                counted: false,
                is_duplicate: false,
            });
        }

        self.check_rate_limit(input.source_addr.as_deref())?;

        let enrichment = self
            .enrichment
            .enrich(
                input.source_addr.as_deref(),
                input.client_descriptor.as_deref(),
            )
            .await;

        let record = EventRecord {
            link_id: link.id.clone(),
            destination_id: Some(dest.id.clone()),
            user_id: link.user_id.clone(),
            kind: EventKind::Click.as_str().to_string(),
            occurred_at: Utc::now(),
            ip_address: input.source_addr.clone(),
            client_descriptor: input.client_descriptor.clone(),
            referrer: None,
            country: enrichment.geo.country,
            region: enrichment.geo.region,
            city: enrichment.geo.city,
            latitude: enrichment.geo.latitude,
            longitude: enrichment.geo.longitude,
            browser: enrichment.device.as_ref().map(|d| d.browser.clone()),
            os: enrichment.device.as_ref().map(|d| d.os.clone()),
            device_class: enrichment
                .device
                .as_ref()
                .map(|d| d.device_class.as_str().to_string()),
            session_token: input.session_token.clone(),
            screen_resolution: input.screen_resolution.clone(),
            locale: input.locale.clone(),
            timezone: input.timezone.clone(),
            dedup_key: dedup_key(
                EventKind::Click,
                &dest.id,
                input.session_token.as_deref(),
            ),
        };

        let outcome = self.storage.insert_event(&record).await?;
        let counted = outcome == PersistOutcome::Counted;
        if counted {
            self.storage.bump_destination_click(&dest.id).await?;
        }

        debug!("Click on destination {} counted={}", dest.id, counted);

        Ok(ClickOutcome {
            counted,
            is_duplicate: !counted,
        })
    }

    fn is_bot(&self, client_descriptor: Option<&str>) -> bool {
        client_descriptor.is_some_and(filter::classify)
    }

    fn check_rate_limit(&self, source_addr: Option<&str>) -> Result<()> {
        let key = format!("ingest:{}", source_addr.unwrap_or("unknown"));
        let decision = self.limiter.check_and_consume(
            &key,
            self.rate_limit_max_attempts,
            self.rate_limit_window,
        );
        if decision.allowed {
            Ok(())
        } else {
            Err(LinkpulseError::rate_limited(
                "Too many events from this address, slow down".to_string(),
                decision.retry_after_secs(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_key_requires_token() {
        assert_eq!(dedup_key(EventKind::View, "lnk1", None), None);
        assert_eq!(dedup_key(EventKind::View, "lnk1", Some("")), None);
        assert_eq!(
            dedup_key(EventKind::View, "lnk1", Some("sess-a")),
            Some("view:lnk1:sess-a".to_string())
        );
    }

    #[test]
    fn test_dedup_key_separates_kinds_and_subjects() {
        let view = dedup_key(EventKind::View, "x", Some("t"));
        let click = dedup_key(EventKind::Click, "x", Some("t"));
        assert_ne!(view, click);

        let other_subject = dedup_key(EventKind::View, "y", Some("t"));
        assert_ne!(view, other_subject);
    }
}
