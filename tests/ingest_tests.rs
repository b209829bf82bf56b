//! Ingestion gateway tests against a temporary SQLite database.
//!
//! Covers the write-path behaviors that matter: concurrent counter
//! increments without lost updates, session dedup counting exactly once,
//! bot suppression, rate-limit rejection, and enrichment degradation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use tempfile::TempDir;

use linkpulse::config::IngestConfig;
use linkpulse::enrich::{EnrichmentPipeline, GeoInfo, GeoIpLookup, GeoIpProvider};
use linkpulse::errors::LinkpulseError;
use linkpulse::ingest::{ClickInput, IngestService, ViewInput};
use linkpulse::ratelimit::SlidingWindowLimiter;
use linkpulse::reader::{AggregateScope, ReconciliationReader};
use linkpulse::storage::SeaOrmStorage;

use migration::entities::{destination, event, link};

async fn create_temp_storage() -> (SeaOrmStorage, TempDir) {
    let td = TempDir::new().unwrap();
    let p = td.path().join("ingest_test.db");
    let u = format!("sqlite://{}?mode=rwc", p.display());
    let storage = SeaOrmStorage::new(&u).await.unwrap();
    (storage, td)
}

async fn seed_link(storage: &SeaOrmStorage, id: &str, user_id: &str) {
    link::Entity::insert(link::ActiveModel {
        id: Set(id.to_string()),
        user_id: Set(user_id.to_string()),
        active: Set(true),
        view_count: Set(0),
        click_count: Set(0),
        created_at: Set(Utc::now()),
    })
    .exec(storage.get_db())
    .await
    .unwrap();
}

async fn seed_destination(storage: &SeaOrmStorage, id: &str, link_id: &str) {
    destination::Entity::insert(destination::ActiveModel {
        id: Set(id.to_string()),
        link_id: Set(link_id.to_string()),
        target_url: Set("https://example.com/out".to_string()),
        active: Set(true),
        click_count: Set(0),
        created_at: Set(Utc::now()),
    })
    .exec(storage.get_db())
    .await
    .unwrap();
}

fn make_service(storage: SeaOrmStorage, max_attempts: u32) -> IngestService {
    let config = IngestConfig {
        rate_limit_max_attempts: max_attempts,
        rate_limit_window_secs: 60,
    };
    IngestService::new(
        storage,
        Arc::new(SlidingWindowLimiter::new()),
        EnrichmentPipeline::disabled(),
        &config,
    )
}

fn view_input(link_id: &str, token: Option<&str>, addr: &str) -> ViewInput {
    ViewInput {
        link_id: link_id.to_string(),
        session_token: token.map(String::from),
        client_descriptor: Some(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
        ),
        source_addr: Some(addr.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_concurrent_views_have_no_lost_counter_updates() {
    let (storage, _td) = create_temp_storage().await;
    seed_link(&storage, "lnk1", "user1").await;
    let service = Arc::new(make_service(storage.clone(), 10_000));

    let mut handles = vec![];
    for i in 0..20 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            let input = view_input(
                "lnk1",
                Some(&format!("sess-{}", i)),
                &format!("198.51.100.{}", i + 1),
            );
            service.record_view(input).await.unwrap()
        }));
    }
    for handle in handles {
        let outcome = handle.await.unwrap();
        assert!(outcome.counted);
    }

    let (views, clicks) = storage.link_counters("lnk1").await.unwrap();
    assert_eq!(views, 20);
    assert_eq!(clicks, 20);
}

#[tokio::test]
async fn test_concurrent_clicks_have_no_lost_counter_updates() {
    let (storage, _td) = create_temp_storage().await;
    seed_link(&storage, "lnk1", "user1").await;
    seed_destination(&storage, "dst1", "lnk1").await;
    let service = Arc::new(make_service(storage.clone(), 10_000));

    let mut handles = vec![];
    for i in 0..20 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service
                .record_click(ClickInput {
                    destination_id: "dst1".to_string(),
                    session_token: Some(format!("sess-{}", i)),
                    client_descriptor: Some(
                        "Mozilla/5.0 (X11; Linux x86_64) Firefox/121.0".to_string(),
                    ),
                    source_addr: Some(format!("198.51.100.{}", i + 1)),
                    ..Default::default()
                })
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        let outcome = handle.await.unwrap();
        assert!(outcome.counted);
    }

    let dst = destination::Entity::find_by_id("dst1")
        .one(storage.get_db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(dst.click_count, 20);
}

#[tokio::test]
async fn test_replayed_session_token_counts_exactly_once() {
    let (storage, _td) = create_temp_storage().await;
    seed_link(&storage, "lnk1", "user1").await;
    let service = make_service(storage.clone(), 100);

    let first = service
        .record_view(view_input("lnk1", Some("sess-a"), "198.51.100.1"))
        .await
        .unwrap();
    assert!(first.counted);
    assert_eq!(first.views, 1);

    let replay = service
        .record_view(view_input("lnk1", Some("sess-a"), "198.51.100.1"))
        .await
        .unwrap();
    assert!(!replay.counted);
    assert!(replay.is_duplicate);
    assert_eq!(replay.views, 1, "counters must not move on a duplicate");

    // Both submissions are in the log, the replay flagged.
    let total = event::Entity::find()
        .count(storage.get_db())
        .await
        .unwrap();
    assert_eq!(total, 2);
    let duplicates = event::Entity::find()
        .filter(event::Column::IsDuplicate.eq(true))
        .count(storage.get_db())
        .await
        .unwrap();
    assert_eq!(duplicates, 1);
}

#[tokio::test]
async fn test_events_without_session_token_are_always_unique() {
    let (storage, _td) = create_temp_storage().await;
    seed_link(&storage, "lnk1", "user1").await;
    let service = make_service(storage.clone(), 100);

    for _ in 0..3 {
        let outcome = service
            .record_view(view_input("lnk1", None, "198.51.100.1"))
            .await
            .unwrap();
        assert!(outcome.counted);
    }
    let (views, _) = storage.link_counters("lnk1").await.unwrap();
    assert_eq!(views, 3);
}

#[tokio::test]
async fn test_bot_views_are_accepted_but_not_persisted() {
    let (storage, _td) = create_temp_storage().await;
    seed_link(&storage, "lnk1", "user1").await;
    let service = make_service(storage.clone(), 100);

    let mut input = view_input("lnk1", Some("sess-a"), "198.51.100.1");
    input.client_descriptor = Some("curl/7.68.0".to_string());

    let outcome = service.record_view(input).await.unwrap();
    assert!(!outcome.counted);
    assert_eq!(outcome.views, 0);

    let total = event::Entity::find()
        .count(storage.get_db())
        .await
        .unwrap();
    assert_eq!(total, 0, "bot traffic must leave no trace in the log");
}

#[tokio::test]
async fn test_over_budget_source_is_rejected_with_retry_after() {
    let (storage, _td) = create_temp_storage().await;
    seed_link(&storage, "lnk1", "user1").await;
    let service = make_service(storage.clone(), 3);

    for i in 0..3 {
        service
            .record_view(view_input("lnk1", Some(&format!("s{}", i)), "198.51.100.1"))
            .await
            .unwrap();
    }

    let rejected = service
        .record_view(view_input("lnk1", Some("s3"), "198.51.100.1"))
        .await;
    match rejected {
        Err(LinkpulseError::RateLimited {
            retry_after_secs, ..
        }) => {
            assert!(retry_after_secs <= 60);
        }
        other => panic!("expected RateLimited, got {:?}", other),
    }

    // A different source address still has a fresh budget.
    let other = service
        .record_view(view_input("lnk1", Some("s4"), "203.0.113.5"))
        .await
        .unwrap();
    assert!(other.counted);
}

#[tokio::test]
async fn test_unknown_link_is_not_found() {
    let (storage, _td) = create_temp_storage().await;
    let service = make_service(storage, 100);

    let result = service
        .record_view(view_input("missing", None, "198.51.100.1"))
        .await;
    assert!(matches!(result, Err(LinkpulseError::NotFound(_))));
}

#[tokio::test]
async fn test_inactive_link_is_not_found() {
    let (storage, _td) = create_temp_storage().await;
    link::Entity::insert(link::ActiveModel {
        id: Set("off".to_string()),
        user_id: Set("user1".to_string()),
        active: Set(false),
        view_count: Set(0),
        click_count: Set(0),
        created_at: Set(Utc::now()),
    })
    .exec(storage.get_db())
    .await
    .unwrap();

    let service = make_service(storage, 100);
    let result = service
        .record_view(view_input("off", None, "198.51.100.1"))
        .await;
    assert!(matches!(result, Err(LinkpulseError::NotFound(_))));
}

struct OutageLookup;

#[async_trait]
impl GeoIpLookup for OutageLookup {
    async fn lookup(&self, _ip: &str) -> Option<GeoInfo> {
        None
    }

    fn name(&self) -> &'static str {
        "Outage"
    }
}

#[tokio::test]
async fn test_geo_outage_persists_event_with_unknown_country() {
    let (storage, _td) = create_temp_storage().await;
    seed_link(&storage, "lnk1", "user1").await;

    let config = IngestConfig {
        rate_limit_max_attempts: 100,
        rate_limit_window_secs: 60,
    };
    let service = IngestService::new(
        storage.clone(),
        Arc::new(SlidingWindowLimiter::new()),
        EnrichmentPipeline::with_provider(
            GeoIpProvider::from_lookup(Arc::new(OutageLookup)),
            Duration::from_millis(100),
        ),
        &config,
    );

    let outcome = service
        .record_view(view_input("lnk1", Some("sess-a"), "93.184.216.34"))
        .await
        .unwrap();
    assert!(outcome.counted);

    let stored = event::Entity::find()
        .one(storage.get_db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.country, "Unknown");
    assert_eq!(stored.user_id, "user1", "owner copied from the link");
    assert!(stored.browser.is_some(), "device parsing is independent of geo");
}

#[tokio::test]
async fn test_click_bumps_only_its_destination() {
    let (storage, _td) = create_temp_storage().await;
    seed_link(&storage, "lnk1", "user1").await;
    seed_destination(&storage, "dst1", "lnk1").await;
    seed_destination(&storage, "dst2", "lnk1").await;
    let service = make_service(storage.clone(), 100);

    let outcome = service
        .record_click(ClickInput {
            destination_id: "dst1".to_string(),
            session_token: Some("sess-a".to_string()),
            client_descriptor: Some("Mozilla/5.0 (X11; Linux x86_64) Firefox/121.0".to_string()),
            source_addr: Some("198.51.100.1".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(outcome.counted);
    assert!(!outcome.is_duplicate);

    let dst1 = destination::Entity::find_by_id("dst1")
        .one(storage.get_db())
        .await
        .unwrap()
        .unwrap();
    let dst2 = destination::Entity::find_by_id("dst2")
        .one(storage.get_db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(dst1.click_count, 1);
    assert_eq!(dst2.click_count, 0);

    // A click does not move the link-level counters.
    let (views, clicks) = storage.link_counters("lnk1").await.unwrap();
    assert_eq!(views, 0);
    assert_eq!(clicks, 0);
}

#[tokio::test]
async fn test_same_token_dedups_views_and_clicks_independently() {
    let (storage, _td) = create_temp_storage().await;
    seed_link(&storage, "lnk1", "user1").await;
    seed_destination(&storage, "dst1", "lnk1").await;
    let service = make_service(storage.clone(), 100);

    let view = service
        .record_view(view_input("lnk1", Some("sess-a"), "198.51.100.1"))
        .await
        .unwrap();
    assert!(view.counted);

    // The same session clicking after viewing is a distinct interaction.
    let click = service
        .record_click(ClickInput {
            destination_id: "dst1".to_string(),
            session_token: Some("sess-a".to_string()),
            client_descriptor: Some("Mozilla/5.0 (X11; Linux x86_64) Firefox/121.0".to_string()),
            source_addr: Some("198.51.100.1".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(click.counted);
}

#[tokio::test]
async fn test_five_distinct_sessions_then_replay() {
    let (storage, _td) = create_temp_storage().await;
    seed_link(&storage, "lnk1", "user1").await;
    let service = make_service(storage.clone(), 100);

    for i in 0..5 {
        let outcome = service
            .record_view(view_input(
                "lnk1",
                Some(&format!("sess-{}", i)),
                &format!("198.51.100.{}", i + 1),
            ))
            .await
            .unwrap();
        assert!(outcome.counted);
    }

    let (views, clicks) = storage.link_counters("lnk1").await.unwrap();
    assert_eq!((views, clicks), (5, 5));

    let reader = ReconciliationReader::new(storage.clone());
    let scope = || AggregateScope {
        link_id: Some("lnk1".to_string()),
        ..Default::default()
    };
    let report = reader.get_aggregate(scope()).await.unwrap();
    assert_eq!(report.total_views, 5);
    assert_eq!(report.total_clicks, 5, "a counted view is an implicit click");

    let replay = service
        .record_view(view_input("lnk1", Some("sess-2"), "198.51.100.3"))
        .await
        .unwrap();
    assert!(!replay.counted);
    assert_eq!(replay.views, 5, "replay leaves the totals unchanged");

    let after = reader.get_aggregate(scope()).await.unwrap();
    assert_eq!((after.total_views, after.total_clicks), (5, 5));

    let duplicates = event::Entity::find()
        .filter(event::Column::IsDuplicate.eq(true))
        .count(storage.get_db())
        .await
        .unwrap();
    assert_eq!(duplicates, 1);
}
