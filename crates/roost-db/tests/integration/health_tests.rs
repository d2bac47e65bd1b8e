use chrono::{TimeDelta, Utc};
use roost_core::health::{HealthStatus, SourceHealthMetric};
use roost_core::traits::HealthBackend;
use roost_db::HealthRepository;

use crate::common::setup_test_db;

fn metric(source_id: &str, failures: u32, age_minutes: i64) -> SourceHealthMetric {
    SourceHealthMetric {
        source_id: source_id.into(),
        recorded_at: Utc::now() - TimeDelta::minutes(age_minutes),
        fetch_attempts: 10,
        fetch_successes: 10 - failures,
        fetch_failures: failures,
        listings_found: 42,
        new_listings: 3,
        delisted_listings: 1,
        last_error: if failures > 0 {
            Some("Upstream returned HTTP 503".into())
        } else {
            None
        },
        last_error_at: None,
    }
}

#[tokio::test]
async fn append_and_read_roundtrip() {
    let (pool, _container) = setup_test_db().await;
    let repo = HealthRepository::new(pool);

    repo.append_metric(&metric("src-a", 2, 0)).await.unwrap();

    let latest = repo.latest_metric("src-a").await.unwrap().unwrap();
    assert_eq!(latest.fetch_attempts, 10);
    assert_eq!(latest.fetch_failures, 2);
    assert_eq!(latest.listings_found, 42);
}

#[tokio::test]
async fn latest_metric_picks_newest() {
    let (pool, _container) = setup_test_db().await;
    let repo = HealthRepository::new(pool);

    repo.append_metric(&metric("src-a", 6, 60)).await.unwrap();
    repo.append_metric(&metric("src-a", 0, 0)).await.unwrap();

    let latest = repo.latest_metric("src-a").await.unwrap().unwrap();
    assert_eq!(latest.fetch_failures, 0);
    assert_eq!(HealthStatus::classify(&latest), HealthStatus::Healthy);
}

#[tokio::test]
async fn read_metrics_filters_and_orders_newest_first() {
    let (pool, _container) = setup_test_db().await;
    let repo = HealthRepository::new(pool);

    repo.append_metric(&metric("src-a", 1, 30)).await.unwrap();
    repo.append_metric(&metric("src-a", 2, 10)).await.unwrap();
    repo.append_metric(&metric("src-b", 3, 5)).await.unwrap();

    let for_a = repo.read_metrics(Some("src-a"), 10).await.unwrap();
    assert_eq!(for_a.len(), 2);
    assert_eq!(for_a[0].fetch_failures, 2, "newest first");

    let all = repo.read_metrics(None, 10).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].source_id, "src-b");
}

#[tokio::test]
async fn missing_source_has_no_metric() {
    let (pool, _container) = setup_test_db().await;
    let repo = HealthRepository::new(pool);

    assert!(repo.latest_metric("src-never").await.unwrap().is_none());
}
