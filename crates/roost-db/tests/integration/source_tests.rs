use roost_core::source::{SourceConfig, SourceKind};
use roost_core::traits::SourceBackend;
use roost_db::SourceRepository;

use crate::common::setup_test_db;

fn api_source(id: &str, priority: i32) -> SourceConfig {
    SourceConfig::new(
        id,
        format!("{id} listings"),
        SourceKind::Api {
            endpoint: format!("https://{id}.example/api/listings"),
            api_key: Some("key".into()),
        },
    )
    .with_priority(priority)
}

#[tokio::test]
async fn upsert_and_get_roundtrips_tagged_kind() {
    let (pool, _container) = setup_test_db().await;
    let repo = SourceRepository::new(pool);

    let source = SourceConfig::new(
        "src-runs",
        "Scrapeworks",
        SourceKind::RunBasedService {
            endpoint: "https://api.scrapeworks.example/v2".into(),
            actor_id: "actor-9".into(),
            token: Some("tok".into()),
            results_limit: Some(100),
        },
    );
    repo.upsert_source(&source).await.unwrap();

    let stored = repo.get_source("src-runs").await.unwrap().unwrap();
    assert_eq!(stored.name, "Scrapeworks");
    match stored.kind {
        SourceKind::RunBasedService {
            actor_id,
            results_limit,
            ..
        } => {
            assert_eq!(actor_id, "actor-9");
            assert_eq!(results_limit, Some(100));
        }
        other => panic!("wrong kind: {}", other.as_str()),
    }
}

#[tokio::test]
async fn upsert_updates_in_place() {
    let (pool, _container) = setup_test_db().await;
    let repo = SourceRepository::new(pool);

    repo.upsert_source(&api_source("src-a", 10)).await.unwrap();

    let mut changed = api_source("src-a", 3);
    changed.enabled = false;
    repo.upsert_source(&changed).await.unwrap();

    let stored = repo.get_source("src-a").await.unwrap().unwrap();
    assert_eq!(stored.priority, 3);
    assert!(!stored.enabled);
}

#[tokio::test]
async fn list_orders_by_priority_and_filters_enabled() {
    let (pool, _container) = setup_test_db().await;
    let repo = SourceRepository::new(pool);

    repo.upsert_source(&api_source("src-slow", 50)).await.unwrap();
    repo.upsert_source(&api_source("src-fast", 1)).await.unwrap();
    let mut off = api_source("src-off", 2);
    off.enabled = false;
    repo.upsert_source(&off).await.unwrap();

    let all = repo.list_sources(false).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].id, "src-fast");

    let enabled = repo.list_sources(true).await.unwrap();
    assert_eq!(enabled.len(), 2);
    assert!(enabled.iter().all(|s| s.enabled));
}

#[tokio::test]
async fn get_missing_source_returns_none() {
    let (pool, _container) = setup_test_db().await;
    let repo = SourceRepository::new(pool);

    assert!(repo.get_source("src-nope").await.unwrap().is_none());
}
