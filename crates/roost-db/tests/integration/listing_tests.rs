use chrono::Utc;
use roost_core::dedup::ListingStore;
use roost_core::listing::{ListingStatus, NewListing};
use roost_core::traits::{CanonicalInsert, InsertListing, ListingBackend};
use roost_db::ListingRepository;

use crate::common::setup_test_db;

fn listing(source_id: &str, key: &str, street: &str) -> NewListing {
    NewListing {
        source_id: source_id.into(),
        source_listing_id: Some(key.into()),
        source_url: format!("https://{source_id}.example/listings/{key}"),
        street_address: street.into(),
        unit: None,
        neighborhood: Some("East Village".into()),
        borough: Some("Manhattan".into()),
        price: 3150,
        beds: 1.0,
        baths: 1.0,
        image_urls: vec![format!("https://{source_id}.example/img/{key}.jpg")],
    }
}

#[tokio::test]
async fn upsert_creates_then_resights() {
    let (pool, _container) = setup_test_db().await;
    let repo = ListingRepository::new(pool);
    let store = ListingStore::new(repo.clone());

    let item = listing("src-a", "L-1", "243 E 13th St");
    let t1 = Utc::now();
    let first = store.upsert_listing(&item, t1).await.unwrap();
    assert!(first.created);
    assert!(!first.is_duplicate);

    let mut updated = item.clone();
    updated.price = 3300;
    let t2 = t1 + chrono::TimeDelta::hours(12);
    let second = store.upsert_listing(&updated, t2).await.unwrap();
    assert!(!second.created);
    assert_eq!(second.id, first.id);

    let stored = repo.find_by_key("src-a", "L-1").await.unwrap().unwrap();
    assert_eq!(stored.price, 3300);
    assert_eq!(stored.status, ListingStatus::Active);
    assert!(stored.last_seen_at > stored.first_seen_at);
}

#[tokio::test]
async fn cross_source_duplicate_references_canonical() {
    let (pool, _container) = setup_test_db().await;
    let repo = ListingRepository::new(pool);
    let store = ListingStore::new(repo.clone());

    let x = store
        .upsert_listing(&listing("src-p", "P-1", "98 Kent Ave"), Utc::now())
        .await
        .unwrap();
    let y = store
        .upsert_listing(&listing("src-q", "Q-1", "98 Kent Avenue"), Utc::now())
        .await
        .unwrap();

    assert!(!x.is_duplicate);
    assert!(y.is_duplicate);

    let stored = repo.find_by_key("src-q", "Q-1").await.unwrap().unwrap();
    assert_eq!(stored.canonical_id, Some(x.id));
}

#[tokio::test]
async fn canonical_slot_is_exclusive() {
    let (pool, _container) = setup_test_db().await;
    let repo = ListingRepository::new(pool);

    let item = listing("src-a", "L-1", "11 Broadway");
    let record = InsertListing {
        canonical_key: item.canonical_key(),
        listing: item,
        canonical_id: None,
        seen_at: Utc::now(),
    };

    let first = repo.try_insert_canonical(&record).await.unwrap();
    let winner_id = match first {
        CanonicalInsert::Inserted(id) => id,
        CanonicalInsert::Lost(_) => panic!("first insert should win the slot"),
    };

    let mut rival_item = listing("src-b", "B-1", "11 Broadway");
    rival_item.source_url = "https://src-b.example/listings/B-1".into();
    let rival = InsertListing {
        canonical_key: rival_item.canonical_key(),
        listing: rival_item,
        canonical_id: None,
        seen_at: Utc::now(),
    };

    match repo.try_insert_canonical(&rival).await.unwrap() {
        CanonicalInsert::Lost(existing) => assert_eq!(existing.id, winner_id),
        CanonicalInsert::Inserted(_) => panic!("second insert must lose the slot"),
    }
}

#[tokio::test]
async fn delist_missing_is_set_based_and_idempotent() {
    let (pool, _container) = setup_test_db().await;
    let repo = ListingRepository::new(pool);
    let store = ListingStore::new(repo.clone());

    for (key, street) in [("A", "1 Main St"), ("B", "2 Main St"), ("C", "3 Main St")] {
        store
            .upsert_listing(&listing("src-s", key, street), Utc::now())
            .await
            .unwrap();
    }

    let seen = vec!["A".to_string(), "C".to_string()];
    assert_eq!(repo.delist_missing("src-s", &seen).await.unwrap(), 1);
    assert_eq!(repo.delist_missing("src-s", &seen).await.unwrap(), 0);

    let b = repo.find_by_key("src-s", "B").await.unwrap().unwrap();
    assert_eq!(b.status, ListingStatus::Delisted);

    let active = repo.active_keys("src-s").await.unwrap();
    assert_eq!(active.len(), 2);
    assert!(active.contains(&"A".to_string()));
    assert!(active.contains(&"C".to_string()));
}

#[tokio::test]
async fn list_canonical_excludes_duplicates() {
    let (pool, _container) = setup_test_db().await;
    let repo = ListingRepository::new(pool);
    let store = ListingStore::new(repo.clone());

    store
        .upsert_listing(&listing("src-p", "P-1", "98 Kent Ave"), Utc::now())
        .await
        .unwrap();
    store
        .upsert_listing(&listing("src-q", "Q-1", "98 Kent Ave"), Utc::now())
        .await
        .unwrap();

    let canonical = repo.list_canonical(10).await.unwrap();
    assert_eq!(canonical.len(), 1);
    assert_eq!(canonical[0].source_id, "src-p");
}
