use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::listing::NewListing;
use crate::traits::{CanonicalInsert, InsertListing, ListingBackend, SightingUpdate};

/// Result of an upsert-with-dedup operation.
#[derive(Debug, Clone, Copy)]
pub struct UpsertOutcome {
    pub id: Uuid,
    /// A new record was inserted (canonical or duplicate).
    pub created: bool,
    pub is_duplicate: bool,
}

/// Deduplicating listing store.
///
/// Owns the ListingRecord lifecycle: same-source re-sightings, the
/// cross-source canonical/duplicate decision, and delisting. Callers
/// (the orchestrator) never mutate records directly.
#[derive(Clone)]
pub struct ListingStore<B: ListingBackend> {
    backend: B,
}

impl<B: ListingBackend> ListingStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Upsert one normalized listing.
    ///
    /// 1. Known `(source_id, source_key)` → same-source re-sighting:
    ///    refresh price/images/last_seen_at, reactivate if delisted.
    /// 2. Otherwise, a canonical record with the same matching key from
    ///    another source makes this a duplicate referencing it.
    /// 3. Otherwise insert as canonical; if a concurrent writer took the
    ///    canonical slot first, degrade to a duplicate of the winner —
    ///    earliest-seen canonical wins.
    pub async fn upsert_listing(
        &self,
        item: &NewListing,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome, AppError> {
        if let Some(existing) = self
            .backend
            .find_by_key(&item.source_id, item.source_key())
            .await?
        {
            let update = SightingUpdate {
                price: item.price,
                image_urls: item.image_urls.clone(),
                seen_at: now,
            };
            self.backend.record_sighting(existing.id, &update).await?;
            return Ok(UpsertOutcome {
                id: existing.id,
                created: false,
                is_duplicate: existing.is_duplicate,
            });
        }

        let canonical_key = item.canonical_key();

        if let Some(canonical) = self
            .backend
            .find_canonical(&canonical_key, &item.source_id)
            .await?
        {
            let record = InsertListing {
                listing: item.clone(),
                canonical_key,
                canonical_id: Some(canonical.id),
                seen_at: now,
            };
            let id = self.backend.insert_duplicate(&record).await?;
            tracing::debug!(
                source_id = %item.source_id,
                canonical_id = %canonical.id,
                "Inserted cross-source duplicate"
            );
            return Ok(UpsertOutcome {
                id,
                created: true,
                is_duplicate: true,
            });
        }

        let record = InsertListing {
            listing: item.clone(),
            canonical_key,
            canonical_id: None,
            seen_at: now,
        };
        match self.backend.try_insert_canonical(&record).await? {
            CanonicalInsert::Inserted(id) => Ok(UpsertOutcome {
                id,
                created: true,
                is_duplicate: false,
            }),
            CanonicalInsert::Lost(winner) => {
                tracing::debug!(
                    source_id = %item.source_id,
                    winner_source = %winner.source_id,
                    "Lost canonical race, inserting as duplicate"
                );
                let record = InsertListing {
                    canonical_id: Some(winner.id),
                    ..record
                };
                let id = self.backend.insert_duplicate(&record).await?;
                Ok(UpsertOutcome {
                    id,
                    created: true,
                    is_duplicate: true,
                })
            }
        }
    }

    /// Delist every active record of `source_id` whose key was not seen
    /// in this run. Idempotent; returns the number of records changed.
    pub async fn mark_listings_delisted(
        &self,
        source_id: &str,
        seen_keys: &[String],
    ) -> Result<u64, AppError> {
        self.backend.delist_missing(source_id, seen_keys).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::ListingStatus;
    use crate::testutil::{MemoryStore, make_test_listing};
    use crate::traits::ListingBackend;

    #[tokio::test]
    async fn upsert_twice_is_idempotent() {
        let backend = MemoryStore::new();
        let store = ListingStore::new(backend.clone());
        let item = make_test_listing("src-a", "L-1");

        let t1 = Utc::now();
        let first = store.upsert_listing(&item, t1).await.unwrap();
        assert!(first.created);
        assert!(!first.is_duplicate);

        let t2 = t1 + chrono::TimeDelta::hours(6);
        let second = store.upsert_listing(&item, t2).await.unwrap();
        assert!(!second.created);
        assert_eq!(second.id, first.id);
        assert_eq!(backend.listing_count(), 1);

        let stored = backend
            .find_by_key("src-a", "L-1")
            .await
            .unwrap()
            .expect("record exists");
        assert_eq!(stored.first_seen_at, t1);
        assert_eq!(stored.last_seen_at, t2);
    }

    #[tokio::test]
    async fn resighting_updates_price_and_reactivates() {
        let backend = MemoryStore::new();
        let store = ListingStore::new(backend.clone());
        let mut item = make_test_listing("src-a", "L-1");

        store.upsert_listing(&item, Utc::now()).await.unwrap();
        let delisted = store
            .mark_listings_delisted("src-a", &["other-key".into()])
            .await
            .unwrap();
        assert_eq!(delisted, 1);

        item.price = 2850;
        store.upsert_listing(&item, Utc::now()).await.unwrap();

        let stored = backend
            .find_by_key("src-a", "L-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, ListingStatus::Active);
        assert_eq!(stored.price, 2850);
    }

    #[tokio::test]
    async fn cross_source_match_becomes_duplicate() {
        let backend = MemoryStore::new();
        let store = ListingStore::new(backend.clone());

        // Source P (priority 1) lands first and becomes canonical.
        let x = make_test_listing("src-p", "P-1");
        let x_out = store.upsert_listing(&x, Utc::now()).await.unwrap();
        assert!(!x_out.is_duplicate);

        // Source Q reports the same unit (same address/beds/price bucket).
        let mut y = make_test_listing("src-q", "Q-77");
        y.price = x.price + 40; // still inside the bucket
        let y_out = store.upsert_listing(&y, Utc::now()).await.unwrap();
        assert!(y_out.created);
        assert!(y_out.is_duplicate);

        let stored_y = backend.find_by_key("src-q", "Q-77").await.unwrap().unwrap();
        assert!(stored_y.is_duplicate);
        assert_eq!(stored_y.canonical_id, Some(x_out.id));

        let stored_x = backend.find_by_key("src-p", "P-1").await.unwrap().unwrap();
        assert!(!stored_x.is_duplicate);
        assert!(stored_x.canonical_id.is_none());
    }

    #[tokio::test]
    async fn different_units_do_not_match() {
        let backend = MemoryStore::new();
        let store = ListingStore::new(backend.clone());

        let mut a = make_test_listing("src-p", "P-1");
        a.unit = Some("4B".into());
        let mut b = make_test_listing("src-q", "Q-1");
        b.unit = Some("5A".into());

        store.upsert_listing(&a, Utc::now()).await.unwrap();
        let out = store.upsert_listing(&b, Utc::now()).await.unwrap();
        assert!(!out.is_duplicate);
    }

    #[tokio::test]
    async fn lost_canonical_race_degrades_to_duplicate() {
        let backend = MemoryStore::new();
        let store = ListingStore::new(backend.clone());

        let winner = make_test_listing("src-p", "P-1");
        let w = store.upsert_listing(&winner, Utc::now()).await.unwrap();

        // A second listing from the *same* source with the same matching
        // key misses the cross-source lookup and collides on the
        // canonical slot instead.
        let rival = make_test_listing("src-p", "P-2");
        let out = store.upsert_listing(&rival, Utc::now()).await.unwrap();
        assert!(out.created);
        assert!(out.is_duplicate);

        let stored = backend.find_by_key("src-p", "P-2").await.unwrap().unwrap();
        assert_eq!(stored.canonical_id, Some(w.id));
    }

    #[tokio::test]
    async fn delisting_is_precise_and_idempotent() {
        let backend = MemoryStore::new();
        let store = ListingStore::new(backend.clone());

        for key in ["A", "B", "C"] {
            let mut item = make_test_listing("src-s", key);
            // Distinct units so the three records stay canonical.
            item.unit = Some(key.to_string());
            store.upsert_listing(&item, Utc::now()).await.unwrap();
        }

        let seen = vec!["A".to_string(), "C".to_string()];
        let delisted = store.mark_listings_delisted("src-s", &seen).await.unwrap();
        assert_eq!(delisted, 1);

        let b = backend.find_by_key("src-s", "B").await.unwrap().unwrap();
        assert_eq!(b.status, ListingStatus::Delisted);
        for key in ["A", "C"] {
            let rec = backend.find_by_key("src-s", key).await.unwrap().unwrap();
            assert_eq!(rec.status, ListingStatus::Active);
        }

        // Second identical call changes nothing further.
        let again = store.mark_listings_delisted("src-s", &seen).await.unwrap();
        assert_eq!(again, 0);
    }

    #[tokio::test]
    async fn duplicates_never_surface_in_canonical_queries() {
        let backend = MemoryStore::new();
        let store = ListingStore::new(backend.clone());

        store
            .upsert_listing(&make_test_listing("src-p", "P-1"), Utc::now())
            .await
            .unwrap();
        store
            .upsert_listing(&make_test_listing("src-q", "Q-1"), Utc::now())
            .await
            .unwrap();

        let canonical = backend.list_canonical(10).await.unwrap();
        assert_eq!(canonical.len(), 1);
        assert!(!canonical[0].is_duplicate);
    }
}
