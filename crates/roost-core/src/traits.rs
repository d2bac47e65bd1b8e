use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::health::SourceHealthMetric;
use crate::listing::{ListingRecord, NewListing};
use crate::source::SourceConfig;

/// Mutable fields refreshed when a listing is re-sighted by its own
/// source. Applied as one atomic write; `first_seen_at` and dedup flags
/// are never touched.
#[derive(Debug, Clone)]
pub struct SightingUpdate {
    pub price: i64,
    pub image_urls: Vec<String>,
    pub seen_at: DateTime<Utc>,
}

/// A fully resolved listing ready for insertion: the normalized fields
/// plus the dedup decision made by the listing store.
#[derive(Debug, Clone)]
pub struct InsertListing {
    pub listing: NewListing,
    pub canonical_key: String,
    /// Some(id) → this record is a duplicate of `id`.
    pub canonical_id: Option<Uuid>,
    pub seen_at: DateTime<Utc>,
}

/// Outcome of a conditional canonical insert.
#[derive(Debug, Clone)]
pub enum CanonicalInsert {
    Inserted(Uuid),
    /// A concurrent writer already holds the canonical slot for this key;
    /// the existing record is returned so the caller can degrade to a
    /// duplicate insert.
    Lost(ListingRecord),
}

/// Listing persistence.
///
/// Implementations must make each write a single conditional statement:
/// the canonical insert races are resolved by the backend (unique key on
/// the canonical slot), never by read-modify-write across round-trips.
pub trait ListingBackend: Send + Sync + Clone {
    /// Look up a listing by its per-source external key.
    fn find_by_key(
        &self,
        source_id: &str,
        source_key: &str,
    ) -> impl Future<Output = Result<Option<ListingRecord>, AppError>> + Send;

    /// Refresh mutable fields for a re-sighted listing and reactivate it
    /// if it was delisted. One atomic write.
    fn record_sighting(
        &self,
        id: Uuid,
        update: &SightingUpdate,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Find the canonical (non-duplicate) record for a key, owned by a
    /// different source.
    fn find_canonical(
        &self,
        canonical_key: &str,
        exclude_source: &str,
    ) -> impl Future<Output = Result<Option<ListingRecord>, AppError>> + Send;

    /// Insert a new canonical record unless another canonical record with
    /// the same key won the slot first.
    fn try_insert_canonical(
        &self,
        record: &InsertListing,
    ) -> impl Future<Output = Result<CanonicalInsert, AppError>> + Send;

    /// Insert a duplicate record referencing its canonical.
    /// `record.canonical_id` must be set.
    fn insert_duplicate(
        &self,
        record: &InsertListing,
    ) -> impl Future<Output = Result<Uuid, AppError>> + Send;

    /// Source keys of all currently active records for a source.
    fn active_keys(
        &self,
        source_id: &str,
    ) -> impl Future<Output = Result<Vec<String>, AppError>> + Send;

    /// Delist every active record of `source_id` whose key is not in
    /// `seen_keys`. Returns the number of records changed. Idempotent.
    fn delist_missing(
        &self,
        source_id: &str,
        seen_keys: &[String],
    ) -> impl Future<Output = Result<u64, AppError>> + Send;

    /// Canonical records, newest first. Duplicates never appear in
    /// public listing queries.
    fn list_canonical(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ListingRecord>, AppError>> + Send;
}

/// Append-only store of per-crawl health metrics.
pub trait HealthBackend: Send + Sync + Clone {
    fn append_metric(
        &self,
        metric: &SourceHealthMetric,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Most recent metric for a source, if any.
    fn latest_metric(
        &self,
        source_id: &str,
    ) -> impl Future<Output = Result<Option<SourceHealthMetric>, AppError>> + Send;

    /// Metric history, newest first. `source_id = None` returns all
    /// sources interleaved.
    fn read_metrics(
        &self,
        source_id: Option<&str>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<SourceHealthMetric>, AppError>> + Send;
}

/// Source configuration store.
pub trait SourceBackend: Send + Sync + Clone {
    fn get_source(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<SourceConfig>, AppError>> + Send;

    /// Sources ordered by priority ascending (most authoritative first).
    fn list_sources(
        &self,
        enabled_only: bool,
    ) -> impl Future<Output = Result<Vec<SourceConfig>, AppError>> + Send;

    fn upsert_source(
        &self,
        config: &SourceConfig,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}
