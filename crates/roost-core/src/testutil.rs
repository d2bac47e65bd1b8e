//! Test utilities: an in-memory store and mock implementations of the
//! adapter, factory, and runner traits.
//!
//! Handwritten mocks for dependency injection in unit tests. All mocks
//! use `Arc<Mutex<_>>` for interior mutability, allowing test assertions
//! on recorded calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::adapter::{AdapterFactory, FetchPage, RawItem, SourceAdapter};
use crate::crawl::{CrawlOptions, CrawlResult, CrawlRunner};
use crate::error::AppError;
use crate::health::SourceHealthMetric;
use crate::listing::{ListingRecord, ListingStatus, NewListing};
use crate::scheduler::{WorkerEvent, WorkerReporter};
use crate::source::{Difficulty, ScrapePolicy, SourceConfig, SourceKind};
use crate::traits::{
    CanonicalInsert, HealthBackend, InsertListing, ListingBackend, SightingUpdate, SourceBackend,
};

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryInner {
    listings: Vec<ListingRecord>,
    metrics: Vec<SourceHealthMetric>,
    sources: HashMap<String, SourceConfig>,
}

/// In-memory implementation of all three storage traits, mirroring the
/// PostgreSQL repositories' semantics.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listing_count(&self) -> usize {
        self.inner.lock().unwrap().listings.len()
    }

    pub fn metric_count(&self) -> usize {
        self.inner.lock().unwrap().metrics.len()
    }

    pub fn add_source(&self, config: SourceConfig) {
        self.inner
            .lock()
            .unwrap()
            .sources
            .insert(config.id.clone(), config);
    }

    /// Append a metric without going through the async trait.
    pub fn append_metric_sync(&self, metric: SourceHealthMetric) {
        self.inner.lock().unwrap().metrics.push(metric);
    }

    fn build_record(record: &InsertListing, is_duplicate: bool) -> ListingRecord {
        let listing = &record.listing;
        ListingRecord {
            id: Uuid::new_v4(),
            source_id: listing.source_id.clone(),
            source_listing_id: listing.source_listing_id.clone(),
            source_url: listing.source_url.clone(),
            street_address: listing.street_address.clone(),
            unit: listing.unit.clone(),
            neighborhood: listing.neighborhood.clone(),
            borough: listing.borough.clone(),
            price: listing.price,
            beds: listing.beds,
            baths: listing.baths,
            image_urls: listing.image_urls.clone(),
            first_seen_at: record.seen_at,
            last_seen_at: record.seen_at,
            status: ListingStatus::Active,
            is_duplicate,
            canonical_id: record.canonical_id,
            canonical_key: record.canonical_key.clone(),
        }
    }
}

impl ListingBackend for MemoryStore {
    async fn find_by_key(
        &self,
        source_id: &str,
        source_key: &str,
    ) -> Result<Option<ListingRecord>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .listings
            .iter()
            .find(|l| l.source_id == source_id && l.source_key() == source_key)
            .cloned())
    }

    async fn record_sighting(&self, id: Uuid, update: &SightingUpdate) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        let listing = inner
            .listings
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| AppError::DatabaseError(format!("no listing with id {id}")))?;
        listing.price = update.price;
        listing.image_urls = update.image_urls.clone();
        listing.last_seen_at = update.seen_at;
        listing.status = ListingStatus::Active;
        Ok(())
    }

    async fn find_canonical(
        &self,
        canonical_key: &str,
        exclude_source: &str,
    ) -> Result<Option<ListingRecord>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .listings
            .iter()
            .find(|l| {
                !l.is_duplicate
                    && l.canonical_key == canonical_key
                    && l.source_id != exclude_source
            })
            .cloned())
    }

    async fn try_insert_canonical(
        &self,
        record: &InsertListing,
    ) -> Result<CanonicalInsert, AppError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner
            .listings
            .iter()
            .find(|l| !l.is_duplicate && l.canonical_key == record.canonical_key)
        {
            return Ok(CanonicalInsert::Lost(existing.clone()));
        }
        let stored = Self::build_record(record, false);
        let id = stored.id;
        inner.listings.push(stored);
        Ok(CanonicalInsert::Inserted(id))
    }

    async fn insert_duplicate(&self, record: &InsertListing) -> Result<Uuid, AppError> {
        debug_assert!(record.canonical_id.is_some());
        let mut inner = self.inner.lock().unwrap();
        let stored = Self::build_record(record, true);
        let id = stored.id;
        inner.listings.push(stored);
        Ok(id)
    }

    async fn active_keys(&self, source_id: &str) -> Result<Vec<String>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .listings
            .iter()
            .filter(|l| l.source_id == source_id && l.status == ListingStatus::Active)
            .map(|l| l.source_key().to_string())
            .collect())
    }

    async fn delist_missing(
        &self,
        source_id: &str,
        seen_keys: &[String],
    ) -> Result<u64, AppError> {
        let mut inner = self.inner.lock().unwrap();
        let mut count = 0u64;
        for listing in inner.listings.iter_mut() {
            if listing.source_id == source_id
                && listing.status == ListingStatus::Active
                && !seen_keys.iter().any(|k| k == listing.source_key())
            {
                listing.status = ListingStatus::Delisted;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn list_canonical(&self, limit: usize) -> Result<Vec<ListingRecord>, AppError> {
        let inner = self.inner.lock().unwrap();
        let mut listings: Vec<ListingRecord> = inner
            .listings
            .iter()
            .filter(|l| !l.is_duplicate)
            .cloned()
            .collect();
        listings.sort_by(|a, b| b.first_seen_at.cmp(&a.first_seen_at));
        listings.truncate(limit);
        Ok(listings)
    }
}

impl HealthBackend for MemoryStore {
    async fn append_metric(&self, metric: &SourceHealthMetric) -> Result<(), AppError> {
        self.inner.lock().unwrap().metrics.push(metric.clone());
        Ok(())
    }

    async fn latest_metric(
        &self,
        source_id: &str,
    ) -> Result<Option<SourceHealthMetric>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .metrics
            .iter()
            .filter(|m| m.source_id == source_id)
            .next_back()
            .cloned())
    }

    async fn read_metrics(
        &self,
        source_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SourceHealthMetric>, AppError> {
        let inner = self.inner.lock().unwrap();
        let mut metrics: Vec<SourceHealthMetric> = inner
            .metrics
            .iter()
            .filter(|m| source_id.is_none_or(|s| m.source_id == s))
            .cloned()
            .collect();
        metrics.reverse();
        metrics.truncate(limit);
        Ok(metrics)
    }
}

impl SourceBackend for MemoryStore {
    async fn get_source(&self, id: &str) -> Result<Option<SourceConfig>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.sources.get(id).cloned())
    }

    async fn list_sources(&self, enabled_only: bool) -> Result<Vec<SourceConfig>, AppError> {
        let inner = self.inner.lock().unwrap();
        let mut sources: Vec<SourceConfig> = inner
            .sources
            .values()
            .filter(|s| !enabled_only || s.enabled)
            .cloned()
            .collect();
        sources.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.id.cmp(&b.id)));
        Ok(sources)
    }

    async fn upsert_source(&self, config: &SourceConfig) -> Result<(), AppError> {
        self.inner
            .lock()
            .unwrap()
            .sources
            .insert(config.id.clone(), config.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockAdapter
// ---------------------------------------------------------------------------

/// Mock adapter fed a script of pages. Raw items are JSON-encoded
/// [`NewListing`] values; `normalize` decodes them, so malformed JSON
/// exercises the parse-failure path.
#[derive(Clone)]
pub struct MockAdapter {
    pages: Arc<Mutex<Vec<Result<FetchPage, AppError>>>>,
    fetches: Arc<Mutex<u32>>,
}

impl MockAdapter {
    pub fn with_pages(pages: Vec<Result<FetchPage, AppError>>) -> Self {
        Self {
            pages: Arc::new(Mutex::new(pages)),
            fetches: Arc::new(Mutex::new(0)),
        }
    }

    pub fn fetch_count(&self) -> u32 {
        *self.fetches.lock().unwrap()
    }
}

impl SourceAdapter for MockAdapter {
    async fn fetch_page(
        &self,
        _source: &SourceConfig,
        _page_token: Option<&str>,
    ) -> Result<FetchPage, AppError> {
        *self.fetches.lock().unwrap() += 1;
        let mut pages = self.pages.lock().unwrap();
        if pages.is_empty() {
            Ok(FetchPage {
                items: vec![],
                next_page_token: None,
            })
        } else {
            pages.remove(0)
        }
    }

    fn normalize(&self, _source: &SourceConfig, raw: &RawItem) -> Result<NewListing, AppError> {
        serde_json::from_value(raw.clone()).map_err(|e| AppError::ParseError(e.to_string()))
    }
}

/// Encode a listing as the raw item [`MockAdapter::normalize`] expects.
pub fn make_raw_item(listing: &NewListing) -> RawItem {
    serde_json::to_value(listing).unwrap()
}

// ---------------------------------------------------------------------------
// MockAdapterFactory
// ---------------------------------------------------------------------------

/// Factory handing out clones of one mock adapter, or failing at create
/// time to exercise the fatal-configuration path.
#[derive(Clone)]
pub struct MockAdapterFactory {
    adapter: MockAdapter,
    create_error: Arc<Mutex<Option<AppError>>>,
}

impl MockAdapterFactory {
    pub fn new(adapter: MockAdapter) -> Self {
        Self {
            adapter,
            create_error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_create_error(error: AppError) -> Self {
        Self {
            adapter: MockAdapter::with_pages(vec![]),
            create_error: Arc::new(Mutex::new(Some(error))),
        }
    }
}

impl AdapterFactory for MockAdapterFactory {
    type Adapter = MockAdapter;

    fn create(&self, _source: &SourceConfig) -> Result<MockAdapter, AppError> {
        let mut err = self.create_error.lock().unwrap();
        if let Some(e) = err.take() {
            return Err(e);
        }
        Ok(self.adapter.clone())
    }
}

// ---------------------------------------------------------------------------
// MockRunner
// ---------------------------------------------------------------------------

/// Scripted [`CrawlRunner`] for scheduler/worker tests.
#[derive(Clone)]
pub struct MockRunner {
    results: Arc<Mutex<Vec<Result<CrawlResult, AppError>>>>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockRunner {
    pub fn with_results(results: Vec<Result<CrawlResult, AppError>>) -> Self {
        Self {
            results: Arc::new(Mutex::new(results)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl CrawlRunner for MockRunner {
    async fn run_crawl(
        &self,
        source_id: &str,
        _options: &CrawlOptions,
    ) -> Result<CrawlResult, AppError> {
        self.calls.lock().unwrap().push(source_id.to_string());
        let mut results = self.results.lock().unwrap();
        if results.is_empty() {
            Ok(make_test_result(0, 0))
        } else {
            results.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Worker reporter that records event labels.
#[derive(Default, Clone)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkerReporter for MockReporter {
    fn report(&self, event: WorkerEvent<'_>) {
        let label = match &event {
            WorkerEvent::Started { .. } => "Started",
            WorkerEvent::JobStarted { .. } => "JobStarted",
            WorkerEvent::JobSucceeded { .. } => "JobSucceeded",
            WorkerEvent::JobFailed { .. } => "JobFailed",
            WorkerEvent::Stopped { .. } => "Stopped",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------

/// A direct-HTML source with a fast policy so tests spend little time in
/// inter-page sleeps.
pub fn make_test_source(id: &str) -> SourceConfig {
    SourceConfig::new(
        id,
        format!("{id} listings"),
        SourceKind::DirectHtml {
            list_url: format!("https://{id}.example/listings"),
            item_selector: None,
        },
    )
    .with_priority(10)
    .with_policy(ScrapePolicy {
        refresh_interval_minutes: 60,
        requires_js: false,
        difficulty: Difficulty::Easy,
    })
}

/// A one-bed at a fixed address; tests vary fields as needed.
pub fn make_test_listing(source_id: &str, key: &str) -> NewListing {
    NewListing {
        source_id: source_id.into(),
        source_listing_id: Some(key.into()),
        source_url: format!("https://{source_id}.example/listings/{key}"),
        street_address: "243 E 13th St".into(),
        unit: None,
        neighborhood: Some("East Village".into()),
        borough: Some("Manhattan".into()),
        price: 3150,
        beds: 1.0,
        baths: 1.0,
        image_urls: vec![format!("https://{source_id}.example/img/{key}.jpg")],
    }
}

pub fn make_test_result(listings_found: u32, new_listings: u32) -> CrawlResult {
    CrawlResult {
        listings_found,
        new_listings,
        delisted_listings: 0,
        errors: vec![],
        delisting_skipped: false,
        rate_limited: false,
    }
}
