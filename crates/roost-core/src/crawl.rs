use std::future::Future;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::adapter::{AdapterFactory, SourceAdapter};
use crate::dedup::ListingStore;
use crate::error::AppError;
use crate::health::SourceHealthMetric;
use crate::listing::NewListing;
use crate::pacing::PacingConfig;
use crate::traits::{HealthBackend, ListingBackend, SourceBackend};

/// Pages fetched per run when the caller does not set a limit.
pub const DEFAULT_MAX_PAGES: u32 = 10;
/// Items collected per run when the caller does not set a limit.
pub const DEFAULT_MAX_LISTINGS: usize = 500;

/// Per-run options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlOptions {
    pub max_pages: Option<u32>,
    pub max_listings: Option<usize>,
    /// Fetch and normalize only; no store mutation of any kind.
    #[serde(default)]
    pub dry_run: bool,
}

impl CrawlOptions {
    pub fn with_max_pages(mut self, max: u32) -> Self {
        self.max_pages = Some(max);
        self
    }

    pub fn with_max_listings(mut self, max: usize) -> Self {
        self.max_listings = Some(max);
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }
}

/// Outcome of one crawl run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    pub listings_found: u32,
    pub new_listings: u32,
    pub delisted_listings: u32,
    /// Per-item failures absorbed during the run.
    pub errors: Vec<String>,
    /// True when a zero-item non-dry run skipped the delisting pass.
    pub delisting_skipped: bool,
    /// True when the source rate-limited us; the scheduler extends the
    /// source's effective delay before its next attempt.
    pub rate_limited: bool,
}

/// Executes crawls. Implemented by [`CrawlService`]; the worker pool
/// depends on this trait so tests can substitute a scripted runner.
pub trait CrawlRunner: Send + Sync + Clone + 'static {
    fn run_crawl(
        &self,
        source_id: &str,
        options: &CrawlOptions,
    ) -> impl Future<Output = Result<CrawlResult, AppError>> + Send;
}

/// Orchestrates one crawl end-to-end:
/// resolve source → fetch/normalize page-by-page → upsert with dedup →
/// delist unseen keys → record health metric.
///
/// Generic over the adapter factory and all storage backends, enabling
/// substitution with in-memory fakes in tests.
#[derive(Clone)]
pub struct CrawlService<AF, LB, HB, SB>
where
    AF: AdapterFactory,
    LB: ListingBackend,
    HB: HealthBackend,
    SB: SourceBackend,
{
    factory: AF,
    store: ListingStore<LB>,
    health: HB,
    sources: SB,
}

impl<AF, LB, HB, SB> CrawlService<AF, LB, HB, SB>
where
    AF: AdapterFactory,
    LB: ListingBackend,
    HB: HealthBackend,
    SB: SourceBackend,
{
    pub fn new(factory: AF, store: ListingStore<LB>, health: HB, sources: SB) -> Self {
        Self {
            factory,
            store,
            health,
            sources,
        }
    }

    /// Run a single-pass crawl for one source.
    ///
    /// Fatal errors (unknown source, bad configuration, missing
    /// credentials) abort before any store mutation and record no health
    /// metric. Transient fetch failures stop pagination but keep the
    /// items already collected.
    pub async fn run_crawl(
        &self,
        source_id: &str,
        options: &CrawlOptions,
    ) -> Result<CrawlResult, AppError> {
        let source = self
            .sources
            .get_source(source_id)
            .await?
            .ok_or_else(|| AppError::SourceNotFound(source_id.to_string()))?;

        // Credential/config problems surface here, before any fetch.
        let adapter = self.factory.create(&source)?;
        let pacing = PacingConfig::for_policy(&source.policy);

        let max_pages = options.max_pages.unwrap_or(DEFAULT_MAX_PAGES);
        let max_listings = options.max_listings.unwrap_or(DEFAULT_MAX_LISTINGS);

        let mut items: Vec<NewListing> = Vec::new();
        let mut errors: Vec<String> = Vec::new();
        let mut fetch_attempts = 0u32;
        let mut fetch_successes = 0u32;
        let mut fetch_failures = 0u32;
        let mut last_error = None;
        let mut last_error_at = None;
        let mut rate_limited = false;

        let mut page_token: Option<String> = None;
        let mut pages_fetched = 0u32;

        loop {
            if pages_fetched >= max_pages || items.len() >= max_listings {
                break;
            }
            if pages_fetched > 0 {
                tokio::time::sleep(pacing.effective_delay()).await;
            }

            fetch_attempts += 1;
            match adapter.fetch_page(&source, page_token.as_deref()).await {
                Ok(page) => {
                    fetch_successes += 1;
                    for raw in &page.items {
                        if items.len() >= max_listings {
                            break;
                        }
                        match adapter.normalize(&source, raw) {
                            Ok(listing) => items.push(listing),
                            Err(e) => {
                                tracing::debug!(source_id = %source.id, error = %e, "Skipping unparseable item");
                                errors.push(e.to_string());
                            }
                        }
                    }
                    pages_fetched += 1;
                    page_token = page.next_page_token;
                    if page_token.is_none() {
                        break;
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    fetch_failures += 1;
                    if matches!(e, AppError::RateLimitExceeded) {
                        rate_limited = true;
                    }
                    tracing::warn!(
                        source_id = %source.id,
                        error = %e,
                        "Fetch failed, stopping pagination for this run"
                    );
                    errors.push(format!("fetch: {e}"));
                    last_error = Some(e.to_string());
                    last_error_at = Some(Utc::now());
                    break;
                }
            }
        }

        tracing::info!(
            source_id = %source.id,
            pages = pages_fetched,
            items = items.len(),
            dry_run = options.dry_run,
            "Crawl collection finished"
        );

        if options.dry_run {
            return Ok(CrawlResult {
                listings_found: items.len() as u32,
                new_listings: 0,
                delisted_listings: 0,
                errors,
                delisting_skipped: false,
                rate_limited,
            });
        }

        let now = Utc::now();
        let mut new_listings = 0u32;
        let mut seen_keys = Vec::with_capacity(items.len());
        for item in &items {
            let outcome = self.store.upsert_listing(item, now).await?;
            if outcome.created && !outcome.is_duplicate {
                new_listings += 1;
            }
            seen_keys.push(item.source_key().to_string());
        }

        // Delisting runs only after every upsert, and never on an empty
        // run: zero items almost always means the fetch failed, not that
        // the market cleared.
        let (delisted, delisting_skipped) = if items.is_empty() {
            tracing::warn!(source_id = %source.id, "Zero-item run, skipping delisting pass");
            (0u64, true)
        } else {
            let count = self
                .store
                .mark_listings_delisted(&source.id, &seen_keys)
                .await?;
            (count, false)
        };

        let metric = SourceHealthMetric {
            source_id: source.id.clone(),
            recorded_at: now,
            fetch_attempts,
            fetch_successes,
            fetch_failures,
            listings_found: items.len() as u32,
            new_listings,
            delisted_listings: delisted as u32,
            last_error,
            last_error_at,
        };
        self.health.append_metric(&metric).await?;

        Ok(CrawlResult {
            listings_found: items.len() as u32,
            new_listings,
            delisted_listings: delisted as u32,
            errors,
            delisting_skipped,
            rate_limited,
        })
    }
}

impl<AF, LB, HB, SB> CrawlRunner for CrawlService<AF, LB, HB, SB>
where
    AF: AdapterFactory + 'static,
    LB: ListingBackend + 'static,
    HB: HealthBackend + 'static,
    SB: SourceBackend + 'static,
{
    async fn run_crawl(
        &self,
        source_id: &str,
        options: &CrawlOptions,
    ) -> Result<CrawlResult, AppError> {
        CrawlService::run_crawl(self, source_id, options).await
    }
}
