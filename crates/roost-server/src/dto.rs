use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use roost_core::crawl::CrawlResult;
use roost_core::job::CrawlJob;
use roost_core::listing::ListingRecord;
use roost_core::registry::SourceHealthReport;
use roost_core::source::SourceConfig;

// ---------------------------------------------------------------------------
// Crawls
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct CrawlRequest {
    /// Maximum pages to fetch this run
    pub max_pages: Option<u32>,
    /// Maximum items to collect this run
    pub max_listings: Option<usize>,
    /// Preview only: fetch and normalize without touching the store
    #[serde(default)]
    pub dry_run: bool,
    /// Schedule on the background worker pool instead of running inline
    #[serde(default, rename = "async")]
    pub run_async: bool,
    /// Job priority for the async path (lower runs first)
    pub priority: Option<i32>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CrawlResponse {
    pub listings_found: u32,
    pub new_listings: u32,
    pub delisted_listings: u32,
    pub errors: Vec<String>,
    pub delisting_skipped: bool,
    pub rate_limited: bool,
}

impl From<CrawlResult> for CrawlResponse {
    fn from(result: CrawlResult) -> Self {
        Self {
            listings_found: result.listings_found,
            new_listings: result.new_listings,
            delisted_listings: result.delisted_listings,
            errors: result.errors,
            delisting_skipped: result.delisting_skipped,
            rate_limited: result.rate_limited,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ScheduledResponse {
    pub job_id: Uuid,
    pub status: &'static str,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ScheduleAllResponse {
    pub scheduled: usize,
    pub job_ids: Vec<Uuid>,
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct JobResponse {
    pub id: Uuid,
    pub source_id: String,
    pub priority: i32,
    pub state: String,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub result: Option<CrawlResponse>,
    pub error: Option<String>,
}

impl From<CrawlJob> for JobResponse {
    fn from(job: CrawlJob) -> Self {
        Self {
            id: job.id,
            source_id: job.source_id,
            priority: job.priority,
            state: job.state.to_string(),
            scheduled_at: job.scheduled_at,
            started_at: job.started_at,
            finished_at: job.finished_at,
            result: job.result.map(CrawlResponse::from),
            error: job.error,
        }
    }
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListJobsQuery {
    pub state: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct JobListResponse {
    pub jobs: Vec<JobResponse>,
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Source summary. Connection parameters (and any credentials they carry)
/// deliberately never leave the server.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SourceResponse {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub enabled: bool,
    pub priority: i32,
}

impl From<SourceConfig> for SourceResponse {
    fn from(config: SourceConfig) -> Self {
        Self {
            kind: config.kind.as_str().to_string(),
            id: config.id,
            name: config.name,
            enabled: config.enabled,
            priority: config.priority,
        }
    }
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListSourcesQuery {
    pub enabled_only: Option<bool>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SourceListResponse {
    pub sources: Vec<SourceResponse>,
    pub total: usize,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SourceHealthResponse {
    pub source_id: String,
    pub name: String,
    pub enabled: bool,
    pub status: String,
    pub failure_rate: f64,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
}

impl From<SourceHealthReport> for SourceHealthResponse {
    fn from(report: SourceHealthReport) -> Self {
        Self {
            source_id: report.source_id,
            name: report.name,
            enabled: report.enabled,
            status: report.status.to_string(),
            failure_rate: report.failure_rate,
            last_error: report.last_error,
            last_error_at: report.last_error_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListListingsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ListingResponse {
    pub id: Uuid,
    pub source_id: String,
    pub source_url: String,
    pub street_address: String,
    pub unit: Option<String>,
    pub neighborhood: Option<String>,
    pub borough: Option<String>,
    pub price: i64,
    pub beds: f64,
    pub baths: f64,
    pub image_urls: Vec<String>,
    pub status: String,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl From<ListingRecord> for ListingResponse {
    fn from(record: ListingRecord) -> Self {
        Self {
            id: record.id,
            source_id: record.source_id,
            source_url: record.source_url,
            street_address: record.street_address,
            unit: record.unit,
            neighborhood: record.neighborhood,
            borough: record.borough,
            price: record.price,
            beds: record.beds,
            baths: record.baths,
            image_urls: record.image_urls,
            status: record.status.to_string(),
            first_seen_at: record.first_seen_at,
            last_seen_at: record.last_seen_at,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ListingListResponse {
    pub listings: Vec<ListingResponse>,
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
