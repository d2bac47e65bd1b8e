pub mod adapter;
pub mod crawl;
pub mod dedup;
pub mod error;
pub mod health;
pub mod job;
pub mod listing;
pub mod pacing;
pub mod registry;
pub mod scheduler;
pub mod source;
pub mod testutil;
pub mod traits;

pub use adapter::{AdapterFactory, FetchPage, RawItem, SourceAdapter};
pub use crawl::{CrawlOptions, CrawlResult, CrawlRunner, CrawlService};
pub use dedup::{ListingStore, UpsertOutcome};
pub use error::AppError;
pub use health::{HealthStatus, SourceHealthMetric};
pub use job::{CrawlJob, JobState};
pub use listing::{ListingRecord, ListingStatus, NewListing, canonical_key, compute_hash};
pub use registry::{SourceHealthReport, SourceRegistry};
pub use scheduler::{CrawlScheduler, CrawlWorker, SchedulerConfig, TracingWorkerReporter};
pub use source::{Difficulty, ScrapePolicy, SourceConfig, SourceKind};
