use roost_adapters::DefaultAdapterFactory;
use roost_core::crawl::CrawlService;
use roost_core::registry::SourceRegistry;
use roost_core::scheduler::CrawlScheduler;
use roost_db::{Database, HealthRepository, ListingRepository, SourceRepository};

/// The fully wired crawl pipeline the server runs.
pub type Runner =
    CrawlService<DefaultAdapterFactory, ListingRepository, HealthRepository, SourceRepository>;

/// Source registry over the PostgreSQL repositories.
pub type Registry = SourceRegistry<SourceRepository, HealthRepository>;

/// Shared application state, available to all route handlers via
/// `State<Arc<AppState>>`.
pub struct AppState {
    pub db: Database,
    pub scheduler: CrawlScheduler,
    pub registry: Registry,
    pub runner: Runner,
    /// API key protecting every non-public endpoint.
    pub api_key: String,
}
