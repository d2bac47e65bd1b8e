use std::future::Future;

use crate::error::AppError;
use crate::listing::NewListing;
use crate::source::SourceConfig;

/// One raw item as the source delivered it, before normalization.
pub type RawItem = serde_json::Value;

/// One fetched page of raw items.
#[derive(Debug, Clone)]
pub struct FetchPage {
    pub items: Vec<RawItem>,
    /// Opaque token for the next page; None when exhausted. Run-based
    /// adapters deliver their whole dataset as a single page.
    pub next_page_token: Option<String>,
}

/// Fetches and normalizes listings for one source kind.
pub trait SourceAdapter: Send + Sync + Clone {
    /// Fetch one page of raw items. `page_token = None` requests the
    /// first page.
    fn fetch_page(
        &self,
        source: &SourceConfig,
        page_token: Option<&str>,
    ) -> impl Future<Output = Result<FetchPage, AppError>> + Send;

    /// Convert a raw item into a normalized listing. Pure, no I/O.
    /// Fails with [`AppError::ParseError`] on malformed input, which
    /// skips the item rather than aborting the crawl.
    fn normalize(&self, source: &SourceConfig, raw: &RawItem) -> Result<NewListing, AppError>;
}

/// Factory for building the adapter matching a source's kind.
///
/// Invalid configuration and missing credentials fail here, at
/// construction — before any network call or store mutation.
pub trait AdapterFactory: Send + Sync + Clone {
    type Adapter: SourceAdapter;

    fn create(&self, source: &SourceConfig) -> Result<Self::Adapter, AppError>;
}
