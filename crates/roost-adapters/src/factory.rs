use roost_core::adapter::{AdapterFactory, FetchPage, RawItem, SourceAdapter};
use roost_core::error::AppError;
use roost_core::listing::NewListing;
use roost_core::source::{SourceConfig, SourceKind};
use url::Url;

use crate::api::ApiAdapter;
use crate::direct::DirectHtmlAdapter;
use crate::http::HttpFetcher;
use crate::run_service::RunServiceAdapter;

/// The concrete adapter for any source kind.
#[derive(Clone, Debug)]
pub enum AnyAdapter {
    DirectHtml(DirectHtmlAdapter),
    RunService(RunServiceAdapter),
    Api(ApiAdapter),
}

impl SourceAdapter for AnyAdapter {
    async fn fetch_page(
        &self,
        source: &SourceConfig,
        page_token: Option<&str>,
    ) -> Result<FetchPage, AppError> {
        match self {
            AnyAdapter::DirectHtml(a) => a.fetch_page(source, page_token).await,
            AnyAdapter::RunService(a) => a.fetch_page(source, page_token).await,
            AnyAdapter::Api(a) => a.fetch_page(source, page_token).await,
        }
    }

    fn normalize(&self, source: &SourceConfig, raw: &RawItem) -> Result<NewListing, AppError> {
        match self {
            AnyAdapter::DirectHtml(a) => a.normalize(source, raw),
            AnyAdapter::RunService(a) => a.normalize(source, raw),
            AnyAdapter::Api(a) => a.normalize(source, raw),
        }
    }
}

/// Builds the adapter matching a source's kind, validating connection
/// parameters up front so configuration problems fail the run before any
/// network call or store mutation.
#[derive(Clone)]
pub struct DefaultAdapterFactory {
    http: HttpFetcher,
}

impl DefaultAdapterFactory {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            http: HttpFetcher::new()?,
        })
    }

    pub fn with_fetcher(http: HttpFetcher) -> Self {
        Self { http }
    }
}

impl AdapterFactory for DefaultAdapterFactory {
    type Adapter = AnyAdapter;

    fn create(&self, source: &SourceConfig) -> Result<AnyAdapter, AppError> {
        match &source.kind {
            SourceKind::DirectHtml { list_url, .. } => {
                validate_endpoint(&source.id, list_url)?;
                Ok(AnyAdapter::DirectHtml(DirectHtmlAdapter::new(
                    self.http.clone(),
                )))
            }
            SourceKind::RunBasedService {
                endpoint, token, ..
            } => {
                validate_endpoint(&source.id, endpoint)?;
                if token.as_deref().is_none_or(str::is_empty) {
                    return Err(AppError::AuthError(format!(
                        "source '{}' has no service token configured",
                        source.id
                    )));
                }
                Ok(AnyAdapter::RunService(RunServiceAdapter::new(
                    self.http.clone(),
                )))
            }
            SourceKind::Api { endpoint, .. } => {
                validate_endpoint(&source.id, endpoint)?;
                Ok(AnyAdapter::Api(ApiAdapter::new(self.http.clone())))
            }
        }
    }
}

fn validate_endpoint(source_id: &str, endpoint: &str) -> Result<(), AppError> {
    Url::parse(endpoint).map_err(|e| {
        AppError::ConfigError(format!(
            "source '{source_id}' has an invalid endpoint {endpoint:?}: {e}"
        ))
    })?;
    Ok(())
}
