//! Adapter for first-party listings APIs.
//!
//! Expects a JSON endpoint of the shape
//! `{ "listings": [...], "next_cursor": "..." }` with cursor pagination
//! and an optional bearer key.

use roost_core::adapter::{FetchPage, RawItem, SourceAdapter};
use roost_core::error::AppError;
use roost_core::listing::NewListing;
use roost_core::source::{SourceConfig, SourceKind};
use serde_json::Value;
use url::Url;

use crate::http::HttpFetcher;
use crate::parse::normalize_raw_item;

#[derive(Clone, Debug)]
pub struct ApiAdapter {
    http: HttpFetcher,
}

impl ApiAdapter {
    pub fn new(http: HttpFetcher) -> Self {
        Self { http }
    }
}

impl SourceAdapter for ApiAdapter {
    async fn fetch_page(
        &self,
        source: &SourceConfig,
        page_token: Option<&str>,
    ) -> Result<FetchPage, AppError> {
        let SourceKind::Api { endpoint, api_key } = &source.kind else {
            return Err(AppError::ConfigError(format!(
                "source '{}' is not an api source",
                source.id
            )));
        };

        let mut url = Url::parse(endpoint)
            .map_err(|e| AppError::ConfigError(format!("invalid endpoint {endpoint}: {e}")))?;
        if let Some(cursor) = page_token {
            url.query_pairs_mut().append_pair("cursor", cursor);
        }

        let body = self.http.get_json(url.as_str(), api_key.as_deref()).await?;

        let items: Vec<RawItem> = body
            .get("listings")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                AppError::ParseError(format!(
                    "response from '{}' has no listings array",
                    source.id
                ))
            })?
            .clone();

        let next_page_token = body
            .get("next_cursor")
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        Ok(FetchPage {
            items,
            next_page_token,
        })
    }

    fn normalize(&self, source: &SourceConfig, raw: &RawItem) -> Result<NewListing, AppError> {
        normalize_raw_item(&source.id, raw)
    }
}
