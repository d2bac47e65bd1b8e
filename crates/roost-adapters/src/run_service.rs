//! Adapter for run-based third-party scraping services.
//!
//! These services do not paginate live: a crawl triggers an actor run,
//! waits for it to finish, and reads the completed run's dataset as a
//! single page. The service API follows the common actor-runs shape:
//!
//! - `POST {endpoint}/acts/{actor_id}/runs` → run metadata
//! - `GET  {endpoint}/actor-runs/{run_id}?waitForFinish=60` → long-poll
//! - `GET  {endpoint}/datasets/{dataset_id}/items?format=json` → items

use roost_core::adapter::{FetchPage, RawItem, SourceAdapter};
use roost_core::error::AppError;
use roost_core::listing::NewListing;
use roost_core::source::{SourceConfig, SourceKind};
use serde_json::{Value, json};

use crate::http::HttpFetcher;
use crate::parse::normalize_raw_item;

/// How many long-poll rounds to wait for a run before giving up.
/// Each round holds for up to 60 seconds server-side.
const MAX_POLL_ATTEMPTS: u32 = 10;

#[derive(Clone, Debug)]
pub struct RunServiceAdapter {
    http: HttpFetcher,
}

impl RunServiceAdapter {
    pub fn new(http: HttpFetcher) -> Self {
        Self { http }
    }

    /// Start an actor run. Returns the run id.
    async fn trigger_run(
        &self,
        endpoint: &str,
        actor_id: &str,
        token: &str,
        results_limit: Option<u32>,
    ) -> Result<String, AppError> {
        let input = match results_limit {
            Some(limit) => json!({ "resultsLimit": limit }),
            None => json!({}),
        };
        let url = format!("{endpoint}/acts/{actor_id}/runs");
        let body = self.http.post_json(&url, Some(token), &input).await?;

        run_field(&body, "id")
    }

    /// Long-poll a run until it reaches a terminal status.
    /// Returns the dataset id of a succeeded run.
    async fn wait_for_run(
        &self,
        endpoint: &str,
        run_id: &str,
        token: &str,
    ) -> Result<String, AppError> {
        for _ in 0..MAX_POLL_ATTEMPTS {
            let url = format!("{endpoint}/actor-runs/{run_id}?waitForFinish=60");
            let body = self.http.get_json(&url, Some(token)).await?;

            let status = run_field(&body, "status")?;
            match status.as_str() {
                "SUCCEEDED" => return run_field(&body, "defaultDatasetId"),
                "FAILED" | "ABORTED" | "TIMED-OUT" => {
                    return Err(AppError::HttpError(format!(
                        "scrape run {run_id} ended with status {status}"
                    )));
                }
                _ => {
                    tracing::debug!(%run_id, %status, "Run still in progress");
                }
            }
        }
        Err(AppError::Timeout(u64::from(MAX_POLL_ATTEMPTS) * 60))
    }

    async fn fetch_dataset(
        &self,
        endpoint: &str,
        dataset_id: &str,
        token: &str,
    ) -> Result<Vec<RawItem>, AppError> {
        let url = format!("{endpoint}/datasets/{dataset_id}/items?format=json");
        let body = self.http.get_json(&url, Some(token)).await?;
        match body {
            Value::Array(items) => Ok(items),
            other => Err(AppError::ParseError(format!(
                "dataset {dataset_id} is not an array: {other}"
            ))),
        }
    }
}

fn run_field(body: &Value, field: &str) -> Result<String, AppError> {
    body.get("data")
        .and_then(|d| d.get(field))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AppError::ParseError(format!("run response missing data.{field}")))
}

impl SourceAdapter for RunServiceAdapter {
    async fn fetch_page(
        &self,
        source: &SourceConfig,
        _page_token: Option<&str>,
    ) -> Result<FetchPage, AppError> {
        let SourceKind::RunBasedService {
            endpoint,
            actor_id,
            token,
            results_limit,
        } = &source.kind
        else {
            return Err(AppError::ConfigError(format!(
                "source '{}' is not a run-based-service source",
                source.id
            )));
        };
        let token = token.as_deref().ok_or_else(|| {
            AppError::AuthError(format!("source '{}' has no service token", source.id))
        })?;

        let run_id = self
            .trigger_run(endpoint, actor_id, token, *results_limit)
            .await?;
        tracing::info!(source_id = %source.id, %run_id, "Triggered scrape run");

        let dataset_id = self.wait_for_run(endpoint, &run_id, token).await?;
        let items = self.fetch_dataset(endpoint, &dataset_id, token).await?;

        // The whole dataset is one page; there is nothing to paginate.
        Ok(FetchPage {
            items,
            next_page_token: None,
        })
    }

    fn normalize(&self, source: &SourceConfig, raw: &RawItem) -> Result<NewListing, AppError> {
        normalize_raw_item(&source.id, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_field_reads_nested_data() {
        let body = json!({"data": {"id": "run-1", "status": "SUCCEEDED"}});
        assert_eq!(run_field(&body, "id").unwrap(), "run-1");
        assert!(run_field(&body, "defaultDatasetId").is_err());
    }
}
