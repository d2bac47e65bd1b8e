use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AppError;
use crate::health::HealthStatus;
use crate::source::SourceConfig;
use crate::traits::{HealthBackend, SourceBackend};

/// Read-only health projection for one source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceHealthReport {
    pub source_id: String,
    pub name: String,
    pub enabled: bool,
    pub status: HealthStatus,
    pub failure_rate: f64,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
}

/// Source configuration plus health classification.
///
/// Health is computed from the most recent metric only — a single bad
/// window is worth surfacing immediately, and a source with no history
/// is healthy by default (untested sources are not penalized).
#[derive(Clone)]
pub struct SourceRegistry<S, H>
where
    S: SourceBackend,
    H: HealthBackend,
{
    sources: S,
    health: H,
}

impl<S, H> SourceRegistry<S, H>
where
    S: SourceBackend,
    H: HealthBackend,
{
    pub fn new(sources: S, health: H) -> Self {
        Self { sources, health }
    }

    /// Sources ordered by priority ascending.
    pub async fn list_sources(&self, enabled_only: bool) -> Result<Vec<SourceConfig>, AppError> {
        self.sources.list_sources(enabled_only).await
    }

    pub async fn get_source(&self, id: &str) -> Result<Option<SourceConfig>, AppError> {
        self.sources.get_source(id).await
    }

    /// Health classification for one source.
    pub async fn health_status(&self, source_id: &str) -> Result<HealthStatus, AppError> {
        let status = match self.health.latest_metric(source_id).await? {
            Some(metric) => HealthStatus::classify(&metric),
            None => HealthStatus::Healthy,
        };
        Ok(status)
    }

    /// Health report for every registered source.
    pub async fn health_report(&self) -> Result<Vec<SourceHealthReport>, AppError> {
        let sources = self.sources.list_sources(false).await?;
        let mut report = Vec::with_capacity(sources.len());
        for source in sources {
            let metric = self.health.latest_metric(&source.id).await?;
            let (status, failure_rate, last_error, last_error_at) = match &metric {
                Some(m) => (
                    HealthStatus::classify(m),
                    m.failure_rate(),
                    m.last_error.clone(),
                    m.last_error_at,
                ),
                None => (HealthStatus::Healthy, 0.0, None, None),
            };
            report.push(SourceHealthReport {
                source_id: source.id,
                name: source.name,
                enabled: source.enabled,
                status,
                failure_rate,
                last_error,
                last_error_at,
            });
        }
        Ok(report)
    }
}
