use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Append-only record of one crawl attempt for one source.
///
/// Immutable once written; never edited in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceHealthMetric {
    pub source_id: String,
    pub recorded_at: DateTime<Utc>,
    pub fetch_attempts: u32,
    pub fetch_successes: u32,
    pub fetch_failures: u32,
    pub listings_found: u32,
    pub new_listings: u32,
    pub delisted_listings: u32,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
}

impl SourceHealthMetric {
    /// Fraction of fetch attempts that failed, in [0, 1].
    pub fn failure_rate(&self) -> f64 {
        f64::from(self.fetch_failures) / f64::from(self.fetch_attempts.max(1))
    }
}

/// Health classification for a source, computed from its most recent
/// metric only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Failing,
}

impl HealthStatus {
    /// Classify a single crawl-attempt metric.
    ///
    /// failure_rate > 0.5 → failing; 0.2 < rate ≤ 0.5 → degraded;
    /// otherwise healthy.
    pub fn classify(metric: &SourceHealthMetric) -> Self {
        let rate = metric.failure_rate();
        if rate > 0.5 {
            HealthStatus::Failing
        } else if rate > 0.2 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Failing => "failing",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
