use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crawl::{CrawlOptions, CrawlResult};

/// State of a crawl job in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "queued" => Ok(JobState::Queued),
            "running" => Ok(JobState::Running),
            "succeeded" => Ok(JobState::Succeeded),
            "failed" => Ok(JobState::Failed),
            _ => Err(format!("Unknown job state: {}", s)),
        }
    }
}

/// One scheduled crawl. Owned by the scheduler; at most one job per
/// source may be queued or running at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlJob {
    pub id: Uuid,
    pub source_id: String,
    pub priority: i32,
    pub state: JobState,
    pub options: CrawlOptions,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub result: Option<CrawlResult>,
    pub error: Option<String>,
}

impl CrawlJob {
    pub fn new(source_id: impl Into<String>, priority: i32, options: CrawlOptions) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_id: source_id.into(),
            priority,
            state: JobState::Queued,
            options,
            scheduled_at: Utc::now(),
            started_at: None,
            finished_at: None,
            result: None,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_roundtrip() {
        for state in [
            JobState::Queued,
            JobState::Running,
            JobState::Succeeded,
            JobState::Failed,
        ] {
            let parsed: JobState = state.as_str().parse().unwrap();
            assert_eq!(parsed, state);
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobState::Queued.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Succeeded.is_terminal());
        assert!(JobState::Failed.is_terminal());
    }

    #[test]
    fn test_new_job_is_queued() {
        let job = CrawlJob::new("src-a", 1, CrawlOptions::default());
        assert_eq!(job.state, JobState::Queued);
        assert!(job.started_at.is_none());
        assert!(job.result.is_none());
    }
}
