//! In-memory crawl scheduling: a bounded job channel, a per-source
//! in-flight map, and a fixed pool of workers.
//!
//! At most one job per source is queued or running at any time, which
//! removes the primary race — two concurrent delisting passes for the
//! same source computing inconsistent active-set snapshots. Jobs are not
//! preemptible: a running job always reaches a terminal state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::crawl::{CrawlOptions, CrawlResult, CrawlRunner};
use crate::error::AppError;
use crate::job::{CrawlJob, JobState};
use crate::source::SourceConfig;

/// Scheduler tuning knobs.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Capacity of the bounded job channel.
    pub queue_capacity: usize,
    /// How long a source sits out of scheduled sweeps after rate-limiting
    /// a crawl.
    pub rate_limit_cooldown: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            rate_limit_cooldown: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Default)]
struct SchedulerInner {
    jobs: HashMap<Uuid, CrawlJob>,
    /// source_id → job id for every job in {queued, running}.
    in_flight: HashMap<String, Uuid>,
    /// Sources sitting out scheduled sweeps until the instant passes.
    cooldown_until: HashMap<String, Instant>,
}

/// Shared handle to the job queue consumed by workers.
pub type JobReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<Uuid>>>;

/// Accepts crawl requests and hands work to the worker pool.
#[derive(Clone)]
pub struct CrawlScheduler {
    config: SchedulerConfig,
    inner: Arc<Mutex<SchedulerInner>>,
    tx: mpsc::Sender<Uuid>,
}

impl CrawlScheduler {
    /// Create a scheduler and the receiver half workers pull from.
    pub fn new(config: SchedulerConfig) -> (Self, JobReceiver) {
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let scheduler = Self {
            config,
            inner: Arc::new(Mutex::new(SchedulerInner::default())),
            tx,
        };
        (scheduler, Arc::new(tokio::sync::Mutex::new(rx)))
    }

    /// Acquires the inner mutex lock, recovering from poison if necessary.
    fn lock_inner(&self) -> std::sync::MutexGuard<'_, SchedulerInner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned scheduler mutex");
            poisoned.into_inner()
        })
    }

    /// Enqueue a crawl for a source.
    ///
    /// Idempotent per source: if a job for this source is already queued
    /// or running, the existing job's id is returned instead of piling a
    /// second one up behind a slow crawl.
    pub fn schedule_crawl(
        &self,
        source_id: &str,
        priority: i32,
        options: CrawlOptions,
    ) -> Result<Uuid, AppError> {
        // Background jobs always persist their results.
        let mut options = options;
        options.dry_run = false;

        let mut inner = self.lock_inner();
        if let Some(&existing) = inner.in_flight.get(source_id) {
            tracing::debug!(%source_id, job_id = %existing, "Crawl already in flight");
            return Ok(existing);
        }

        let job = CrawlJob::new(source_id, priority, options);
        let id = job.id;
        // Register before sending: a worker may pick the id up the moment
        // it hits the channel.
        inner.in_flight.insert(source_id.to_string(), id);
        inner.jobs.insert(id, job);
        if self.tx.try_send(id).is_err() {
            inner.in_flight.remove(source_id);
            inner.jobs.remove(&id);
            return Err(AppError::Generic("crawl queue is full".into()));
        }
        tracing::info!(%source_id, job_id = %id, "Crawl scheduled");
        Ok(id)
    }

    /// Enqueue one crawl per enabled source, in priority order. Sources
    /// inside a rate-limit cooldown are skipped. Returns the number of
    /// jobs touched and their ids (existing ids for in-flight sources).
    pub fn schedule_all_crawls(&self, sources: &[SourceConfig]) -> (usize, Vec<Uuid>) {
        let mut ordered: Vec<&SourceConfig> = sources.iter().filter(|s| s.enabled).collect();
        ordered.sort_by_key(|s| s.priority);

        let mut job_ids = Vec::new();
        for source in ordered {
            if let Some(remaining) = self.cooldown_remaining(&source.id) {
                tracing::info!(
                    source_id = %source.id,
                    remaining_secs = remaining.as_secs(),
                    "Skipping rate-limited source"
                );
                continue;
            }
            match self.schedule_crawl(&source.id, source.priority, CrawlOptions::default()) {
                Ok(id) => job_ids.push(id),
                Err(e) => {
                    tracing::warn!(source_id = %source.id, error = %e, "Failed to schedule crawl");
                }
            }
        }
        (job_ids.len(), job_ids)
    }

    /// Remaining cooldown for a source, if any.
    pub fn cooldown_remaining(&self, source_id: &str) -> Option<Duration> {
        let inner = self.lock_inner();
        inner
            .cooldown_until
            .get(source_id)
            .and_then(|until| until.checked_duration_since(Instant::now()))
    }

    pub fn get_job(&self, id: Uuid) -> Option<CrawlJob> {
        self.lock_inner().jobs.get(&id).cloned()
    }

    /// Jobs newest first, optionally filtered by state.
    pub fn list_jobs(&self, state: Option<JobState>, limit: usize) -> Vec<CrawlJob> {
        let inner = self.lock_inner();
        let mut jobs: Vec<CrawlJob> = inner
            .jobs
            .values()
            .filter(|j| state.is_none_or(|s| j.state == s))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.scheduled_at.cmp(&a.scheduled_at));
        jobs.truncate(limit);
        jobs
    }

    /// Transition a queued job to running. Returns the job for the
    /// worker, or None if it is gone or not queued.
    fn begin_job(&self, id: Uuid) -> Option<CrawlJob> {
        let mut inner = self.lock_inner();
        let job = inner.jobs.get_mut(&id)?;
        if job.state != JobState::Queued {
            return None;
        }
        job.state = JobState::Running;
        job.started_at = Some(chrono::Utc::now());
        Some(job.clone())
    }

    fn complete_job(&self, id: Uuid, result: CrawlResult) {
        let mut inner = self.lock_inner();
        let rate_limited = result.rate_limited;
        let mut source_id = None;
        if let Some(job) = inner.jobs.get_mut(&id) {
            job.state = JobState::Succeeded;
            job.finished_at = Some(chrono::Utc::now());
            job.result = Some(result);
            source_id = Some(job.source_id.clone());
        }
        if let Some(source_id) = source_id {
            inner.in_flight.remove(&source_id);
            if rate_limited {
                let until = Instant::now() + self.config.rate_limit_cooldown;
                inner.cooldown_until.insert(source_id.clone(), until);
                tracing::info!(
                    %source_id,
                    cooldown_secs = self.config.rate_limit_cooldown.as_secs(),
                    "Source rate-limited us, extending delay before next attempt"
                );
            }
        }
    }

    fn fail_job(&self, id: Uuid, error: &str) {
        let mut inner = self.lock_inner();
        let mut source_id = None;
        if let Some(job) = inner.jobs.get_mut(&id) {
            job.state = JobState::Failed;
            job.finished_at = Some(chrono::Utc::now());
            job.error = Some(error.to_string());
            source_id = Some(job.source_id.clone());
        }
        if let Some(source_id) = source_id {
            inner.in_flight.remove(&source_id);
        }
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Events emitted by a worker for monitoring/logging.
#[derive(Debug, Clone)]
pub enum WorkerEvent<'a> {
    Started {
        worker_id: &'a str,
    },
    JobStarted {
        job_id: Uuid,
        source_id: &'a str,
    },
    JobSucceeded {
        job_id: Uuid,
        listings_found: u32,
        new_listings: u32,
        delisted_listings: u32,
    },
    JobFailed {
        job_id: Uuid,
        error: &'a str,
    },
    Stopped {
        worker_id: &'a str,
    },
}

/// Trait for receiving worker events (decoupled logging).
pub trait WorkerReporter: Send + Sync {
    fn report(&self, event: WorkerEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingWorkerReporter;

impl WorkerReporter for TracingWorkerReporter {
    fn report(&self, event: WorkerEvent<'_>) {
        match event {
            WorkerEvent::Started { worker_id } => {
                tracing::info!(%worker_id, "Worker started");
            }
            WorkerEvent::JobStarted { job_id, source_id } => {
                tracing::info!(%job_id, %source_id, "Processing crawl job");
            }
            WorkerEvent::JobSucceeded {
                job_id,
                listings_found,
                new_listings,
                delisted_listings,
            } => {
                tracing::info!(
                    %job_id,
                    %listings_found,
                    %new_listings,
                    %delisted_listings,
                    "Crawl job succeeded"
                );
            }
            WorkerEvent::JobFailed { job_id, error } => {
                tracing::warn!(%job_id, %error, "Crawl job failed");
            }
            WorkerEvent::Stopped { worker_id } => {
                tracing::info!(%worker_id, "Worker stopped");
            }
        }
    }
}

/// Pulls queued jobs and drives them through a [`CrawlRunner`].
pub struct CrawlWorker<R: CrawlRunner> {
    scheduler: CrawlScheduler,
    queue: JobReceiver,
    runner: R,
    worker_id: String,
}

impl<R: CrawlRunner> CrawlWorker<R> {
    pub fn new(scheduler: CrawlScheduler, queue: JobReceiver, runner: R) -> Self {
        Self {
            scheduler,
            queue,
            runner,
            worker_id: format!("worker-{}", &Uuid::new_v4().to_string()[..8]),
        }
    }

    pub fn with_worker_id(mut self, id: impl Into<String>) -> Self {
        self.worker_id = id.into();
        self
    }

    /// Run the worker loop until cancellation. A job in progress always
    /// runs to a terminal state; cancellation only stops pulling new work.
    pub async fn run<WR: WorkerReporter>(&self, cancel_token: CancellationToken, reporter: &WR) {
        reporter.report(WorkerEvent::Started {
            worker_id: &self.worker_id,
        });

        loop {
            let job_id = tokio::select! {
                () = cancel_token.cancelled() => break,
                id = async { self.queue.lock().await.recv().await } => match id {
                    Some(id) => id,
                    None => break,
                },
            };

            // Dropped between scheduling and pickup — nothing to do.
            let Some(job) = self.scheduler.begin_job(job_id) else {
                continue;
            };

            reporter.report(WorkerEvent::JobStarted {
                job_id: job.id,
                source_id: &job.source_id,
            });

            match self.runner.run_crawl(&job.source_id, &job.options).await {
                Ok(result) => {
                    reporter.report(WorkerEvent::JobSucceeded {
                        job_id: job.id,
                        listings_found: result.listings_found,
                        new_listings: result.new_listings,
                        delisted_listings: result.delisted_listings,
                    });
                    self.scheduler.complete_job(job.id, result);
                }
                Err(e) => {
                    let message = e.to_string();
                    reporter.report(WorkerEvent::JobFailed {
                        job_id: job.id,
                        error: &message,
                    });
                    self.scheduler.fail_job(job.id, &message);
                }
            }
        }

        reporter.report(WorkerEvent::Stopped {
            worker_id: &self.worker_id,
        });
    }
}
