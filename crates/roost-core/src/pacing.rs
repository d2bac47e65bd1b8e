//! Inter-request pacing for polite crawling.
//!
//! Within a run, pagination is sequential; the orchestrator sleeps the
//! policy-derived delay between page fetches so a crawl never hammers
//! its source. Jitter randomises timing without pulling in `rand`.

use std::time::Duration;

use crate::source::ScrapePolicy;

/// Delay configuration for one run's page fetches.
#[derive(Debug, Clone)]
pub struct PacingConfig {
    /// Minimum delay between consecutive page fetches.
    pub delay: Duration,
    /// Maximum random jitter added on top of `delay` (uniform [0, jitter]).
    pub jitter: Duration,
}

impl PacingConfig {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            jitter: Duration::ZERO,
        }
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Derive pacing from a source's scrape policy.
    pub fn for_policy(policy: &ScrapePolicy) -> Self {
        Self {
            delay: policy.request_delay(),
            jitter: Duration::from_millis(250),
        }
    }

    /// Compute the effective delay for a single wait (delay + jitter).
    pub fn effective_delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.delay;
        }
        let jitter_ms = rand_jitter_ms(self.jitter.as_millis() as u64);
        self.delay + Duration::from_millis(jitter_ms)
    }
}

// ---------------------------------------------------------------------------
// Deterministic jitter based on std — avoids pulling in the `rand` crate.
// Uses a simple xorshift seeded from the current time.
// ---------------------------------------------------------------------------

fn rand_jitter_ms(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }
    // Seed from high-resolution clock — good enough for jitter, not crypto.
    let mut x = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    // xorshift64
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x % max_ms
}
