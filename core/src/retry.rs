//! Retry policies
//!
//! Two kinds of retry live here. [`BackoffPolicy`] bounds the drain loop's
//! inner retries of queue calls with exponential back-off. [`StageRetry`]
//! is the coarse per-stage policy the stage runner applies, the same
//! `(retries, delay)` pair a workflow scheduler would attach to a task.

use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Exponential back-off with a bounded number of consecutive attempts.
///
/// The delay starts at `initial_delay_ms` and doubles on each consecutive
/// failure, capped at `max_delay_ms`. Once `max_attempts` consecutive
/// failures have been seen the caller gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

impl BackoffPolicy {
    /// Clamp to sane bounds: at least one attempt, delays of at least 1ms,
    /// and `initial_delay_ms <= max_delay_ms`.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.max_attempts = self.max_attempts.max(1);
        self.initial_delay_ms = self.initial_delay_ms.max(1);
        self.max_delay_ms = self.max_delay_ms.max(1);
        if self.initial_delay_ms > self.max_delay_ms {
            std::mem::swap(&mut self.initial_delay_ms, &mut self.max_delay_ms);
        }
        self
    }

    /// Delay to wait after the `attempt`-th consecutive failure (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        let millis = self
            .initial_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(millis)
    }

    /// Whether `failures` consecutive failures exhaust the policy
    pub fn exhausted(&self, failures: u32) -> bool {
        failures >= self.max_attempts
    }
}

/// Per-stage retry policy: `retries` extra attempts, `delay_secs` apart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRetry {
    pub retries: u32,
    pub delay_secs: u64,
}

impl StageRetry {
    pub const fn new(retries: u32, delay_secs: u64) -> Self {
        Self {
            retries,
            delay_secs,
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }

    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

/// Run one pipeline stage, re-invoking it on failure per `retry`.
///
/// `op` receives the 1-based attempt number. Once `shutdown` is cancelled
/// no further attempts are made.
pub async fn run_stage<T, F, Fut>(
    stage: &'static str,
    retry: StageRetry,
    shutdown: &CancellationToken,
    mut op: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = retry.max_attempts();
    let mut attempt = 1;

    loop {
        let err = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if shutdown.is_cancelled() {
            return Err(err.context(format!("stage '{}' cancelled", stage)));
        }

        if attempt >= max_attempts {
            return Err(err.context(format!(
                "stage '{}' failed after {} attempt(s)",
                stage, attempt
            )));
        }

        warn!(
            stage,
            attempt,
            max_attempts,
            delay_secs = retry.delay_secs,
            error = %format!("{:#}", err),
            "stage failed, retrying"
        );

        tokio::select! {
            _ = shutdown.cancelled() => {
                info!(stage, "shutdown requested while waiting to retry");
                return Err(anyhow!("stage '{}' cancelled", stage));
            }
            _ = tokio::time::sleep(retry.delay()) => {}
        }

        attempt += 1;
    }
}
