use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::fragment::fragment_from_message;
use crate::config::IntakeConfig;
use crate::error::{DrainError, TransportError};
use crate::queue::{QueueMessage, QueueService, ReceiveRequest};
use crate::retry::BackoffPolicy;
use crate::snapshot::write_snapshot;
use crate::types::{DrainOutcome, FragmentCollection, QueueUrl};

/// Counters accumulated over one drain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainStats {
    /// Receive calls that returned (with or without messages)
    pub polls: u64,
    /// Messages captured into the collection, duplicates included
    pub captured: u64,
    /// Messages skipped because they could not be parsed
    pub skipped: u64,
    /// Captured messages whose delete call failed
    pub failed_deletes: u64,
    /// Queue calls that failed and were retried
    pub transport_retries: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainReport {
    pub fragments: FragmentCollection,
    pub outcome: DrainOutcome,
    pub stats: DrainStats,
}

pub struct QueueDrainer<'a> {
    queue: &'a dyn QueueService,
    config: &'a IntakeConfig,
    shutdown: CancellationToken,
}

impl<'a> QueueDrainer<'a> {
    pub fn new(
        queue: &'a dyn QueueService,
        config: &'a IntakeConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            queue,
            config,
            shutdown,
        }
    }

    /// Drain `queue_url` until a completion heuristic fires.
    ///
    /// The snapshot is written on every exit path, including errors.
    #[tracing::instrument(skip_all, fields(stage = "intake", queue_url = %queue_url))]
    pub async fn drain(&self, queue_url: &QueueUrl) -> Result<DrainReport, DrainError> {
        let mut fragments = FragmentCollection::new();
        let mut stats = DrainStats::default();

        let result = self
            .poll_until_done(queue_url.as_str(), &mut fragments, &mut stats)
            .await;

        self.save_snapshot(&fragments);

        let outcome = result?;
        info!(
            outcome = %outcome,
            fragments = fragments.len(),
            polls = stats.polls,
            skipped = stats.skipped,
            failed_deletes = stats.failed_deletes,
            "drain finished"
        );

        Ok(DrainReport {
            fragments,
            outcome,
            stats,
        })
    }

    async fn poll_until_done(
        &self,
        queue_url: &str,
        fragments: &mut FragmentCollection,
        stats: &mut DrainStats,
    ) -> Result<DrainOutcome, DrainError> {
        let backoff = self.config.retry.normalized();
        let request = ReceiveRequest {
            max_messages: self.config.max_messages,
            visibility_timeout_secs: self.config.visibility_timeout_secs,
            wait_time_secs: self.config.wait_time_secs,
        };
        let mut empty_polls: u32 = 0;
        let mut failures: u32 = 0;

        loop {
            let depth = match self.cancellable(self.queue.depth(queue_url)).await? {
                Ok(depth) => depth,
                Err(err) => {
                    self.back_off("get_queue_attributes", err, &mut failures, &backoff, stats)
                        .await?;
                    continue;
                }
            };
            info!(
                visible = depth.visible,
                invisible = depth.invisible,
                delayed = depth.delayed,
                "queue status"
            );

            let batch = match self.cancellable(self.queue.receive(queue_url, &request)).await? {
                Ok(batch) => batch,
                Err(err) => {
                    self.back_off("receive_message", err, &mut failures, &backoff, stats)
                        .await?;
                    continue;
                }
            };
            failures = 0;
            stats.polls += 1;

            if batch.is_empty() {
                empty_polls += 1;

                if depth.total() == 0 {
                    info!("all messages processed and queue empty");
                    return Ok(DrainOutcome::QueueEmpty);
                }
                if empty_polls >= self.config.max_empty_polls {
                    warn!(
                        empty_polls,
                        pending = depth.total(),
                        "no messages after consecutive empty polls, assuming complete"
                    );
                    return Ok(DrainOutcome::AssumedComplete);
                }
                if self.poll_limit_reached(stats) {
                    return Ok(DrainOutcome::PollLimitReached);
                }

                info!(
                    empty_polls,
                    delay_secs = self.config.empty_poll_delay_secs,
                    "no visible messages right now, waiting"
                );
                self.wait(Duration::from_secs(self.config.empty_poll_delay_secs))
                    .await?;
                continue;
            }

            empty_polls = 0;
            for message in &batch {
                self.capture(queue_url, message, fragments, stats).await?;
            }

            if self.poll_limit_reached(stats) {
                return Ok(DrainOutcome::PollLimitReached);
            }
        }
    }

    /// Capture one message, then acknowledge it.
    ///
    /// Parse and delete failures are logged and counted; neither stops the batch.
    async fn capture(
        &self,
        queue_url: &str,
        message: &QueueMessage,
        fragments: &mut FragmentCollection,
        stats: &mut DrainStats,
    ) -> Result<(), DrainError> {
        let (fragment, receipt_handle) = match fragment_from_message(message) {
            Ok(parsed) => parsed,
            Err(err) => {
                stats.skipped += 1;
                warn!(
                    message_id = message.message_id.as_deref().unwrap_or("-"),
                    error = %err,
                    "skipping message"
                );
                return Ok(());
            }
        };

        let order_key = fragment.order_key.clone();
        let word = fragment.word.clone();
        match fragments.insert(fragment) {
            Some(previous) if previous != word => warn!(
                order_key = %order_key,
                previous = %previous,
                word = %word,
                "order key redelivered with a different word, keeping the latest"
            ),
            Some(_) => debug!(order_key = %order_key, "duplicate delivery"),
            None => {}
        }
        stats.captured += 1;

        match self
            .cancellable(self.queue.delete(queue_url, receipt_handle))
            .await?
        {
            Ok(()) => info!(order_key = %order_key, word = %word, "received and deleted message"),
            Err(err) => {
                stats.failed_deletes += 1;
                warn!(
                    order_key = %order_key,
                    error = %err,
                    "failed to delete message, it will be redelivered"
                );
            }
        }

        Ok(())
    }

    async fn back_off(
        &self,
        operation: &'static str,
        err: TransportError,
        failures: &mut u32,
        backoff: &BackoffPolicy,
        stats: &mut DrainStats,
    ) -> Result<(), DrainError> {
        *failures += 1;

        if backoff.exhausted(*failures) {
            error!(operation, attempts = *failures, error = %err, "giving up on queue");
            return Err(DrainError::Transport {
                attempts: *failures,
                source: err,
            });
        }

        stats.transport_retries += 1;
        let delay = backoff.delay_for_attempt(*failures);
        warn!(
            operation,
            attempt = *failures,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "queue call failed, backing off"
        );
        self.wait(delay).await
    }

    fn poll_limit_reached(&self, stats: &DrainStats) -> bool {
        match self.config.max_polls {
            Some(max_polls) if stats.polls >= max_polls => {
                warn!(max_polls, "poll limit reached, stopping drain");
                true
            }
            _ => false,
        }
    }

    async fn cancellable<F: Future>(&self, fut: F) -> Result<F::Output, DrainError> {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                info!("shutdown requested during queue call");
                Err(DrainError::Cancelled)
            }
            output = fut => Ok(output),
        }
    }

    async fn wait(&self, delay: Duration) -> Result<(), DrainError> {
        tokio::select! {
            _ = self.shutdown.cancelled() => {
                info!("shutdown requested during poll wait");
                Err(DrainError::Cancelled)
            }
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    fn save_snapshot(&self, fragments: &FragmentCollection) {
        let path = &self.config.snapshot_path;
        match write_snapshot(path, fragments) {
            Ok(()) => info!(path = %path.display(), fragments = fragments.len(), "snapshot saved"),
            Err(err) => error!(error = %err, "failed to save snapshot"),
        }
    }
}

#[cfg(test)]
#[path = "drain_tests.rs"]
mod tests;
