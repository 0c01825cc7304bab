//! Application wiring for scatter
//!
//! Builds the queue service and assignment source once from [`Config`] and
//! exposes each pipeline stage as a method. Nothing here is global; callers
//! own the [`Application`] and hand it to the stage runner or CLI.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use crate::assignment::{AssignmentSource, HttpAssignmentClient};
use crate::config::Config;
use crate::error::ConfigError;
use crate::intake::{DrainReport, QueueDrainer};
use crate::queue::{QueueService, SqsQueue};
use crate::reassemble::reassemble;
use crate::submit::{submit, SubmissionReceipt};
use crate::types::{FragmentCollection, QueueUrl, SubmissionRecord};

/// The scatter application instance with all services
pub struct Application {
    pub config: Config,
    pub queue: Arc<dyn QueueService>,
    /// Absent when no assignment endpoint is configured
    pub assignment: Option<Arc<dyn AssignmentSource>>,
    pub shutdown: CancellationToken,
}

impl Application {
    /// Create a new Application instance (pure instantiation, no I/O)
    pub fn new(
        config: Config,
        queue: Arc<dyn QueueService>,
        assignment: Option<Arc<dyn AssignmentSource>>,
    ) -> Self {
        Self {
            config,
            queue,
            assignment,
            shutdown: CancellationToken::new(),
        }
    }

    /// Build the real queue client and HTTP assignment client from config
    pub async fn from_config(config: Config) -> Result<Self> {
        let queue = SqsQueue::from_config(&config.queue).await;

        let assignment = match config.assignment.endpoint.as_deref() {
            Some(endpoint) => {
                let client = HttpAssignmentClient::new(
                    endpoint,
                    Duration::from_secs(config.assignment.timeout_secs),
                )
                .context("failed to build assignment HTTP client")?;
                Some(Arc::new(client) as Arc<dyn AssignmentSource>)
            }
            None => None,
        };

        Ok(Self::new(config, Arc::new(queue), assignment))
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Token cancelled on operator interrupt; shared by every stage
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub async fn fetch_assignment(&self) -> Result<QueueUrl> {
        let source = self
            .assignment
            .as_ref()
            .ok_or(ConfigError::Missing("assignment.endpoint"))?;

        let queue_url = source
            .fetch()
            .await
            .context("failed to fetch queue assignment")?;
        Ok(queue_url)
    }

    pub async fn drain(&self, queue_url: &QueueUrl) -> Result<DrainReport> {
        let report = QueueDrainer::new(
            self.queue.as_ref(),
            &self.config.intake,
            self.shutdown.clone(),
        )
        .drain(queue_url)
        .await
        .with_context(|| format!("failed to drain queue {}", queue_url))?;
        Ok(report)
    }

    pub fn reassemble(&self, fragments: &FragmentCollection) -> Result<String> {
        let phrase = reassemble(fragments).context("failed to reassemble fragments")?;
        Ok(phrase)
    }

    /// Send `phrase` with the configured requester id and platform
    pub async fn submit(&self, phrase: &str) -> Result<SubmissionReceipt> {
        let destination = self.config.submission_queue_url()?;
        let record = self.submission_record(phrase)?;

        let receipt = submit(self.queue.as_ref(), destination, &record)
            .await
            .context("failed to send submission")?;
        Ok(receipt)
    }

    pub fn submission_record(&self, phrase: &str) -> Result<SubmissionRecord, ConfigError> {
        Ok(SubmissionRecord::new(
            self.config.requester_id()?,
            phrase,
            self.config.submission.platform.as_str(),
        ))
    }

    /// Fail fast on settings the submit stage would need later
    pub fn check_submission_settings(&self) -> Result<(), ConfigError> {
        self.config.submission_queue_url()?;
        self.config.requester_id()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{depth, fragment_message, FakeAssignment, FakeQueue};

    const QUEUE: &str = "https://queue.example.test/123/scatter-abc";
    const SUBMIT_QUEUE: &str = "https://queue.example.test/123/submit";

    fn config(dir: &tempfile::TempDir) -> Config {
        let mut config = Config::default();
        config.intake.snapshot_path = dir.path().join("messages.json");
        config.submission.queue_url = Some(SUBMIT_QUEUE.to_string());
        config.submission.requester_id = Some("mgh2xx".to_string());
        config.submission.platform = "orchestratorA".to_string();
        config
    }

    #[tokio::test]
    async fn test_fetch_without_endpoint_reports_missing_setting() {
        let dir = tempfile::tempdir().unwrap();
        let app = Application::new(config(&dir), Arc::new(FakeQueue::new()), None);

        let err = app.fetch_assignment().await.unwrap_err();

        assert!(format!("{:#}", err).contains("assignment.endpoint"));
    }

    #[tokio::test]
    async fn test_fetch_uses_assignment_source() {
        let dir = tempfile::tempdir().unwrap();
        let app = Application::new(
            config(&dir),
            Arc::new(FakeQueue::new()),
            Some(Arc::new(FakeAssignment::new(QUEUE))),
        );

        assert_eq!(app.fetch_assignment().await.unwrap(), QueueUrl::new(QUEUE));
    }

    #[tokio::test]
    async fn test_drain_then_submit_through_shared_queue() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Arc::new(
            FakeQueue::new()
                .then_depth(depth(2, 0, 0))
                .then_batch(vec![
                    fragment_message("rh-a", "2", "world"),
                    fragment_message("rh-b", "1", "hello"),
                ]),
        );
        let app = Application::new(config(&dir), queue.clone(), None);

        let report = app.drain(&QueueUrl::new(QUEUE)).await.unwrap();
        let phrase = app.reassemble(&report.fragments).unwrap();
        let receipt = app.submit(&phrase).await.unwrap();

        assert_eq!(phrase, "hello world");
        assert_eq!(receipt.message_id.as_deref(), Some("sent-1"));
        let sent = queue.sent();
        assert_eq!(sent[0].0, SUBMIT_QUEUE);
        assert_eq!(
            sent[0].1,
            SubmissionRecord::new("mgh2xx", "hello world", "orchestratorA").to_message()
        );
    }

    #[tokio::test]
    async fn test_submit_requires_requester_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(&dir);
        config.submission.requester_id = None;
        let queue = Arc::new(FakeQueue::new());
        let app = Application::new(config, queue.clone(), None);

        assert!(matches!(
            app.check_submission_settings(),
            Err(ConfigError::Missing("submission.requester_id"))
        ));
        assert!(app.submit("hello").await.is_err());
        assert!(queue.sent().is_empty());
    }
}
