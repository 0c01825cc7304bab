//! Stage runner: fetch → intake → reassemble → submit
//!
//! Each stage is an independently retryable unit with its own
//! [`StageRetry`](crate::retry::StageRetry). Stages run strictly in
//! sequence, each consuming the previous stage's output.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::application::Application;
use crate::retry::run_stage;
use crate::types::{DrainOutcome, QueueUrl};

/// What one pipeline run did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub queue_url: QueueUrl,
    pub phrase: String,
    pub fragments: usize,
    pub outcome: DrainOutcome,
    /// Set when the submission was sent and acknowledged with an id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    pub submitted: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

pub struct Pipeline<'a> {
    app: &'a Application,
}

impl<'a> Pipeline<'a> {
    pub fn new(app: &'a Application) -> Self {
        Self { app }
    }

    /// Run every stage once, retrying each per its stage policy.
    ///
    /// With `dry_run` the submit stage is skipped and the phrase is only reported.
    pub async fn run(&self, dry_run: bool) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", run_id = %run_id, dry_run);
        self.run_stages(run_id, dry_run).instrument(span).await
    }

    async fn run_stages(&self, run_id: Uuid, dry_run: bool) -> Result<RunSummary> {
        let app = self.app;
        let stages = &app.config.stages;
        let shutdown = &app.shutdown;
        let started_at = Utc::now();

        if !dry_run {
            app.check_submission_settings()?;
        }

        info!("starting run");

        let queue_url = run_stage("fetch", stages.fetch, shutdown, move |attempt| {
            app.fetch_assignment()
                .instrument(info_span!("stage", stage = "fetch", attempt))
        })
        .await?;
        info!(queue_url = %queue_url, "queue assigned");

        let url = &queue_url;
        let report = run_stage("intake", stages.intake, shutdown, move |attempt| {
            if attempt > 1 {
                warn!(
                    attempt,
                    "retrying intake from an empty collection, messages deleted by the previous attempt are lost"
                );
            }
            app.drain(url)
                .instrument(info_span!("stage", stage = "intake", attempt))
        })
        .await?;

        let fragments = &report.fragments;
        let phrase = run_stage("reassemble", stages.reassemble, shutdown, move |_| {
            std::future::ready(app.reassemble(fragments))
        })
        .await?;
        if phrase.is_empty() {
            warn!("no fragments captured, phrase is empty");
        }
        info!(phrase = %phrase, fragments = fragments.len(), "phrase reassembled");

        let message_id = if dry_run {
            info!("dry run, skipping submission");
            None
        } else {
            let text = phrase.as_str();
            let receipt = run_stage("submit", stages.submit, shutdown, move |attempt| {
                app.submit(text)
                    .instrument(info_span!("stage", stage = "submit", attempt))
            })
            .await?;
            receipt.message_id
        };

        let summary = RunSummary {
            run_id,
            queue_url,
            fragments: report.fragments.len(),
            outcome: report.outcome,
            phrase,
            message_id,
            submitted: !dry_run,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            outcome = %summary.outcome,
            submitted = summary.submitted,
            "run finished"
        );

        Ok(summary)
    }
}
