//! Layered configuration
//!
//! Sources, lowest to highest precedence:
//! 1. Built-in defaults
//! 2. TOML file (`--config`, else `SCATTER_CONFIG_PATH`, else `./scatter.toml` if present)
//! 3. Environment variables `SCATTER__<SECTION>__<KEY>` (a `.env` file is loaded first)
//! 4. Explicit overrides set on [`ConfigBuilder`]

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ::config::{Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::retry::{BackoffPolicy, StageRetry};

const DEFAULT_CONFIG_FILE: &str = "scatter.toml";

/// Largest batch the queue service hands out per receive call
pub const MAX_RECEIVE_BATCH: i32 = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub assignment: AssignmentConfig,
    pub queue: QueueConfig,
    pub intake: IntakeConfig,
    pub submission: SubmissionConfig,
    pub stages: StagesConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignmentConfig {
    /// Endpoint that hands out the queue to drain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Region for the queue client; falls back to the ambient provider chain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Endpoint override, e.g. a local queue emulator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    pub max_messages: i32,
    pub visibility_timeout_secs: i32,
    pub wait_time_secs: i32,
    /// Sleep between empty polls while the queue still reports messages
    pub empty_poll_delay_secs: u64,
    /// Consecutive empty polls after which the queue is assumed drained
    pub max_empty_polls: u32,
    /// Hard bound on receive calls; unset means unbounded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_polls: Option<u64>,
    pub snapshot_path: PathBuf,
    pub retry: BackoffPolicy,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            max_messages: MAX_RECEIVE_BATCH,
            visibility_timeout_secs: 60,
            wait_time_secs: 10,
            empty_poll_delay_secs: 30,
            max_empty_polls: 10,
            max_polls: None,
            snapshot_path: PathBuf::from("messages.json"),
            retry: BackoffPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requester_id: Option<String>,
    /// Origin tag identifying which orchestrator produced the submission
    pub platform: String,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            queue_url: None,
            requester_id: None,
            platform: "scatter".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagesConfig {
    pub fetch: StageRetry,
    pub intake: StageRetry,
    pub reassemble: StageRetry,
    pub submit: StageRetry,
}

impl Default for StagesConfig {
    fn default() -> Self {
        Self {
            fetch: StageRetry::new(10, 10),
            intake: StageRetry::new(2, 5),
            reassemble: StageRetry::new(2, 10),
            submit: StageRetry::new(2, 10),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load from file and environment with no explicit overrides
    pub fn load() -> Result<Self, ConfigError> {
        Self::builder().build()
    }

    pub fn assignment_endpoint(&self) -> Result<&str, ConfigError> {
        self.assignment
            .endpoint
            .as_deref()
            .ok_or(ConfigError::Missing("assignment.endpoint"))
    }

    pub fn submission_queue_url(&self) -> Result<&str, ConfigError> {
        self.submission
            .queue_url
            .as_deref()
            .ok_or(ConfigError::Missing("submission.queue_url"))
    }

    pub fn requester_id(&self) -> Result<&str, ConfigError> {
        self.submission
            .requester_id
            .as_deref()
            .ok_or(ConfigError::Missing("submission.requester_id"))
    }

    /// Check settings that are wrong regardless of which stage runs
    pub fn validate(&self) -> Result<(), ConfigError> {
        let intake = &self.intake;
        if !(1..=MAX_RECEIVE_BATCH).contains(&intake.max_messages) {
            return Err(ConfigError::Invalid {
                key: "intake.max_messages",
                reason: format!(
                    "must be between 1 and {}, got {}",
                    MAX_RECEIVE_BATCH, intake.max_messages
                ),
            });
        }
        if intake.max_empty_polls == 0 {
            return Err(ConfigError::Invalid {
                key: "intake.max_empty_polls",
                reason: "must be at least 1".to_string(),
            });
        }
        if intake.visibility_timeout_secs < 0 {
            return Err(ConfigError::Invalid {
                key: "intake.visibility_timeout_secs",
                reason: "cannot be negative".to_string(),
            });
        }
        if intake.wait_time_secs < 0 {
            return Err(ConfigError::Invalid {
                key: "intake.wait_time_secs",
                reason: "cannot be negative".to_string(),
            });
        }
        if self.submission.platform.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "submission.platform",
                reason: "cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for [`Config`] with explicit overrides (typically from CLI flags)
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    assignment_endpoint: Option<String>,
    region: Option<String>,
    queue_endpoint_url: Option<String>,
    submission_queue_url: Option<String>,
    requester_id: Option<String>,
    platform: Option<String>,
    snapshot_path: Option<PathBuf>,
    environment: Option<HashMap<String, String>>,
}

impl ConfigBuilder {
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn assignment_endpoint(mut self, endpoint: Option<String>) -> Self {
        self.assignment_endpoint = endpoint;
        self
    }

    pub fn region(mut self, region: Option<String>) -> Self {
        self.region = region;
        self
    }

    pub fn queue_endpoint_url(mut self, url: Option<String>) -> Self {
        self.queue_endpoint_url = url;
        self
    }

    pub fn submission_queue_url(mut self, url: Option<String>) -> Self {
        self.submission_queue_url = url;
        self
    }

    pub fn requester_id(mut self, requester_id: Option<String>) -> Self {
        self.requester_id = requester_id;
        self
    }

    pub fn platform(mut self, platform: Option<String>) -> Self {
        self.platform = platform;
        self
    }

    pub fn snapshot_path(mut self, path: Option<PathBuf>) -> Self {
        self.snapshot_path = path;
        self
    }

    /// Read `SCATTER__*` variables from `vars` instead of the process environment
    pub fn environment(mut self, vars: Option<HashMap<String, String>>) -> Self {
        self.environment = vars;
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        // A missing .env is normal
        let _ = dotenvy::dotenv();

        let path = self
            .config_path
            .clone()
            .or_else(|| std::env::var_os("SCATTER_CONFIG_PATH").map(PathBuf::from));

        let mut sources = ::config::Config::builder();
        sources = match path {
            Some(path) => sources.add_source(File::from(path).required(true)),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                sources.add_source(File::from(Path::new(DEFAULT_CONFIG_FILE)).required(false))
            }
            None => sources,
        };
        // Values stay strings; numeric fields are converted during
        // deserialization so ids like "007" keep their leading zeros
        sources = sources.add_source(
            Environment::with_prefix("SCATTER")
                .prefix_separator("__")
                .separator("__")
                .source(self.environment.clone()),
        );

        let mut config: Config = sources.build()?.try_deserialize()?;
        self.apply(&mut config);
        config.intake.retry = config.intake.retry.normalized();
        config.validate()?;

        Ok(config)
    }

    fn apply(self, config: &mut Config) {
        if let Some(endpoint) = self.assignment_endpoint {
            config.assignment.endpoint = Some(endpoint);
        }
        if let Some(region) = self.region {
            config.queue.region = Some(region);
        }
        if let Some(url) = self.queue_endpoint_url {
            config.queue.endpoint_url = Some(url);
        }
        if let Some(url) = self.submission_queue_url {
            config.submission.queue_url = Some(url);
        }
        if let Some(requester_id) = self.requester_id {
            config.submission.requester_id = Some(requester_id);
        }
        if let Some(platform) = self.platform {
            config.submission.platform = platform;
        }
        if let Some(path) = self.snapshot_path {
            config.intake.snapshot_path = path;
        }
    }
}
