//! Error types for each pipeline stage
//!
//! Stage-level failures (`TransportError`, `ReassembleError`, `DrainError`)
//! propagate to the stage runner so the stage can be retried. `MessageError`
//! and `SnapshotError` are handled locally: the message is skipped, the
//! snapshot failure is logged.

use std::path::PathBuf;

use thiserror::Error;

/// A network or service call failed, or returned data we could not use.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("response body is not valid JSON: {0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error("response is missing string field '{field}'")]
    MissingField { field: &'static str },

    #[error("queue operation '{operation}' failed: {message}")]
    Queue {
        operation: &'static str,
        message: String,
    },
}

impl TransportError {
    pub fn queue(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Queue {
            operation,
            message: message.into(),
        }
    }
}

/// A single received message could not be turned into a fragment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("message is missing attribute '{name}'")]
    MissingAttribute { name: &'static str },

    #[error("attribute '{name}' has no string value (data type {data_type})")]
    NotAString {
        name: &'static str,
        data_type: String,
    },

    #[error("message has no receipt handle")]
    MissingReceiptHandle,
}

/// The fragment collection cannot be put in order.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReassembleError {
    #[error("order key '{key}' is not an integer")]
    MalformedKey { key: String },
}

/// The diagnostic snapshot could not be written or read.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O failed for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot JSON failed for {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// The drain loop gave up before reaching a completion heuristic.
#[derive(Debug, Error)]
pub enum DrainError {
    #[error("queue unavailable after {attempts} consecutive attempts: {source}")]
    Transport {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("drain cancelled")]
    Cancelled,
}

/// Configuration could not be loaded or is incomplete.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("missing required setting '{0}'")]
    Missing(&'static str),

    #[error("invalid setting '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}
