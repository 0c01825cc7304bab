//! Assignment fetching
//!
//! One POST to the assignment endpoint returns the URL of the queue this
//! run has to drain. Without it nothing else can happen, so every failure
//! is returned to the caller.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use crate::error::TransportError;
use crate::types::QueueUrl;

/// Response field carrying the queue URL
pub const QUEUE_URL_FIELD: &str = "sqs_url";

#[async_trait]
pub trait AssignmentSource: Send + Sync {
    async fn fetch(&self) -> Result<QueueUrl, TransportError>;
}

/// Fetches assignments over HTTP
#[derive(Debug, Clone)]
pub struct HttpAssignmentClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpAssignmentClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http, endpoint))
    }

    pub fn with_client(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AssignmentSource for HttpAssignmentClient {
    async fn fetch(&self) -> Result<QueueUrl, TransportError> {
        debug!(endpoint = %self.endpoint, "requesting assignment");

        let response = self
            .http
            .post(&self.endpoint)
            .send()
            .await?
            .error_for_status()?;
        let body = response.bytes().await?;
        let json: JsonValue = serde_json::from_slice(&body)?;

        let queue_url = queue_url_from_body(&json)?;
        info!(queue_url = %queue_url, "assignment received");
        Ok(queue_url)
    }
}

/// Extract the queue URL from an assignment response body
pub fn queue_url_from_body(body: &JsonValue) -> Result<QueueUrl, TransportError> {
    body.get(QUEUE_URL_FIELD)
        .and_then(JsonValue::as_str)
        .map(QueueUrl::new)
        .ok_or(TransportError::MissingField {
            field: QUEUE_URL_FIELD,
        })
}
