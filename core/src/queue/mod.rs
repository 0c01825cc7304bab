//! Queue service abstraction
//!
//! Every stage that touches a queue receives a `&dyn QueueService` so that
//! tests can substitute an in-memory fake for the real service.

mod sqs;

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;

use crate::error::{MessageError, TransportError};
use crate::types::QueueDepth;

pub use sqs::SqsQueue;

/// Data type used for every attribute this crate sends
pub const STRING_DATA_TYPE: &str = "String";

/// Parameters of a single receive call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveRequest {
    pub max_messages: i32,
    pub visibility_timeout_secs: i32,
    pub wait_time_secs: i32,
}

/// A typed message attribute as delivered by the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAttribute {
    pub data_type: String,
    pub string_value: Option<String>,
}

impl MessageAttribute {
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            data_type: STRING_DATA_TYPE.to_string(),
            string_value: Some(value.into()),
        }
    }
}

/// A received message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: Option<String>,
    pub receipt_handle: Option<String>,
    pub body: Option<String>,
    pub attributes: HashMap<String, MessageAttribute>,
}

impl QueueMessage {
    pub fn receipt_handle(&self) -> Result<&str, MessageError> {
        self.receipt_handle
            .as_deref()
            .ok_or(MessageError::MissingReceiptHandle)
    }

    /// Read a required attribute as a string.
    ///
    /// Numeric attributes are accepted too: the queue carries them as
    /// strings. Only attributes without a string value (binary) fail.
    pub fn string_attribute(&self, name: &'static str) -> Result<&str, MessageError> {
        let attribute = self
            .attributes
            .get(name)
            .ok_or(MessageError::MissingAttribute { name })?;

        attribute
            .string_value
            .as_deref()
            .ok_or_else(|| MessageError::NotAString {
                name,
                data_type: attribute.data_type.clone(),
            })
    }
}

/// A message to send, with string attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub body: String,
    pub attributes: BTreeMap<String, String>,
}

#[async_trait]
pub trait QueueService: Send + Sync {
    /// Read the approximate visible/in-flight/delayed counters
    async fn depth(&self, queue_url: &str) -> Result<QueueDepth, TransportError>;

    /// Receive up to `request.max_messages` messages with all attributes
    async fn receive(
        &self,
        queue_url: &str,
        request: &ReceiveRequest,
    ) -> Result<Vec<QueueMessage>, TransportError>;

    /// Acknowledge a message by its receipt handle
    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> Result<(), TransportError>;

    /// Send one message, returning the service-assigned message id
    async fn send(
        &self,
        queue_url: &str,
        message: &OutgoingMessage,
    ) -> Result<Option<String>, TransportError>;
}
