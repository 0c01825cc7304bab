use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use crate::error::TransportError;
use crate::queue::{OutgoingMessage, QueueService};
use crate::types::SubmissionRecord;

pub const REQUESTER_ATTRIBUTE: &str = "uvaid";
pub const PHRASE_ATTRIBUTE: &str = "phrase";
pub const PLATFORM_ATTRIBUTE: &str = "platform";

/// What the submission queue acknowledged
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionReceipt {
    pub message_id: Option<String>,
}

impl SubmissionRecord {
    pub fn new(
        requester_id: impl Into<String>,
        message: impl Into<String>,
        origin_tag: impl Into<String>,
    ) -> Self {
        Self {
            requester_id: requester_id.into(),
            message: message.into(),
            origin_tag: origin_tag.into(),
        }
    }

    /// Body is the phrase itself; the three attributes repeat it with its metadata
    pub fn to_message(&self) -> OutgoingMessage {
        let mut attributes = BTreeMap::new();
        attributes.insert(REQUESTER_ATTRIBUTE.to_string(), self.requester_id.clone());
        attributes.insert(PHRASE_ATTRIBUTE.to_string(), self.message.clone());
        attributes.insert(PLATFORM_ATTRIBUTE.to_string(), self.origin_tag.clone());

        OutgoingMessage {
            body: self.message.clone(),
            attributes,
        }
    }
}

/// Send the record to the submission queue. Not retried here.
pub async fn submit(
    queue: &dyn QueueService,
    destination: &str,
    record: &SubmissionRecord,
) -> Result<SubmissionReceipt, TransportError> {
    let message_id = queue.send(destination, &record.to_message()).await?;

    info!(
        requester_id = %record.requester_id,
        platform = %record.origin_tag,
        message_id = message_id.as_deref().unwrap_or("-"),
        "submission sent"
    );

    Ok(SubmissionReceipt { message_id })
}
