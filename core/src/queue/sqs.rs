use async_trait::async_trait;
use aws_sdk_sqs::config::Region;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::types::{
    Message, MessageAttributeValue, MessageSystemAttributeName, QueueAttributeName,
};
use aws_sdk_sqs::Client;
use std::collections::HashMap;
use tracing::debug;

use super::{
    MessageAttribute, OutgoingMessage, QueueMessage, QueueService, ReceiveRequest,
    STRING_DATA_TYPE,
};
use crate::config::QueueConfig;
use crate::error::TransportError;
use crate::types::QueueDepth;

/// Queue service backed by Amazon SQS
#[derive(Clone, Debug)]
pub struct SqsQueue {
    client: Client,
}

impl SqsQueue {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the ambient provider chain plus config overrides
    pub async fn from_config(config: &QueueConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_sqs::config::Builder::from(&shared);
        if let Some(url) = &config.endpoint_url {
            debug!(endpoint_url = %url, "using queue endpoint override");
            builder = builder.endpoint_url(url);
        }

        Self::new(Client::from_conf(builder.build()))
    }
}

fn counter(
    attributes: &HashMap<QueueAttributeName, String>,
    name: QueueAttributeName,
) -> Result<u64, TransportError> {
    let raw = attributes.get(&name).ok_or_else(|| {
        TransportError::queue(
            "get_queue_attributes",
            format!("attribute {} missing from response", name.as_str()),
        )
    })?;

    raw.parse::<u64>().map_err(|e| {
        TransportError::queue(
            "get_queue_attributes",
            format!("attribute {} = {:?}: {}", name.as_str(), raw, e),
        )
    })
}

fn into_queue_message(message: Message) -> QueueMessage {
    let attributes = message
        .message_attributes
        .unwrap_or_default()
        .into_iter()
        .map(|(name, value)| {
            let attribute = MessageAttribute {
                data_type: value.data_type().to_string(),
                string_value: value.string_value,
            };
            (name, attribute)
        })
        .collect();

    QueueMessage {
        message_id: message.message_id,
        receipt_handle: message.receipt_handle,
        body: message.body,
        attributes,
    }
}

#[async_trait]
impl QueueService for SqsQueue {
    async fn depth(&self, queue_url: &str) -> Result<QueueDepth, TransportError> {
        let output = self
            .client
            .get_queue_attributes()
            .queue_url(queue_url)
            .attribute_names(QueueAttributeName::ApproximateNumberOfMessages)
            .attribute_names(QueueAttributeName::ApproximateNumberOfMessagesNotVisible)
            .attribute_names(QueueAttributeName::ApproximateNumberOfMessagesDelayed)
            .send()
            .await
            .map_err(|e| {
                TransportError::queue("get_queue_attributes", DisplayErrorContext(&e).to_string())
            })?;

        let attributes = output.attributes.unwrap_or_default();
        Ok(QueueDepth {
            visible: counter(&attributes, QueueAttributeName::ApproximateNumberOfMessages)?,
            invisible: counter(
                &attributes,
                QueueAttributeName::ApproximateNumberOfMessagesNotVisible,
            )?,
            delayed: counter(
                &attributes,
                QueueAttributeName::ApproximateNumberOfMessagesDelayed,
            )?,
        })
    }

    async fn receive(
        &self,
        queue_url: &str,
        request: &ReceiveRequest,
    ) -> Result<Vec<QueueMessage>, TransportError> {
        let output = self
            .client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(request.max_messages)
            .message_attribute_names("All")
            .message_system_attribute_names(MessageSystemAttributeName::All)
            .visibility_timeout(request.visibility_timeout_secs)
            .wait_time_seconds(request.wait_time_secs)
            .send()
            .await
            .map_err(|e| {
                TransportError::queue("receive_message", DisplayErrorContext(&e).to_string())
            })?;

        Ok(output
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(into_queue_message)
            .collect())
    }

    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> Result<(), TransportError> {
        self.client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| {
                TransportError::queue("delete_message", DisplayErrorContext(&e).to_string())
            })?;

        Ok(())
    }

    async fn send(
        &self,
        queue_url: &str,
        message: &OutgoingMessage,
    ) -> Result<Option<String>, TransportError> {
        let mut request = self
            .client
            .send_message()
            .queue_url(queue_url)
            .message_body(&message.body);

        for (name, value) in &message.attributes {
            let attribute = MessageAttributeValue::builder()
                .data_type(STRING_DATA_TYPE)
                .string_value(value)
                .build()
                .map_err(|e| TransportError::queue("send_message", e.to_string()))?;
            request = request.message_attributes(name, attribute);
        }

        let output = request.send().await.map_err(|e| {
            TransportError::queue("send_message", DisplayErrorContext(&e).to_string())
        })?;

        Ok(output.message_id)
    }
}
