//! Test helpers: scripted in-memory queue and assignment source

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::assignment::AssignmentSource;
use crate::error::TransportError;
use crate::queue::{MessageAttribute, OutgoingMessage, QueueMessage, QueueService, ReceiveRequest};
use crate::types::{QueueDepth, QueueUrl};

#[derive(Default)]
struct FakeState {
    depths: VecDeque<Result<QueueDepth, TransportError>>,
    default_depth: QueueDepth,
    batches: VecDeque<Result<Vec<QueueMessage>, TransportError>>,
    failing_deletes: HashSet<String>,
    fail_sends: bool,
    depth_calls: usize,
    receive_requests: Vec<ReceiveRequest>,
    deleted: Vec<String>,
    sent: Vec<(String, OutgoingMessage)>,
}

/// Queue whose depth readings and receive results are scripted in advance.
///
/// Once the scripted depths run out every read returns the default depth;
/// once the scripted batches run out every receive is empty.
#[derive(Default)]
pub struct FakeQueue {
    state: Mutex<FakeState>,
}

impl FakeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_depth(self, depth: QueueDepth) -> Self {
        self.state.lock().unwrap().default_depth = depth;
        self
    }

    pub fn then_depth(self, depth: QueueDepth) -> Self {
        self.state.lock().unwrap().depths.push_back(Ok(depth));
        self
    }

    pub fn then_depth_error(self) -> Self {
        self.state
            .lock()
            .unwrap()
            .depths
            .push_back(Err(TransportError::queue("get_queue_attributes", "throttled")));
        self
    }

    pub fn then_batch(self, batch: Vec<QueueMessage>) -> Self {
        self.state.lock().unwrap().batches.push_back(Ok(batch));
        self
    }

    pub fn then_empty(self) -> Self {
        self.then_batch(Vec::new())
    }

    pub fn then_receive_error(self) -> Self {
        self.state
            .lock()
            .unwrap()
            .batches
            .push_back(Err(TransportError::queue("receive_message", "connection reset")));
        self
    }

    pub fn fail_delete(self, receipt_handle: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_deletes
            .insert(receipt_handle.to_string());
        self
    }

    pub fn fail_sends(self) -> Self {
        self.state.lock().unwrap().fail_sends = true;
        self
    }

    pub fn depth_calls(&self) -> usize {
        self.state.lock().unwrap().depth_calls
    }

    pub fn receive_calls(&self) -> usize {
        self.state.lock().unwrap().receive_requests.len()
    }

    pub fn receive_requests(&self) -> Vec<ReceiveRequest> {
        self.state.lock().unwrap().receive_requests.clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn sent(&self) -> Vec<(String, OutgoingMessage)> {
        self.state.lock().unwrap().sent.clone()
    }
}

#[async_trait]
impl QueueService for FakeQueue {
    async fn depth(&self, _queue_url: &str) -> Result<QueueDepth, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.depth_calls += 1;
        let default_depth = state.default_depth;
        state.depths.pop_front().unwrap_or(Ok(default_depth))
    }

    async fn receive(
        &self,
        _queue_url: &str,
        request: &ReceiveRequest,
    ) -> Result<Vec<QueueMessage>, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.receive_requests.push(*request);
        state.batches.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn delete(&self, _queue_url: &str, receipt_handle: &str) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.failing_deletes.contains(receipt_handle) {
            return Err(TransportError::queue("delete_message", "receipt handle expired"));
        }
        state.deleted.push(receipt_handle.to_string());
        Ok(())
    }

    async fn send(
        &self,
        queue_url: &str,
        message: &OutgoingMessage,
    ) -> Result<Option<String>, TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_sends {
            return Err(TransportError::queue("send_message", "access denied"));
        }
        state.sent.push((queue_url.to_string(), message.clone()));
        Ok(Some(format!("sent-{}", state.sent.len())))
    }
}

/// Assignment source returning scripted results, then the last queue URL
pub struct FakeAssignment {
    queue_url: QueueUrl,
    failures: Mutex<usize>,
    calls: Mutex<usize>,
}

impl FakeAssignment {
    pub fn new(queue_url: &str) -> Self {
        Self {
            queue_url: QueueUrl::new(queue_url),
            failures: Mutex::new(0),
            calls: Mutex::new(0),
        }
    }

    /// Fail the first `n` fetches
    pub fn failing_first(self, n: usize) -> Self {
        *self.failures.lock().unwrap() = n;
        self
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl AssignmentSource for FakeAssignment {
    async fn fetch(&self) -> Result<QueueUrl, TransportError> {
        *self.calls.lock().unwrap() += 1;
        let mut failures = self.failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(TransportError::MissingField { field: "sqs_url" });
        }
        Ok(self.queue_url.clone())
    }
}

pub fn depth(visible: u64, invisible: u64, delayed: u64) -> QueueDepth {
    QueueDepth {
        visible,
        invisible,
        delayed,
    }
}

/// A well-formed fragment message
pub fn fragment_message(receipt_handle: &str, order_no: &str, word: &str) -> QueueMessage {
    message(receipt_handle, Some(order_no), Some(word))
}

/// A message with optional `order_no` and `word` attributes
pub fn message(receipt_handle: &str, order_no: Option<&str>, word: Option<&str>) -> QueueMessage {
    let mut msg = QueueMessage {
        message_id: Some(format!("id-{}", receipt_handle)),
        receipt_handle: Some(receipt_handle.to_string()),
        body: Some("fragment".to_string()),
        ..Default::default()
    };
    if let Some(order_no) = order_no {
        msg.attributes
            .insert("order_no".to_string(), MessageAttribute::string(order_no));
    }
    if let Some(word) = word {
        msg.attributes
            .insert("word".to_string(), MessageAttribute::string(word));
    }
    msg
}
