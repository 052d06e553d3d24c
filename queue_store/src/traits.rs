use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::QueueResult;

/// Largest accepted message body in bytes.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Largest number of messages a single receive or peek returns.
pub const MAX_BATCH_SIZE: usize = 32;

/// Returned when a message is enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub message_id: String,
    pub pop_receipt: String,
    /// Epoch milliseconds.
    pub inserted_at: u64,
    pub expires_at: u64,
    pub next_visible_at: u64,
}

/// A message delivered by a receive. Invisible to other receivers until its
/// visibility timeout elapses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedMessage {
    pub message_id: String,
    pub pop_receipt: String,
    pub text: String,
    pub inserted_at: u64,
    pub dequeue_count: u32,
}

/// A visible message observed without changing its visibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeekedMessage {
    pub message_id: String,
    pub text: String,
    pub inserted_at: u64,
    pub dequeue_count: u32,
}

#[async_trait]
pub trait QueueBackend: Send + Sync {
    async fn queue_exists(&self, queue: &str) -> QueueResult<bool>;

    /// Create the queue if it does not exist. Returns `false` when it was
    /// already there.
    async fn create_queue(&self, queue: &str) -> QueueResult<bool>;

    async fn list_queues(&self) -> QueueResult<Vec<String>>;

    async fn send_message(&self, queue: &str, text: &str) -> QueueResult<SendReceipt>;

    /// Receive up to `count` visible messages, hiding them for `visibility`.
    async fn receive_messages(
        &self,
        queue: &str,
        count: usize,
        visibility: Duration,
    ) -> QueueResult<Vec<ReceivedMessage>>;

    async fn peek_messages(&self, queue: &str, count: usize) -> QueueResult<Vec<PeekedMessage>>;

    /// Number of unexpired messages, including invisible ones.
    async fn approximate_message_count(&self, queue: &str) -> QueueResult<u64>;

    async fn delete_message(
        &self,
        queue: &str,
        message_id: &str,
        pop_receipt: &str,
    ) -> QueueResult<()>;

    /// Make a received message visible again after `visibility`. Returns the
    /// new pop receipt.
    async fn update_visibility(
        &self,
        queue: &str,
        message_id: &str,
        pop_receipt: &str,
        visibility: Duration,
    ) -> QueueResult<String>;
}
