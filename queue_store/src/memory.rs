use std::{
    collections::VecDeque,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use tracing::debug;

use crate::{
    PeekedMessage,
    QueueBackend,
    QueueError,
    QueueResult,
    QueueStoreConfig,
    ReceivedMessage,
    SendReceipt,
    MAX_BATCH_SIZE,
    MAX_MESSAGE_SIZE,
};

#[derive(Debug, Clone)]
struct StoredMessage {
    message_id: String,
    pop_receipt: String,
    text: String,
    inserted_at: u64,
    expires_at: u64,
    visible_at: u64,
    dequeue_count: u32,
}

impl StoredMessage {
    fn is_expired(&self, now: u64) -> bool {
        self.expires_at <= now
    }

    fn is_visible(&self, now: u64) -> bool {
        self.visible_at <= now
    }
}

/// In-process queue store.
#[derive(Debug, Default)]
pub struct InMemoryQueueStore {
    queues: DashMap<String, VecDeque<StoredMessage>>,
    config: QueueStoreConfig,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

fn new_pop_receipt() -> String {
    nanoid::nanoid!()
}

fn validate_queue_name(name: &str) -> QueueResult<()> {
    let invalid = |reason: &str| QueueError::InvalidQueueName {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    if !(3..=63).contains(&name.len()) {
        return Err(invalid("must be between 3 and 63 characters long"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(invalid("only lowercase letters, digits and '-' are allowed"));
    }
    if name.starts_with('-') || name.ends_with('-') || name.contains("--") {
        return Err(invalid("'-' must be surrounded by letters or digits"));
    }
    Ok(())
}

fn check_batch_size(count: usize) -> QueueResult<()> {
    if count == 0 || count > MAX_BATCH_SIZE {
        return Err(QueueError::InvalidBatchSize {
            count,
            max: MAX_BATCH_SIZE,
        });
    }
    Ok(())
}

impl InMemoryQueueStore {
    pub fn new(config: QueueStoreConfig) -> Self {
        Self {
            queues: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &QueueStoreConfig {
        &self.config
    }

    /// Runs `f` over the unexpired messages of `queue`.
    fn with_queue<T>(
        &self,
        queue: &str,
        f: impl FnOnce(&mut VecDeque<StoredMessage>, u64) -> QueueResult<T>,
    ) -> QueueResult<T> {
        let mut messages = self
            .queues
            .get_mut(queue)
            .ok_or_else(|| QueueError::QueueNotFound {
                queue: queue.to_string(),
            })?;
        let now = now_ms();
        messages.retain(|message| !message.is_expired(now));
        f(messages.value_mut(), now)
    }

    fn find_delivery<'a>(
        queue: &str,
        messages: &'a mut VecDeque<StoredMessage>,
        message_id: &str,
        pop_receipt: &str,
    ) -> QueueResult<(usize, &'a mut StoredMessage)> {
        let (index, message) = messages
            .iter_mut()
            .enumerate()
            .find(|(_, message)| message.message_id == message_id)
            .ok_or_else(|| QueueError::MessageNotFound {
                queue: queue.to_string(),
                message_id: message_id.to_string(),
            })?;
        if message.pop_receipt != pop_receipt {
            return Err(QueueError::PopReceiptMismatch {
                message_id: message_id.to_string(),
            });
        }
        Ok((index, message))
    }
}

#[async_trait]
impl QueueBackend for InMemoryQueueStore {
    async fn queue_exists(&self, queue: &str) -> QueueResult<bool> {
        Ok(self.queues.contains_key(queue))
    }

    async fn create_queue(&self, queue: &str) -> QueueResult<bool> {
        validate_queue_name(queue)?;
        match self.queues.entry(queue.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(entry) => {
                entry.insert(VecDeque::new());
                debug!(queue, "created queue");
                Ok(true)
            }
        }
    }

    async fn list_queues(&self) -> QueueResult<Vec<String>> {
        let mut queues: Vec<String> = self.queues.iter().map(|e| e.key().clone()).collect();
        queues.sort();
        Ok(queues)
    }

    async fn send_message(&self, queue: &str, text: &str) -> QueueResult<SendReceipt> {
        if text.len() > MAX_MESSAGE_SIZE {
            return Err(QueueError::MessageTooLarge {
                size: text.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }
        let message_ttl = self.config.message_ttl.as_millis() as u64;
        self.with_queue(queue, |messages, now| {
            let message = StoredMessage {
                message_id: uuid::Uuid::new_v4().to_string(),
                pop_receipt: new_pop_receipt(),
                text: text.to_string(),
                inserted_at: now,
                expires_at: now.saturating_add(message_ttl),
                visible_at: now,
                dequeue_count: 0,
            };
            let receipt = SendReceipt {
                message_id: message.message_id.clone(),
                pop_receipt: message.pop_receipt.clone(),
                inserted_at: message.inserted_at,
                expires_at: message.expires_at,
                next_visible_at: message.visible_at,
            };
            messages.push_back(message);
            debug!(queue, message_id = %receipt.message_id, "enqueued message");
            Ok(receipt)
        })
    }

    async fn receive_messages(
        &self,
        queue: &str,
        count: usize,
        visibility: Duration,
    ) -> QueueResult<Vec<ReceivedMessage>> {
        check_batch_size(count)?;
        let visibility = visibility.as_millis() as u64;
        self.with_queue(queue, |messages, now| {
            let received = messages
                .iter_mut()
                .filter(|message| message.is_visible(now))
                .take(count)
                .map(|message| {
                    message.pop_receipt = new_pop_receipt();
                    message.visible_at = now.saturating_add(visibility);
                    message.dequeue_count += 1;
                    ReceivedMessage {
                        message_id: message.message_id.clone(),
                        pop_receipt: message.pop_receipt.clone(),
                        text: message.text.clone(),
                        inserted_at: message.inserted_at,
                        dequeue_count: message.dequeue_count,
                    }
                })
                .collect();
            Ok(received)
        })
    }

    async fn peek_messages(&self, queue: &str, count: usize) -> QueueResult<Vec<PeekedMessage>> {
        check_batch_size(count)?;
        self.with_queue(queue, |messages, now| {
            Ok(messages
                .iter()
                .filter(|message| message.is_visible(now))
                .take(count)
                .map(|message| PeekedMessage {
                    message_id: message.message_id.clone(),
                    text: message.text.clone(),
                    inserted_at: message.inserted_at,
                    dequeue_count: message.dequeue_count,
                })
                .collect())
        })
    }

    async fn approximate_message_count(&self, queue: &str) -> QueueResult<u64> {
        self.with_queue(queue, |messages, _| Ok(messages.len() as u64))
    }

    async fn delete_message(
        &self,
        queue: &str,
        message_id: &str,
        pop_receipt: &str,
    ) -> QueueResult<()> {
        self.with_queue(queue, |messages, _| {
            let (index, _) = Self::find_delivery(queue, messages, message_id, pop_receipt)?;
            messages.remove(index);
            debug!(queue, message_id, "deleted message");
            Ok(())
        })
    }

    async fn update_visibility(
        &self,
        queue: &str,
        message_id: &str,
        pop_receipt: &str,
        visibility: Duration,
    ) -> QueueResult<String> {
        let visibility = visibility.as_millis() as u64;
        self.with_queue(queue, |messages, now| {
            let (_, message) = Self::find_delivery(queue, messages, message_id, pop_receipt)?;
            message.pop_receipt = new_pop_receipt();
            message.visible_at = now.saturating_add(visibility);
            Ok(message.pop_receipt.clone())
        })
    }
}
