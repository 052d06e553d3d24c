//! Queue operations: validated send, receive and delete by id.

mod add;
mod delete;
mod get;

use std::sync::Arc;

use opentelemetry::KeyValue;
use queue_store::{QueueBackend, QueueStoreConfig, ReceivedMessage};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    blob::validate_name,
    error::Result,
    existence::{ExistenceGate, QueueProbe},
    metrics::{commands::Metrics, Increment, Timer},
    utils::{cancellable, get_epoch_time_in_ms},
};

/// A message as handed to callers of the receive operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub message_id: String,
    pub pop_receipt: String,
    pub text: String,
    /// Epoch milliseconds.
    pub inserted_at: u64,
    pub received_at: u64,
    pub dequeue_count: u32,
}

impl From<ReceivedMessage> for QueueMessage {
    fn from(message: ReceivedMessage) -> Self {
        Self {
            message_id: message.message_id,
            pop_receipt: message.pop_receipt,
            text: message.text,
            inserted_at: message.inserted_at,
            received_at: get_epoch_time_in_ms(),
            dequeue_count: message.dequeue_count,
        }
    }
}

#[derive(Clone)]
pub struct QueueService {
    backend: Arc<dyn QueueBackend>,
    queues: ExistenceGate<QueueProbe>,
    config: QueueStoreConfig,
    metrics: Arc<Metrics>,
}

impl QueueService {
    pub fn new(
        backend: Arc<dyn QueueBackend>,
        config: QueueStoreConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            queues: ExistenceGate::new(QueueProbe(backend.clone())),
            backend,
            config,
            metrics,
        }
    }

    pub fn backend(&self) -> &Arc<dyn QueueBackend> {
        &self.backend
    }

    #[tracing::instrument(skip_all)]
    pub async fn list_queues(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        cancellable(cancel, async { Ok(self.backend.list_queues().await?) }).await
    }

    /// Runs one command future with latency and failure accounting.
    /// Cancellation is left to the command, since some must not stop halfway.
    async fn run<T>(
        &self,
        command: &'static str,
        fut: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        let labels = [KeyValue::new("command", command)];
        let _timer = Timer::start_with_labels(&self.metrics.duration, &labels);
        let _inc = Increment::inc(&self.metrics.requests, &labels);
        let result = fut.await;
        self.metrics.record(&result, &labels);
        result
    }
}

fn validate_queue_name(queue: &str) -> Result<()> {
    validate_name("queue", queue)
}
