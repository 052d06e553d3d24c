use queue_store::SendReceipt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{validate_queue_name, QueueService};
use crate::{
    commands::SendMessageCommand,
    error::{Result, StorageError},
    payload::PayloadKind,
    utils::cancellable,
};

impl QueueService {
    /// Enqueue a text message. When the caller expects the queue to be
    /// absent it is created first.
    #[tracing::instrument(skip_all, fields(queue = %command.queue_name()))]
    pub async fn send(
        &self,
        command: SendMessageCommand,
        cancel: &CancellationToken,
    ) -> Result<SendReceipt> {
        self.run("queue_send", cancellable(cancel, self.send_message(&command)))
            .await
    }

    /// Serialize `value` as JSON and enqueue it.
    pub async fn send_json<T: Serialize>(
        &self,
        queue_name: &str,
        value: &T,
        does_queue_exist: bool,
        cancel: &CancellationToken,
    ) -> Result<SendReceipt> {
        let text = serde_json::to_string(value).map_err(|e| {
            StorageError::invalid_argument(format!("message is not serializable: {}", e))
        })?;
        self.send(
            SendMessageCommand::new(queue_name, text, does_queue_exist),
            cancel,
        )
        .await
    }

    async fn send_message(&self, command: &SendMessageCommand) -> Result<SendReceipt> {
        let queue = command.queue_name();
        validate_queue_name(queue)?;
        let text = command.text().ok_or_else(|| StorageError::NullPayload {
            resource: queue.to_string(),
            kind: PayloadKind::Text,
        })?;
        if text.is_empty() {
            return Err(StorageError::EmptyPayload {
                resource: queue.to_string(),
                kind: PayloadKind::Text,
            });
        }

        self.queues.check(queue, command.does_queue_exist()).await?;
        if !command.does_queue_exist() {
            self.queues.create(queue).await?;
        }

        let receipt = self.backend.send_message(queue, text).await?;
        info!(message_id = %receipt.message_id, "sent message");
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use serde::Serialize;

    use crate::{commands::SendMessageCommand, error::StorageError, testing::TestStorage};

    #[tokio::test]
    async fn test_send_creates_queue_when_not_expected() {
        let test = TestStorage::new();
        let queues = test.client.queues();

        queues
            .send(SendMessageCommand::new("orders", "one".to_string(), false), &test.cancel)
            .await
            .unwrap();
        assert!(queues.backend().queue_exists("orders").await.unwrap());

        let err = queues
            .send(SendMessageCommand::new("orders", "two".to_string(), false), &test.cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::QueueAlreadyExists(_)));

        queues
            .send(SendMessageCommand::new("orders", "two".to_string(), true), &test.cancel)
            .await
            .unwrap();
        assert_eq!(
            queues.backend().approximate_message_count("orders").await.unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_send_rejects_missing_and_empty_text() {
        let test = TestStorage::new();
        test.create_queue("orders").await;
        let queues = test.client.queues();

        let err = queues
            .send(SendMessageCommand::new("orders", None::<String>, true), &test.cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NullPayload { .. }));

        let err = queues
            .send(SendMessageCommand::new("orders", String::new(), true), &test.cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::EmptyPayload { .. }));

        let err = queues
            .send(SendMessageCommand::new("missing", "x".to_string(), true), &test.cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::QueueDoesNotExist(_)));
    }

    #[tokio::test]
    async fn test_send_oversized_message() {
        let test = TestStorage::new();
        test.create_queue("orders").await;
        let err = test
            .client
            .queues()
            .send(
                SendMessageCommand::new("orders", "x".repeat(64 * 1024 + 1), true),
                &test.cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Backend { .. }));
    }

    #[tokio::test]
    async fn test_send_json() {
        #[derive(Serialize)]
        struct Order {
            id: u32,
        }

        let test = TestStorage::new();
        test.create_queue("orders").await;
        let queues = test.client.queues();
        queues
            .send_json("orders", &Order { id: 7 }, true, &test.cancel)
            .await
            .unwrap();

        let peeked = queues.backend().peek_messages("orders", 1).await.unwrap();
        assert_eq!(peeked[0].text, r#"{"id":7}"#);
    }
}
