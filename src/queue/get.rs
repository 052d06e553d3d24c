use queue_store::{ReceivedMessage, MAX_BATCH_SIZE};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{validate_queue_name, QueueMessage, QueueService};
use crate::{
    commands::ReceiveMessagesCommand,
    error::{Result, StorageError},
    utils::cancellable,
};

impl QueueService {
    pub async fn receive_one(
        &self,
        queue_name: &str,
        delete_after_receiving: bool,
        cancel: &CancellationToken,
    ) -> Result<Option<QueueMessage>> {
        let command = ReceiveMessagesCommand::new(queue_name, 1, delete_after_receiving);
        Ok(self.receive(command, cancel).await?.pop())
    }

    /// Receive up to `max_messages` messages.
    ///
    /// Nothing is received while the approximate depth of the queue is zero.
    /// Received messages stay invisible for the configured visibility
    /// timeout unless they are deleted right away.
    ///
    /// When deleting, only messages whose delete succeeded are returned. A
    /// message that failed to delete is redelivered once its visibility
    /// timeout elapses. The call fails only if no delete succeeded.
    /// Cancellation stops the receive but never interrupts the deletes.
    #[tracing::instrument(skip_all, fields(
        queue = %command.queue_name(),
        max_messages = command.max_messages(),
        delete = command.delete_after_receiving(),
    ))]
    pub async fn receive(
        &self,
        command: ReceiveMessagesCommand,
        cancel: &CancellationToken,
    ) -> Result<Vec<QueueMessage>> {
        self.run("queue_receive", self.receive_messages(&command, cancel))
            .await
    }

    async fn receive_messages(
        &self,
        command: &ReceiveMessagesCommand,
        cancel: &CancellationToken,
    ) -> Result<Vec<QueueMessage>> {
        let received = cancellable(cancel, self.receive_batch(command)).await?;
        debug!(received = received.len(), "received messages");
        if !command.delete_after_receiving() {
            return Ok(received.into_iter().map(QueueMessage::from).collect());
        }
        self.delete_received(command.queue_name(), received).await
    }

    async fn receive_batch(&self, command: &ReceiveMessagesCommand) -> Result<Vec<ReceivedMessage>> {
        let queue = command.queue_name();
        validate_queue_name(queue)?;
        let count = command.max_messages();
        if !(1..=MAX_BATCH_SIZE).contains(&count) {
            return Err(StorageError::invalid_argument(format!(
                "message count must be between 1 and {}, got {}",
                MAX_BATCH_SIZE, count
            )));
        }

        self.queues.check(queue, true).await?;
        let depth = self.backend.approximate_message_count(queue).await?;
        if depth == 0 {
            debug!("queue is empty");
            return Ok(Vec::new());
        }

        Ok(self
            .backend
            .receive_messages(queue, count, self.config.visibility_timeout)
            .await?)
    }

    async fn delete_received(
        &self,
        queue: &str,
        received: Vec<ReceivedMessage>,
    ) -> Result<Vec<QueueMessage>> {
        let mut deleted = Vec::with_capacity(received.len());
        let mut first_error = None;
        for message in received {
            match self
                .backend
                .delete_message(queue, &message.message_id, &message.pop_receipt)
                .await
            {
                Ok(()) => deleted.push(QueueMessage::from(message)),
                Err(e) => {
                    warn!(
                        message_id = %message.message_id,
                        "failed to delete received message, it will be redelivered: {:?}", e
                    );
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) if deleted.is_empty() => Err(e.into()),
            _ => Ok(deleted),
        }
    }
}
