use std::time::Duration;

use queue_store::{ReceivedMessage, MAX_BATCH_SIZE};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{validate_queue_name, QueueService};
use crate::{
    commands::DeleteMessageCommand,
    error::{Result, StorageError},
    utils::cancellable,
};

impl QueueService {
    /// Delete a message by id.
    ///
    /// Only visible messages can be deleted: the message is located with a
    /// peek, then received to obtain a pop receipt. Messages ahead of it in
    /// the queue are received too and released immediately, so their pop
    /// receipts change and their dequeue counts go up by one. Messages
    /// behind it are untouched. Returns `false` when no visible message has
    /// the id.
    #[tracing::instrument(skip_all, fields(
        queue = %command.queue_name(),
        message_id = %command.message_id(),
    ))]
    pub async fn delete(
        &self,
        command: DeleteMessageCommand,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        self.run("queue_delete", self.delete_message(&command, cancel))
            .await
    }

    async fn delete_message(
        &self,
        command: &DeleteMessageCommand,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let queue = command.queue_name();
        let message_id = command.message_id();
        let Some(received) = cancellable(cancel, self.receive_through(command)).await? else {
            return Ok(false);
        };

        // Received messages are always released, even after a failed delete.
        let mut result = Ok(false);
        for message in received {
            if message.message_id == message_id {
                result = self
                    .backend
                    .delete_message(queue, &message.message_id, &message.pop_receipt)
                    .await
                    .map(|()| true)
                    .map_err(StorageError::from);
                continue;
            }
            if let Err(e) = self
                .backend
                .update_visibility(queue, &message.message_id, &message.pop_receipt, Duration::ZERO)
                .await
            {
                warn!(message_id = %message.message_id, "failed to release message: {:?}", e);
            }
        }
        result
    }

    /// Receives the visible messages up to and including `message_id`.
    async fn receive_through(
        &self,
        command: &DeleteMessageCommand,
    ) -> Result<Option<Vec<ReceivedMessage>>> {
        let queue = command.queue_name();
        validate_queue_name(queue)?;
        self.queues.check(queue, true).await?;

        let visible = self.backend.peek_messages(queue, MAX_BATCH_SIZE).await?;
        let Some(position) = visible
            .iter()
            .position(|m| m.message_id == command.message_id())
        else {
            debug!("message is not visible");
            return Ok(None);
        };

        let received = self
            .backend
            .receive_messages(queue, position + 1, self.config.lookup_visibility_timeout)
            .await?;
        Ok(Some(received))
    }
}
