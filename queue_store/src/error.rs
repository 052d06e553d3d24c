pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue not found: {queue}")]
    QueueNotFound { queue: String },

    #[error("Message {message_id} not found in queue {queue}")]
    MessageNotFound { queue: String, message_id: String },

    /// The message was received again since the pop receipt was issued.
    #[error("Pop receipt does not match the latest delivery of message {message_id}")]
    PopReceiptMismatch { message_id: String },

    #[error("Message of {size} bytes exceeds the maximum of {max} bytes")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Invalid batch size {count}, expected 1..={max}")]
    InvalidBatchSize { count: usize, max: usize },

    #[error("Invalid queue name '{name}': {reason}")]
    InvalidQueueName { name: String, reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl QueueError {
    /// Only opaque backend faults are worth retrying. The other variants
    /// describe the request itself and fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, QueueError::Other(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable() {
        assert!(QueueError::Other(anyhow::anyhow!("connection reset")).is_retryable());
        assert!(!QueueError::PopReceiptMismatch {
            message_id: "m1".to_string()
        }
        .is_retryable());
        assert!(!QueueError::MessageTooLarge { size: 2, max: 1 }.is_retryable());
    }
}
