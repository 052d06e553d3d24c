use std::path::PathBuf;

use blob_store::BlobError;
use queue_store::QueueError;

use crate::{config::ConfigError, payload::PayloadKind};

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Container '{0}' does not exist")]
    ContainerDoesNotExist(String),

    #[error("Container '{0}' already exists")]
    ContainerAlreadyExists(String),

    #[error("Queue '{0}' does not exist")]
    QueueDoesNotExist(String),

    #[error("Queue '{0}' already exists")]
    QueueAlreadyExists(String),

    #[error("Blob '{blob}' does not exist in container '{container}'")]
    BlobDoesNotExist { container: String, blob: String },

    #[error("Blob '{blob}' already exists in container '{container}'")]
    BlobNameAlreadyExists { container: String, blob: String },

    #[error("{kind} payload for '{resource}' is null")]
    NullPayload { resource: String, kind: PayloadKind },

    #[error("{kind} payload for '{resource}' is empty")]
    EmptyPayload { resource: String, kind: PayloadKind },

    #[error("Invalid base64 data '{data}' for '{resource}'")]
    InvalidEncoding { resource: String, data: String },

    #[error("File '{}' for '{resource}' was not found", .path.display())]
    FileNotFound { resource: String, path: PathBuf },

    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    /// A conditional write lost against a concurrent modification.
    #[error("'{resource}' was modified concurrently")]
    PreconditionFailed { resource: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Storage backend error: {source}")]
    Backend { source: anyhow::Error },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        StorageError::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Identifies failures that may succeed when the operation is retried.
    ///
    /// Lost conditional writes are retryable. Backend failures defer to
    /// [`BlobError::is_retryable`] and [`QueueError::is_retryable`]; any
    /// other backend source is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::PreconditionFailed { .. } => true,
            StorageError::Backend { source } => {
                if let Some(err) = source.downcast_ref::<BlobError>() {
                    err.is_retryable()
                } else if let Some(err) = source.downcast_ref::<QueueError>() {
                    err.is_retryable()
                } else {
                    false
                }
            }
            _ => false,
        }
    }
}

impl From<BlobError> for StorageError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::Unauthorized { reason } | BlobError::PresignError { reason } => {
                StorageError::Unauthorized { reason }
            }
            BlobError::Precondition { path } => StorageError::PreconditionFailed { resource: path },
            BlobError::InvalidName { name, reason } => StorageError::InvalidArgument {
                reason: format!("invalid name '{}': {}", name, reason),
            },
            BlobError::IoError { source } => StorageError::Io(source),
            err => StorageError::Backend {
                source: anyhow::Error::from(err),
            },
        }
    }
}

impl From<QueueError> for StorageError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::QueueNotFound { queue } => StorageError::QueueDoesNotExist(queue),
            QueueError::InvalidBatchSize { .. } | QueueError::InvalidQueueName { .. } => {
                StorageError::InvalidArgument {
                    reason: err.to_string(),
                }
            }
            err => StorageError::Backend {
                source: anyhow::Error::from(err),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_mapping() {
        let err = StorageError::from(BlobError::Unauthorized {
            reason: "no credentials".to_string(),
        });
        assert!(matches!(err, StorageError::Unauthorized { .. }));

        let err = StorageError::from(BlobError::NetworkError {
            source: anyhow::anyhow!("connection reset"),
        });
        assert!(matches!(err, StorageError::Backend { .. }));
        assert!(err.is_retryable());

        let err = StorageError::from(QueueError::MessageTooLarge {
            size: 70_000,
            max: 65_536,
        });
        assert!(matches!(err, StorageError::Backend { .. }));
        assert!(!err.is_retryable());

        let err = StorageError::from(QueueError::Other(anyhow::anyhow!("connection reset")));
        assert!(matches!(err, StorageError::Backend { .. }));
        assert!(err.is_retryable());

        let err = StorageError::Backend {
            source: anyhow::anyhow!("unknown failure"),
        };
        assert!(!err.is_retryable());

        let err = StorageError::from(BlobError::Precondition {
            path: "photos/cat.png".to_string(),
        });
        assert!(matches!(err, StorageError::PreconditionFailed { .. }));
        assert!(err.is_retryable());

        let err = StorageError::from(QueueError::QueueNotFound {
            queue: "orders".to_string(),
        });
        assert!(matches!(err, StorageError::QueueDoesNotExist(ref q) if q == "orders"));
    }

    #[test]
    fn test_messages_name_the_resource() {
        let err = StorageError::InvalidEncoding {
            resource: "cat.png".to_string(),
            data: "not base64!".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("cat.png"));
        assert!(message.contains("not base64!"));

        let err = StorageError::EmptyPayload {
            resource: "cat.png".to_string(),
            kind: PayloadKind::Base64,
        };
        assert_eq!(err.to_string(), "base64 payload for 'cat.png' is empty");
    }
}
