use blob_store::{PutResult, WriteMode};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{blob_error, validate_name, BlobService};
use crate::{
    commands::BlobCommand,
    error::{Result, StorageError},
    payload,
};

impl BlobService {
    /// Replace the contents of an existing blob.
    ///
    /// The replace is conditional on the etag read before the write, so the
    /// blob is never missing while it is updated. Update never creates
    /// containers.
    #[tracing::instrument(skip_all, fields(
        container = %command.container_name(),
        blob = %command.blob_name(),
        payload = %command.payload().kind(),
    ))]
    pub async fn update(
        &self,
        command: BlobCommand,
        cancel: &CancellationToken,
    ) -> Result<PutResult> {
        self.run("blob_update", cancel, self.update_blob(command))
            .await
    }

    async fn update_blob(&self, command: BlobCommand) -> Result<PutResult> {
        let container = command.container_name().to_string();
        let blob = command.blob_name().to_string();
        let container_exists = command.does_container_exist();
        validate_name("container", &container)?;
        validate_name("blob", &blob)?;

        self.containers.check(&container, container_exists).await?;
        let payload = payload::normalize(command.into_payload(), &blob).await?;

        let does_not_exist = || StorageError::BlobDoesNotExist {
            container: container.clone(),
            blob: blob.clone(),
        };
        // A container that is absent holds nothing to replace.
        if !container_exists || !self.backend.blob_exists(&container, &blob).await? {
            return Err(does_not_exist());
        }

        let size = payload.len();
        let result = self
            .backend
            .upload(&container, &blob, payload.into(), WriteMode::ReplaceExisting)
            .await
            .map_err(|e| blob_error(e, &container, &blob))?;
        self.metrics.payload_bytes.add(size, &[]);
        info!(url = %result.url, size_bytes = result.size_bytes, "updated blob");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use queue_store::{InMemoryQueueStore, QueueStoreConfig};

    use crate::{
        commands::BlobCommand,
        error::StorageError,
        testing::{ConcurrentWriterStore, TestStorage},
    };

    #[tokio::test]
    async fn test_update_replaces_contents() {
        let test = TestStorage::new();
        test.put_blob("photos", "cat.png", b"old").await;

        let result = test
            .client
            .blobs()
            .update(
                BlobCommand::bytes("photos", "cat.png", Bytes::from_static(b"new!"), true),
                &test.cancel,
            )
            .await
            .unwrap();
        assert_eq!(result.size_bytes, 4);
        assert_eq!(test.read_blob("photos", "cat.png").await.as_ref(), b"new!");
    }

    #[tokio::test]
    async fn test_update_missing_blob_uploads_nothing() {
        let test = TestStorage::new();
        test.create_container("photos").await;

        let err = test
            .client
            .blobs()
            .update(
                BlobCommand::bytes("photos", "cat.png", Bytes::from_static(b"new"), true),
                &test.cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::BlobDoesNotExist { .. }));
        assert!(!test
            .client
            .blobs()
            .backend()
            .blob_exists("photos", "cat.png")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_update_never_creates_containers() {
        let test = TestStorage::new();
        let blobs = test.client.blobs();

        let err = blobs
            .update(
                BlobCommand::bytes("photos", "cat.png", Bytes::from_static(b"new"), false),
                &test.cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::BlobDoesNotExist { .. }));
        assert!(!blobs.backend().container_exists("photos").await.unwrap());

        test.put_blob("photos", "cat.png", b"old").await;
        let err = blobs
            .update(
                BlobCommand::bytes("photos", "cat.png", Bytes::from_static(b"new"), false),
                &test.cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ContainerAlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_update_validates_payload_first() {
        let test = TestStorage::new();
        test.put_blob("photos", "cat.png", b"old").await;

        let err = test
            .client
            .blobs()
            .update(
                BlobCommand::bytes("photos", "cat.png", Bytes::new(), true),
                &test.cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::EmptyPayload { .. }));
        assert_eq!(test.read_blob("photos", "cat.png").await.as_ref(), b"old");
    }

    #[tokio::test]
    async fn test_update_losing_a_race_keeps_concurrent_write() {
        let test = TestStorage::with_backends(
            Arc::new(ConcurrentWriterStore::blob_storage()),
            Arc::new(InMemoryQueueStore::new(QueueStoreConfig::default())),
        );
        test.put_blob("photos", "cat.png", b"old").await;

        let err = test
            .client
            .blobs()
            .update(
                BlobCommand::bytes("photos", "cat.png", Bytes::from_static(b"new"), true),
                &test.cancel,
            )
            .await
            .unwrap_err();
        assert!(
            matches!(err, StorageError::PreconditionFailed { ref resource } if resource == "photos/cat.png")
        );
        assert!(err.is_retryable());
        assert_eq!(
            test.read_blob("photos", "cat.png").await.as_ref(),
            ConcurrentWriterStore::CONCURRENT_BYTES
        );
    }
}
