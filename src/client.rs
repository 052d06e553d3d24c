use std::sync::Arc;

use blob_store::{BlobBackend, BlobStorage};
use queue_store::{InMemoryQueueStore, QueueBackend, QueueStoreConfig};
use tracing::info;

use crate::{
    blob::BlobService,
    config::{ClientKind, ConfigError, StorageOptions},
    error::Result,
    metrics::commands::Metrics,
    queue::QueueService,
};

/// Entry point bundling the blob and queue services.
#[derive(Clone)]
pub struct StorageClient {
    blobs: BlobService,
    queues: QueueService,
}

impl StorageClient {
    /// Build backends from account options.
    pub fn from_options(options: Option<&StorageOptions>) -> Result<Self> {
        let options = options.ok_or(ConfigError::MissingOptions)?;
        options.validate()?;

        let blobs = BlobStorage::new(&options.blob_storage, Some(&options.credentials()))?;
        let queues = InMemoryQueueStore::new(options.queue_storage.clone());
        info!(
            account = %options.account_name,
            blob_storage = %options.blob_storage.path,
            "initialized storage client"
        );
        Self::with_backends(
            Some(Arc::new(blobs)),
            Some(Arc::new(queues)),
            options.queue_storage.clone(),
        )
    }

    /// Use pre-built backends.
    pub fn with_backends(
        blobs: Option<Arc<dyn BlobBackend>>,
        queues: Option<Arc<dyn QueueBackend>>,
        queue_config: QueueStoreConfig,
    ) -> Result<Self> {
        let blobs = blobs.ok_or(ConfigError::MissingClient(ClientKind::Blob))?;
        let queues = queues.ok_or(ConfigError::MissingClient(ClientKind::Queue))?;
        let metrics = Arc::new(Metrics::new());
        Ok(Self {
            blobs: BlobService::new(blobs, metrics.clone()),
            queues: QueueService::new(queues, queue_config, metrics),
        })
    }

    pub fn blobs(&self) -> &BlobService {
        &self.blobs
    }

    pub fn queues(&self) -> &QueueService {
        &self.queues
    }
}
