//! Pre-condition checks on container and queue existence.

use std::sync::Arc;

use async_trait::async_trait;
use blob_store::BlobBackend;
use queue_store::QueueBackend;
use tracing::info;

use crate::error::{Result, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ResourceKind {
    Container,
    Queue,
}

/// Answers existence queries for one kind of named resource.
#[async_trait]
pub trait ExistenceProbe: Send + Sync {
    fn kind(&self) -> ResourceKind;

    async fn exists(&self, name: &str) -> Result<bool>;

    /// Atomically create the resource; `false` if it already existed.
    async fn create(&self, name: &str) -> Result<bool>;
}

#[derive(Clone)]
pub struct ContainerProbe(pub Arc<dyn BlobBackend>);

#[async_trait]
impl ExistenceProbe for ContainerProbe {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Container
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.0.container_exists(name).await?)
    }

    async fn create(&self, name: &str) -> Result<bool> {
        Ok(self.0.create_container(name).await?)
    }
}

#[derive(Clone)]
pub struct QueueProbe(pub Arc<dyn QueueBackend>);

#[async_trait]
impl ExistenceProbe for QueueProbe {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Queue
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.0.queue_exists(name).await?)
    }

    async fn create(&self, name: &str) -> Result<bool> {
        Ok(self.0.create_queue(name).await?)
    }
}

#[derive(Clone)]
pub struct ExistenceGate<P> {
    probe: P,
}

impl<P: ExistenceProbe> ExistenceGate<P> {
    pub fn new(probe: P) -> Self {
        Self { probe }
    }

    fn does_not_exist(&self, name: &str) -> StorageError {
        match self.probe.kind() {
            ResourceKind::Container => StorageError::ContainerDoesNotExist(name.to_string()),
            ResourceKind::Queue => StorageError::QueueDoesNotExist(name.to_string()),
        }
    }

    fn already_exists(&self, name: &str) -> StorageError {
        match self.probe.kind() {
            ResourceKind::Container => StorageError::ContainerAlreadyExists(name.to_string()),
            ResourceKind::Queue => StorageError::QueueAlreadyExists(name.to_string()),
        }
    }

    /// Fails unless the existence of `name` matches `expected`.
    pub async fn check(&self, name: &str, expected: bool) -> Result<()> {
        let exists = self.probe.exists(name).await?;
        match (expected, exists) {
            (true, false) => Err(self.does_not_exist(name)),
            (false, true) => Err(self.already_exists(name)),
            _ => Ok(()),
        }
    }

    /// Creates `name`, failing if another caller created it first.
    pub async fn create(&self, name: &str) -> Result<()> {
        if !self.probe.create(name).await? {
            return Err(self.already_exists(name));
        }
        info!(kind = %self.probe.kind(), name, "created");
        Ok(())
    }
}
