//! Blob operations: validated add, update, delete and get.

mod add;
mod delete;
mod get;
mod update;

use std::sync::Arc;

use blob_store::{BlobBackend, BlobError};
use opentelemetry::KeyValue;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{Result, StorageError},
    existence::{ContainerProbe, ExistenceGate},
    metrics::{commands::Metrics, Increment, Timer},
    utils::cancellable,
};

#[derive(Clone)]
pub struct BlobService {
    backend: Arc<dyn BlobBackend>,
    containers: ExistenceGate<ContainerProbe>,
    metrics: Arc<Metrics>,
}

impl BlobService {
    pub fn new(backend: Arc<dyn BlobBackend>, metrics: Arc<Metrics>) -> Self {
        Self {
            containers: ExistenceGate::new(ContainerProbe(backend.clone())),
            backend,
            metrics,
        }
    }

    pub fn backend(&self) -> &Arc<dyn BlobBackend> {
        &self.backend
    }

    #[tracing::instrument(skip_all)]
    pub async fn list_containers(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        cancellable(cancel, async { Ok(self.backend.list_containers().await?) }).await
    }

    #[tracing::instrument(skip_all, fields(container = %container))]
    pub async fn list_blobs(
        &self,
        container: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        cancellable(cancel, async {
            validate_name("container", container)?;
            self.containers.check(container, true).await?;
            Ok(self.backend.list_blobs(container).await?)
        })
        .await
    }

    /// Runs one command future with cancellation, latency and failure
    /// accounting.
    async fn run<T>(
        &self,
        command: &'static str,
        cancel: &CancellationToken,
        fut: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        let labels = [KeyValue::new("command", command)];
        let _timer = Timer::start_with_labels(&self.metrics.duration, &labels);
        let _inc = Increment::inc(&self.metrics.requests, &labels);
        let result = cancellable(cancel, fut).await;
        self.metrics.record(&result, &labels);
        result
    }
}

pub(crate) fn validate_name(what: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(StorageError::invalid_argument(format!(
            "{} name must not be empty",
            what
        )));
    }
    Ok(())
}

/// Maps backend failures on a single blob into command errors.
fn blob_error(err: BlobError, container: &str, blob: &str) -> StorageError {
    match err {
        BlobError::NotFound { .. } => StorageError::BlobDoesNotExist {
            container: container.to_string(),
            blob: blob.to_string(),
        },
        BlobError::AlreadyExists { .. } => StorageError::BlobNameAlreadyExists {
            container: container.to_string(),
            blob: blob.to_string(),
        },
        BlobError::Precondition { .. } => StorageError::PreconditionFailed {
            resource: format!("{}/{}", container, blob),
        },
        err => err.into(),
    }
}
