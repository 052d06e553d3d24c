use blob_store::{PutResult, WriteMode};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{blob_error, validate_name, BlobService};
use crate::{commands::BlobCommand, error::Result, payload};

impl BlobService {
    /// Upload a new blob. Never overwrites: an existing blob of the same
    /// name fails with `BlobNameAlreadyExists`.
    #[tracing::instrument(skip_all, fields(
        container = %command.container_name(),
        blob = %command.blob_name(),
        payload = %command.payload().kind(),
    ))]
    pub async fn add(&self, command: BlobCommand, cancel: &CancellationToken) -> Result<PutResult> {
        self.run("blob_add", cancel, self.add_blob(command)).await
    }

    async fn add_blob(&self, command: BlobCommand) -> Result<PutResult> {
        let container = command.container_name().to_string();
        let blob = command.blob_name().to_string();
        let container_exists = command.does_container_exist();
        validate_name("container", &container)?;
        validate_name("blob", &blob)?;

        self.containers.check(&container, container_exists).await?;
        let payload = payload::normalize(command.into_payload(), &blob).await?;
        if !container_exists {
            self.containers.create(&container).await?;
        }

        let size = payload.len();
        let result = self
            .backend
            .upload(&container, &blob, payload.into(), WriteMode::CreateNew)
            .await
            .map_err(|e| blob_error(e, &container, &blob))?;
        self.metrics.payload_bytes.add(size, &[]);
        info!(url = %result.url, size_bytes = result.size_bytes, "added blob");
        Ok(result)
    }
}
