use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{blob_error, validate_name, BlobService};
use crate::{
    commands::DeleteBlobCommand,
    error::{Result, StorageError},
};

impl BlobService {
    #[tracing::instrument(skip_all, fields(
        container = %command.container_name(),
        blob = %command.blob_name(),
    ))]
    pub async fn delete(
        &self,
        command: DeleteBlobCommand,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.run("blob_delete", cancel, self.delete_blob(&command))
            .await
    }

    async fn delete_blob(&self, command: &DeleteBlobCommand) -> Result<()> {
        let container = command.container_name();
        let blob = command.blob_name();
        validate_name("container", container)?;
        validate_name("blob", blob)?;

        self.containers.check(container, true).await?;
        if !self.backend.blob_exists(container, blob).await? {
            return Err(StorageError::BlobDoesNotExist {
                container: container.to_string(),
                blob: blob.to_string(),
            });
        }
        self.backend
            .delete_blob(container, blob)
            .await
            .map_err(|e| blob_error(e, container, blob))?;
        info!("deleted blob");
        Ok(())
    }
}
