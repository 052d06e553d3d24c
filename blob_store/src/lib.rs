//! Container-scoped blob storage over `object_store`.
//!
//! This crate provides the blob half of the storage backend used by the
//! command services. It supports:
//!
//! - Multiple backends: in-memory, local filesystem, Azure Blob Storage, S3
//! - Containers as namespaces under a storage root
//! - Conditional writes (create-only, etag-guarded replace)
//! - Signed URL generation for backends that can sign
//!
//! # Architecture
//!
//! The [`BlobBackend`] trait is the seam the services call into.
//! [`BlobStorage`] implements it on top of any [`object_store::ObjectStore`],
//! built from a [`BlobStorageConfig`] whose `path` URL selects the backend
//! (`memory:///`, `file:///…`, `az://container/prefix`, `s3://bucket/prefix`).
//!
//! # Usage
//!
//! ```rust,no_run
//! use blob_store::{BlobBackend, BlobStorage, BlobStorageConfig, UploadBody, WriteMode};
//!
//! # async fn example() -> Result<(), blob_store::BlobError> {
//! let storage = BlobStorage::new(&BlobStorageConfig::in_memory(), None)?;
//! storage.create_container("photos").await?;
//! storage
//!     .upload("photos", "cat.png", UploadBody::from(vec![1u8, 2, 3]), WriteMode::CreateNew)
//!     .await?;
//! let bytes = storage.download("photos", "cat.png").await?;
//! assert_eq!(bytes.as_ref(), &[1, 2, 3]);
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod metadata;
mod metrics;
mod presign;
mod storage;
mod traits;

pub use config::{AccountCredentials, BlobStorageConfig};
pub use error::{BlobError, BlobResult};
pub use metadata::BlobMetadata;
pub use metrics::{BlobMetrics, Timer};
pub use presign::{
    validate_expiry,
    HttpMethod,
    PresignedUrl,
    SignedAccess,
    DEFAULT_SIGNED_URL_EXPIRY,
    MAX_PRESIGN_EXPIRY,
};
pub use storage::{BlobStorage, CONTAINER_MARKER};
pub use traits::{BlobBackend, PutResult, UploadBody, WriteMode};
