//! Core blob backend trait.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use url::Url;

use crate::{BlobMetadata, BlobResult, PresignedUrl, SignedAccess};

/// Result of a PUT operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutResult {
    /// The URL the blob is reachable under.
    pub url: Url,

    /// Size in bytes.
    pub size_bytes: u64,

    /// ETag of the written object, when the backend reports one.
    pub e_tag: Option<String>,
}

/// Body of an upload.
pub enum UploadBody {
    /// Fully buffered payload, written in a single request.
    Bytes(Bytes),

    /// Payload streamed through a multipart upload without buffering.
    Stream {
        stream: BoxStream<'static, anyhow::Result<Bytes>>,
        content_length: u64,
    },
}

impl UploadBody {
    /// Length of the body as known before the upload starts.
    pub fn len(&self) -> u64 {
        match self {
            UploadBody::Bytes(bytes) => bytes.len() as u64,
            UploadBody::Stream { content_length, .. } => *content_length,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for UploadBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadBody::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            UploadBody::Stream { content_length, .. } => f
                .debug_struct("Stream")
                .field("stream", &"<hidden>")
                .field("content_length", content_length)
                .finish(),
        }
    }
}

impl From<Bytes> for UploadBody {
    fn from(bytes: Bytes) -> Self {
        UploadBody::Bytes(bytes)
    }
}

impl From<Vec<u8>> for UploadBody {
    fn from(bytes: Vec<u8>) -> Self {
        UploadBody::Bytes(Bytes::from(bytes))
    }
}

/// How an upload treats an existing blob of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Fail with [`BlobError::AlreadyExists`](crate::BlobError) if the blob
    /// exists.
    CreateNew,

    /// Fail with [`BlobError::NotFound`](crate::BlobError) if the blob does
    /// not exist; otherwise replace it, guarded by its current etag.
    ReplaceExisting,

    /// Write unconditionally.
    Overwrite,
}

/// Container-scoped blob operations.
///
/// Containers are namespaces that must be created before blobs can be
/// written into them. Every implementation must make `create_container` and
/// `WriteMode::CreateNew` uploads atomic with respect to concurrent callers
/// whenever the underlying store allows it.
#[async_trait]
pub trait BlobBackend: Send + Sync {
    async fn container_exists(&self, container: &str) -> BlobResult<bool>;

    /// Create a container if it does not exist.
    ///
    /// Returns `false` when the container was already there.
    async fn create_container(&self, container: &str) -> BlobResult<bool>;

    async fn list_containers(&self) -> BlobResult<Vec<String>>;

    async fn blob_exists(&self, container: &str, name: &str) -> BlobResult<bool>;

    /// Returns `BlobError::NotFound` if the blob doesn't exist.
    async fn blob_metadata(&self, container: &str, name: &str) -> BlobResult<BlobMetadata>;

    async fn upload(
        &self,
        container: &str,
        name: &str,
        body: UploadBody,
        mode: WriteMode,
    ) -> BlobResult<PutResult>;

    /// Returns `BlobError::NotFound` if the blob doesn't exist.
    async fn delete_blob(&self, container: &str, name: &str) -> BlobResult<()>;

    /// Get entire blob data.
    ///
    /// Returns `BlobError::NotFound` if the blob doesn't exist.
    async fn download(&self, container: &str, name: &str) -> BlobResult<Bytes>;

    /// Names of all blobs in a container, relative to the container.
    async fn list_blobs(&self, container: &str) -> BlobResult<Vec<String>>;

    /// Public (unsigned) URL of a blob.
    fn blob_url(&self, container: &str, name: &str) -> BlobResult<Url>;

    /// Generate a signed GET URL.
    ///
    /// Returns `BlobError::Unauthorized` when the backend cannot sign.
    async fn signed_url(
        &self,
        container: &str,
        name: &str,
        access: SignedAccess,
    ) -> BlobResult<PresignedUrl>;
}
