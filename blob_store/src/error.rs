//! Error types for blob store operations.

/// Result type for blob store operations.
pub type BlobResult<T> = Result<T, BlobError>;

/// Errors that can occur during blob store operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BlobError {
    #[error("Blob not found: {path}")]
    NotFound { path: String },

    #[error("Blob already exists: {path}")]
    AlreadyExists { path: String },

    /// A conditional write lost against a concurrent modification.
    #[error("Precondition failed for blob: {path}")]
    Precondition { path: String },

    #[error("Invalid URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("Invalid blob name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// The backend cannot produce signed URLs with the configured
    /// credentials.
    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("Presigned URL generation error: {reason}")]
    PresignError { reason: String },

    #[error("Operation not supported by backend: {reason}")]
    NotSupported { reason: String },

    #[error("Unsupported backend: {scheme}")]
    UnsupportedBackend { scheme: String },

    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("Network error: {source}")]
    NetworkError { source: anyhow::Error },

    #[error("Blob store error: {source}")]
    Other { source: anyhow::Error },
}

impl BlobError {
    /// Identifies failures that may succeed when retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BlobError::NetworkError { .. } | BlobError::Precondition { .. }
        )
    }
}

impl From<anyhow::Error> for BlobError {
    fn from(err: anyhow::Error) -> Self {
        BlobError::Other { source: err }
    }
}

impl From<object_store::Error> for BlobError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { path, .. } => BlobError::NotFound { path },
            object_store::Error::AlreadyExists { path, .. } => BlobError::AlreadyExists { path },
            object_store::Error::Precondition { path, .. } => BlobError::Precondition { path },
            object_store::Error::InvalidPath { source } => BlobError::InvalidName {
                name: String::new(),
                reason: source.to_string(),
            },
            object_store::Error::NotImplemented => BlobError::NotSupported {
                reason: "operation not implemented by this backend".to_string(),
            },
            object_store::Error::NotSupported { source } => BlobError::NotSupported {
                reason: source.to_string(),
            },
            _ => BlobError::NetworkError {
                source: anyhow::Error::from(err),
            },
        }
    }
}

impl From<url::ParseError> for BlobError {
    fn from(err: url::ParseError) -> Self {
        BlobError::InvalidUri {
            uri: String::new(),
            reason: err.to_string(),
        }
    }
}
