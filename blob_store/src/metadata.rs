//! Blob metadata structures.

use serde::{Deserialize, Serialize};

/// Metadata about a stored blob.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlobMetadata {
    /// Size in bytes.
    pub size_bytes: u64,

    /// ETag from the object store, when the backend provides one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    /// Object version, when the backend is versioned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Last modification time in milliseconds since the Unix epoch.
    pub last_modified_ms: i64,
}

impl From<object_store::ObjectMeta> for BlobMetadata {
    fn from(meta: object_store::ObjectMeta) -> Self {
        Self {
            size_bytes: meta.size,
            etag: meta.e_tag,
            version: meta.version,
            last_modified_ms: meta.last_modified.timestamp_millis(),
        }
    }
}
