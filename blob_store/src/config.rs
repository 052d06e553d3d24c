//! Blob storage configuration.

use std::env;

use serde::{Deserialize, Serialize};

/// Configuration for blob storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobStorageConfig {
    /// Storage root (e.g., `memory:///`, `file:///path`,
    /// `az://container/prefix`, `s3://bucket/prefix`).
    #[serde(default = "default_blob_store_path")]
    pub path: String,

    /// Base URL blobs are publicly reachable under. Derived from `path` when
    /// absent.
    #[serde(default)]
    pub public_url: Option<String>,

    /// AWS region (for S3).
    #[serde(default)]
    pub region: Option<String>,

    /// Talk to a local Azurite emulator instead of the Azure endpoint.
    #[serde(default)]
    pub use_emulator: bool,
}

impl Default for BlobStorageConfig {
    fn default() -> Self {
        Self {
            path: default_blob_store_path(),
            public_url: None,
            region: None,
            use_emulator: false,
        }
    }
}

impl BlobStorageConfig {
    pub fn in_memory() -> Self {
        Self {
            path: "memory:///".to_string(),
            ..Default::default()
        }
    }

    pub fn local(path: &str) -> Self {
        Self {
            path: format!("file://{}", path),
            ..Default::default()
        }
    }
}

/// Shared-key credentials of the storage account.
#[derive(Clone, Serialize, Deserialize)]
pub struct AccountCredentials {
    pub account_name: String,
    pub account_key: String,
}

impl std::fmt::Debug for AccountCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountCredentials")
            .field("account_name", &self.account_name)
            .field("account_key", &"<hidden>")
            .finish()
    }
}

/// Default blob store path (local filesystem).
pub fn default_blob_store_path() -> String {
    format!(
        "file://{}",
        env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join("storage/blobs")
            .to_str()
            .unwrap_or("./storage/blobs")
    )
}
