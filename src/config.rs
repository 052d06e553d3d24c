use std::{fmt::Debug, path::Path, time::Duration};

use blob_store::{AccountCredentials, BlobStorageConfig};
use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use queue_store::QueueStoreConfig;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const LOCAL_ENV: &str = "local";

/// Prefix of environment variables overriding file configuration, with
/// `__` separating nested keys (`STORAGE_STORAGE__ACCOUNT_NAME`).
pub const ENV_PREFIX: &str = "STORAGE_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ClientKind {
    #[strum(serialize = "blob")]
    Blob,
    #[strum(serialize = "queue")]
    Queue,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("storage options were not provided")]
    MissingOptions,

    #[error("storage account name is missing")]
    MissingAccountName,

    #[error("storage account key is missing")]
    MissingAccountKey,

    #[error("{0} client was not provided")]
    MissingClient(ClientKind),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_env")]
    pub env: String,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub storage: Option<StorageOptions>,
}

fn default_env() -> String {
    LOCAL_ENV.to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            env: default_env(),
            telemetry: Default::default(),
            storage: None,
        }
    }
}

impl StorageConfig {
    /// Load a YAML file, then apply `STORAGE_` environment overrides.
    pub fn from_path(path: impl AsRef<Path>) -> Result<StorageConfig, figment::Error> {
        Figment::new()
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
    }

    pub fn structured_logging(&self) -> bool {
        self.env != LOCAL_ENV
    }

    pub fn instance_id(&self) -> String {
        self.telemetry
            .instance_id
            .clone()
            .unwrap_or_else(|| format!("{}-{}", self.env, Uuid::new_v4()))
    }
}

/// Storage account and backend settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct StorageOptions {
    #[serde(default)]
    pub account_name: String,
    #[serde(default)]
    pub account_key: String,
    #[serde(default)]
    pub blob_storage: BlobStorageConfig,
    #[serde(default)]
    pub queue_storage: QueueStoreConfig,
}

impl Debug for StorageOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageOptions")
            .field("account_name", &self.account_name)
            .field("account_key", &"<hidden>")
            .field("blob_storage", &self.blob_storage)
            .field("queue_storage", &self.queue_storage)
            .finish()
    }
}

impl StorageOptions {
    pub fn new(account_name: impl Into<String>, account_key: impl Into<String>) -> Self {
        Self {
            account_name: account_name.into(),
            account_key: account_key.into(),
            blob_storage: Default::default(),
            queue_storage: Default::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.account_name.trim().is_empty() {
            return Err(ConfigError::MissingAccountName);
        }
        if self.account_key.trim().is_empty() {
            return Err(ConfigError::MissingAccountKey);
        }
        Ok(())
    }

    pub fn credentials(&self) -> AccountCredentials {
        AccountCredentials {
            account_name: self.account_name.clone(),
            account_key: self.account_key.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub enable_metrics: bool,
    #[serde(default)]
    pub enable_tracing: bool,
    // OpenTelemetry collector grpc endpoint for both traces and metrics.
    // Defaults to OTEL_EXPORTER_OTLP_ENDPOINT or localhost:4317.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(with = "humantime_serde", default = "default_metrics_interval")]
    pub metrics_interval: Duration,
    #[serde(default)]
    pub instance_id: Option<String>,
}

fn default_metrics_interval() -> Duration {
    Duration::from_secs(10)
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enable_metrics: false,
            enable_tracing: false,
            endpoint: None,
            metrics_interval: default_metrics_interval(),
            instance_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn test_load_yaml_with_env_overrides() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "storage.yaml",
                r#"
env: production
telemetry:
  enable_metrics: true
  metrics_interval: 30s
storage:
  account_name: devstoreaccount1
  account_key: from-file
  blob_storage:
    path: memory:///
  queue_storage:
    visibility_timeout: 45s
"#,
            )?;
            jail.set_env("STORAGE_STORAGE__ACCOUNT_KEY", "from-env");

            let config = StorageConfig::from_path("storage.yaml")?;
            assert!(config.structured_logging());
            assert!(config.telemetry.enable_metrics);
            assert_eq!(config.telemetry.metrics_interval, Duration::from_secs(30));

            let storage = config.storage.expect("storage options");
            assert_eq!(storage.account_name, "devstoreaccount1");
            assert_eq!(storage.account_key, "from-env");
            assert_eq!(storage.blob_storage.path, "memory:///");
            assert_eq!(
                storage.queue_storage.visibility_timeout,
                Duration::from_secs(45)
            );
            assert_eq!(
                storage.queue_storage.lookup_visibility_timeout,
                Duration::from_secs(1)
            );
            Ok(())
        });
    }

    #[test]
    fn test_defaults_without_storage_section() {
        Jail::expect_with(|jail| {
            jail.create_file("storage.yaml", "telemetry: {}\n")?;
            let config = StorageConfig::from_path("storage.yaml")?;
            assert_eq!(config.env, "local");
            assert!(!config.structured_logging());
            assert!(config.storage.is_none());
            assert!(config.instance_id().starts_with("local-"));
            Ok(())
        });
    }

    #[test]
    fn test_validate_options() {
        assert_eq!(
            StorageOptions::new("", "key").validate(),
            Err(ConfigError::MissingAccountName)
        );
        assert_eq!(
            StorageOptions::new("account", " ").validate(),
            Err(ConfigError::MissingAccountKey)
        );
        assert!(StorageOptions::new("account", "key").validate().is_ok());
    }

    #[test]
    fn test_debug_hides_account_key() {
        let options = StorageOptions::new("account", "super-secret");
        assert!(!format!("{:?}", options).contains("super-secret"));
    }
}
