//! Container-scoped blob storage backed by an `object_store` client.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream::BoxStream, StreamExt, TryStreamExt};
use object_store::{
    aws::AmazonS3Builder,
    azure::MicrosoftAzureBuilder,
    local::LocalFileSystem,
    memory::InMemory,
    path::{Path, PathPart},
    signer::Signer,
    ObjectMeta,
    ObjectStore,
    PutMode,
    PutPayload,
    UpdateVersion,
    WriteMultipart,
};
use opentelemetry::KeyValue;
use percent_encoding::percent_decode_str;
use tracing::{debug, info};
use url::Url;

use crate::{
    presign,
    AccountCredentials,
    BlobBackend,
    BlobError,
    BlobMetadata,
    BlobMetrics,
    BlobResult,
    BlobStorageConfig,
    PresignedUrl,
    PutResult,
    SignedAccess,
    Timer,
    UploadBody,
    WriteMode,
};

/// Object that materialises a container inside the object store.
pub const CONTAINER_MARKER: &str = ".container";

/// Blob storage over any [`ObjectStore`].
///
/// Containers live at `<root>/<container>/` and exist once their
/// [`CONTAINER_MARKER`] object exists.
#[derive(Clone, Debug)]
pub struct BlobStorage {
    object_store: Arc<dyn ObjectStore>,

    /// Present for backends that can produce signed URLs.
    signer: Option<Arc<dyn Signer>>,

    /// Root path all containers are created under.
    root: Path,

    /// URL of the storage root as seen by clients.
    public_url: Url,

    metrics: BlobMetrics,
}

struct BuiltStore {
    object_store: Arc<dyn ObjectStore>,
    signer: Option<Arc<dyn Signer>>,
    root: Path,
    public_url: Url,
}

impl BlobStorage {
    /// Build the storage selected by the scheme of `config.path`.
    pub fn new(
        config: &BlobStorageConfig,
        credentials: Option<&AccountCredentials>,
    ) -> BlobResult<Self> {
        let url = config
            .path
            .parse::<Url>()
            .map_err(|e| BlobError::InvalidUri {
                uri: config.path.clone(),
                reason: e.to_string(),
            })?;

        let built = match url.scheme() {
            "memory" => BuiltStore {
                object_store: Arc::new(InMemory::new()),
                signer: None,
                root: Path::from(url.path()),
                public_url: url.clone(),
            },
            "file" => file_storage(&url)?,
            "az" | "azure" => azure_storage(&url, config, credentials)?,
            "s3" => s3_storage(&url, config)?,
            scheme => {
                return Err(BlobError::UnsupportedBackend {
                    scheme: scheme.to_string(),
                })
            }
        };

        let public_url = match &config.public_url {
            Some(public_url) => public_url
                .parse::<Url>()
                .map_err(|e| BlobError::InvalidUri {
                    uri: public_url.clone(),
                    reason: e.to_string(),
                })?,
            None => built.public_url,
        };

        info!(
            path = %config.path,
            public_url = %public_url,
            signing = built.signer.is_some(),
            "using blob storage"
        );

        Ok(Self {
            object_store: built.object_store,
            signer: built.signer,
            root: built.root,
            public_url,
            metrics: BlobMetrics::default(),
        })
    }

    /// Wrap an already configured object store.
    pub fn from_object_store(
        object_store: Arc<dyn ObjectStore>,
        signer: Option<Arc<dyn Signer>>,
        public_url: Url,
    ) -> Self {
        Self {
            object_store,
            signer,
            root: Path::default(),
            public_url,
            metrics: BlobMetrics::default(),
        }
    }

    pub fn get_object_store(&self) -> Arc<dyn ObjectStore> {
        self.object_store.clone()
    }

    fn container_path(&self, container: &str) -> BlobResult<Path> {
        if container.is_empty() || container.contains('/') {
            return Err(BlobError::InvalidName {
                name: container.to_string(),
                reason: "container names must be non-empty and must not contain '/'".to_string(),
            });
        }
        Ok(self.root.child(container))
    }

    fn marker_path(&self, container: &str) -> BlobResult<Path> {
        Ok(self.container_path(container)?.child(CONTAINER_MARKER))
    }

    fn blob_path(&self, container: &str, name: &str) -> BlobResult<Path> {
        if name == CONTAINER_MARKER {
            return Err(BlobError::InvalidName {
                name: name.to_string(),
                reason: "name is reserved".to_string(),
            });
        }
        let mut path = self.container_path(container)?;
        for part in name.split('/') {
            if part.is_empty() {
                return Err(BlobError::InvalidName {
                    name: name.to_string(),
                    reason: "blob names must not contain empty path segments".to_string(),
                });
            }
            path = path.child(part);
        }
        Ok(path)
    }

    async fn exists(&self, path: &Path) -> BlobResult<bool> {
        match self.object_store.head(path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn put_bytes(
        &self,
        path: &Path,
        bytes: Bytes,
        mode: WriteMode,
    ) -> BlobResult<object_store::PutResult> {
        let payload = PutPayload::from(bytes);
        let result = match mode {
            WriteMode::Overwrite => self.object_store.put(path, payload).await?,
            WriteMode::CreateNew => {
                match self
                    .object_store
                    .put_opts(path, payload.clone(), PutMode::Create.into())
                    .await
                {
                    Err(object_store::Error::NotImplemented) => {
                        debug!(%path, "conditional create not supported, checking existence");
                        if self.exists(path).await? {
                            return Err(BlobError::AlreadyExists {
                                path: path.to_string(),
                            });
                        }
                        self.object_store.put(path, payload).await?
                    }
                    result => result?,
                }
            }
            WriteMode::ReplaceExisting => {
                let meta = self.object_store.head(path).await?;
                let version = UpdateVersion {
                    e_tag: meta.e_tag,
                    version: meta.version,
                };
                match self
                    .object_store
                    .put_opts(path, payload.clone(), PutMode::Update(version).into())
                    .await
                {
                    Err(object_store::Error::NotImplemented) => {
                        debug!(%path, "conditional update not supported, overwriting");
                        self.object_store.put(path, payload).await?
                    }
                    result => result?,
                }
            }
        };
        Ok(result)
    }

    async fn put_stream(
        &self,
        path: &Path,
        mut stream: BoxStream<'static, anyhow::Result<Bytes>>,
        mode: WriteMode,
    ) -> BlobResult<(object_store::PutResult, u64)> {
        // Multipart uploads have no conditional mode.
        match mode {
            WriteMode::CreateNew if self.exists(path).await? => {
                return Err(BlobError::AlreadyExists {
                    path: path.to_string(),
                });
            }
            WriteMode::ReplaceExisting if !self.exists(path).await? => {
                return Err(BlobError::NotFound {
                    path: path.to_string(),
                });
            }
            _ => {}
        }

        let upload = self.object_store.put_multipart(path).await?;
        let mut writer = WriteMultipart::new(upload);
        let mut size_bytes = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    writer.abort().await?;
                    return Err(BlobError::Other { source: e });
                }
            };
            writer.wait_for_capacity(1).await?;
            size_bytes += chunk.len() as u64;
            writer.write(&chunk);
        }
        let result = writer.finish().await?;
        Ok((result, size_bytes))
    }
}

fn file_storage(url: &Url) -> BlobResult<BuiltStore> {
    let dir = url.to_file_path().map_err(|_| BlobError::InvalidUri {
        uri: url.to_string(),
        reason: "not a local file path".to_string(),
    })?;
    std::fs::create_dir_all(&dir)?;
    let store = LocalFileSystem::new_with_prefix(&dir)?;
    Ok(BuiltStore {
        object_store: Arc::new(store),
        signer: None,
        root: Path::default(),
        public_url: url.clone(),
    })
}

fn azure_storage(
    url: &Url,
    config: &BlobStorageConfig,
    credentials: Option<&AccountCredentials>,
) -> BlobResult<BuiltStore> {
    let container = url
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| BlobError::InvalidUri {
            uri: url.to_string(),
            reason: "missing storage container, expected az://container/prefix".to_string(),
        })?;

    let mut builder = MicrosoftAzureBuilder::from_env()
        .with_container_name(container)
        .with_use_emulator(config.use_emulator);
    if let Some(credentials) = credentials {
        builder = builder
            .with_account(&credentials.account_name)
            .with_access_key(&credentials.account_key);
    }
    let azure = Arc::new(builder.build()?);

    let public_url = match credentials {
        Some(credentials) if config.use_emulator => format!(
            "http://127.0.0.1:10000/{}/{}{}",
            credentials.account_name,
            container,
            url.path()
        )
        .parse::<Url>()?,
        Some(credentials) => format!(
            "https://{}.blob.core.windows.net/{}{}",
            credentials.account_name,
            container,
            url.path()
        )
        .parse::<Url>()?,
        None => url.clone(),
    };

    Ok(BuiltStore {
        object_store: azure.clone(),
        signer: Some(azure),
        root: Path::from(url.path()),
        public_url,
    })
}

fn s3_storage(url: &Url, config: &BlobStorageConfig) -> BlobResult<BuiltStore> {
    let bucket = url
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| BlobError::InvalidUri {
            uri: url.to_string(),
            reason: "missing bucket, expected s3://bucket/prefix".to_string(),
        })?;

    let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
    if let Some(region) = &config.region {
        builder = builder.with_region(region);
    }
    let s3 = Arc::new(builder.build()?);

    let public_url = match &config.region {
        Some(region) => format!("https://{}.s3.{}.amazonaws.com{}", bucket, region, url.path()),
        None => format!("https://{}.s3.amazonaws.com{}", bucket, url.path()),
    }
    .parse::<Url>()?;

    Ok(BuiltStore {
        object_store: s3.clone(),
        signer: Some(s3),
        root: Path::from(url.path()),
        public_url,
    })
}

#[async_trait]
impl BlobBackend for BlobStorage {
    async fn container_exists(&self, container: &str) -> BlobResult<bool> {
        let _timer = Timer::start_with_labels(
            &self.metrics.operations,
            &[KeyValue::new("op", "container_exists")],
        );
        self.exists(&self.marker_path(container)?).await
    }

    async fn create_container(&self, container: &str) -> BlobResult<bool> {
        let _timer = Timer::start_with_labels(
            &self.metrics.operations,
            &[KeyValue::new("op", "create_container")],
        );
        let marker = self.marker_path(container)?;
        let created = match self
            .object_store
            .put_opts(&marker, PutPayload::new(), PutMode::Create.into())
            .await
        {
            Ok(_) => true,
            Err(object_store::Error::AlreadyExists { .. }) => false,
            Err(object_store::Error::NotImplemented) => {
                if self.exists(&marker).await? {
                    false
                } else {
                    self.object_store.put(&marker, PutPayload::new()).await?;
                    true
                }
            }
            Err(e) => {
                self.metrics.record_error("create_container");
                return Err(e.into());
            }
        };
        if created {
            info!(container, "created container");
        }
        Ok(created)
    }

    async fn list_containers(&self) -> BlobResult<Vec<String>> {
        let _timer = Timer::start_with_labels(
            &self.metrics.operations,
            &[KeyValue::new("op", "list_containers")],
        );
        let listing = self.object_store.list_with_delimiter(Some(&self.root)).await?;
        let mut containers = Vec::new();
        for prefix in listing.common_prefixes {
            let Some(part) = prefix.parts().last() else {
                continue;
            };
            if self.exists(&prefix.child(CONTAINER_MARKER)).await? {
                containers.push(decode_part(&part)?);
            }
        }
        containers.sort();
        Ok(containers)
    }

    async fn blob_exists(&self, container: &str, name: &str) -> BlobResult<bool> {
        let _timer =
            Timer::start_with_labels(&self.metrics.operations, &[KeyValue::new("op", "head")]);
        self.exists(&self.blob_path(container, name)?).await
    }

    async fn blob_metadata(&self, container: &str, name: &str) -> BlobResult<BlobMetadata> {
        let _timer =
            Timer::start_with_labels(&self.metrics.operations, &[KeyValue::new("op", "head")]);
        let meta = self.object_store.head(&self.blob_path(container, name)?).await?;
        Ok(meta.into())
    }

    async fn upload(
        &self,
        container: &str,
        name: &str,
        body: UploadBody,
        mode: WriteMode,
    ) -> BlobResult<PutResult> {
        let _timer =
            Timer::start_with_labels(&self.metrics.operations, &[KeyValue::new("op", "put")]);
        let path = self.blob_path(container, name)?;
        let written = match body {
            UploadBody::Bytes(bytes) => {
                let size_bytes = bytes.len() as u64;
                self.put_bytes(&path, bytes, mode)
                    .await
                    .map(|result| (result, size_bytes))
            }
            UploadBody::Stream { stream, .. } => self.put_stream(&path, stream, mode).await,
        };
        let (result, size_bytes) = written.inspect_err(|_| self.metrics.record_error("put"))?;

        debug!(%path, size_bytes, ?mode, "uploaded blob");
        Ok(PutResult {
            url: self.blob_url(container, name)?,
            size_bytes,
            e_tag: result.e_tag,
        })
    }

    async fn delete_blob(&self, container: &str, name: &str) -> BlobResult<()> {
        let _timer =
            Timer::start_with_labels(&self.metrics.operations, &[KeyValue::new("op", "delete")]);
        let path = self.blob_path(container, name)?;
        // Some stores treat deleting a missing object as success.
        if !self.exists(&path).await? {
            return Err(BlobError::NotFound {
                path: path.to_string(),
            });
        }
        self.object_store
            .delete(&path)
            .await
            .inspect_err(|_| self.metrics.record_error("delete"))?;
        debug!(%path, "deleted blob");
        Ok(())
    }

    async fn download(&self, container: &str, name: &str) -> BlobResult<Bytes> {
        let _timer =
            Timer::start_with_labels(&self.metrics.operations, &[KeyValue::new("op", "get")]);
        let path = self.blob_path(container, name)?;
        let result = self.object_store.get(&path).await?;
        let bytes = result
            .bytes()
            .await
            .inspect_err(|_| self.metrics.record_error("get"))?;
        Ok(bytes)
    }

    async fn list_blobs(&self, container: &str) -> BlobResult<Vec<String>> {
        let _timer =
            Timer::start_with_labels(&self.metrics.operations, &[KeyValue::new("op", "list")]);
        let container_path = self.container_path(container)?;
        let objects: Vec<ObjectMeta> = self
            .object_store
            .list(Some(&container_path))
            .try_collect()
            .await?;
        let mut names = Vec::with_capacity(objects.len());
        for meta in objects {
            let Some(parts) = meta.location.prefix_match(&container_path) else {
                continue;
            };
            let name = parts
                .map(|part| decode_part(&part))
                .collect::<BlobResult<Vec<_>>>()?
                .join("/");
            if name != CONTAINER_MARKER {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    fn blob_url(&self, container: &str, name: &str) -> BlobResult<Url> {
        let mut url = self.public_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| BlobError::InvalidUri {
                uri: self.public_url.to_string(),
                reason: "URL cannot be used as a base".to_string(),
            })?;
            segments.pop_if_empty();
            segments.push(container);
            segments.extend(name.split('/'));
        }
        Ok(url)
    }

    async fn signed_url(
        &self,
        container: &str,
        name: &str,
        access: SignedAccess,
    ) -> BlobResult<PresignedUrl> {
        let _timer =
            Timer::start_with_labels(&self.metrics.operations, &[KeyValue::new("op", "sign")]);
        let signer = self.signer.as_ref().ok_or_else(|| BlobError::Unauthorized {
            reason: format!("{} cannot sign URLs", self.public_url.scheme()),
        })?;
        let expires_in = match access {
            SignedAccess::Expiry(expires_in) => expires_in,
            SignedAccess::StoredPolicy(policy) => {
                return Err(BlobError::Unauthorized {
                    reason: format!(
                        "stored access policy '{}' is not supported by this backend",
                        policy
                    ),
                })
            }
        };
        presign::validate_expiry(expires_in).map_err(|reason| BlobError::PresignError { reason })?;

        let path = self.blob_path(container, name)?;
        let url = signer
            .signed_url(http::Method::GET, &path, expires_in)
            .await
            .map_err(|e| {
                self.metrics.record_error("sign");
                BlobError::Unauthorized {
                    reason: e.to_string(),
                }
            })?;
        Ok(PresignedUrl::get(url, expires_in))
    }
}

/// Object store paths percent-encode characters that are illegal in a path
/// segment, so listings are decoded back to the names callers wrote.
fn decode_part(part: &PathPart<'_>) -> BlobResult<String> {
    let encoded: &str = part.as_ref();
    percent_decode_str(encoded)
        .decode_utf8()
        .map(|name| name.into_owned())
        .map_err(|e| BlobError::InvalidName {
            name: encoded.to_string(),
            reason: e.to_string(),
        })
}
