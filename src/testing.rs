use std::{
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use blob_store::{BlobBackend, BlobStorage, BlobStorageConfig, UploadBody, WriteMode};
use bytes::Bytes;
use futures::stream::BoxStream;
use object_store::{
    memory::InMemory,
    path::Path,
    GetOptions,
    GetResult,
    ListResult,
    MultipartUpload,
    ObjectMeta,
    ObjectStore,
    PutMode,
    PutMultipartOpts,
    PutOptions,
    PutPayload,
};
use queue_store::{
    InMemoryQueueStore,
    PeekedMessage,
    QueueBackend,
    QueueError,
    QueueResult,
    QueueStoreConfig,
    ReceivedMessage,
    SendReceipt,
};
use tokio_util::sync::CancellationToken;
use tracing::subscriber;
use tracing_subscriber::{layer::SubscriberExt, Layer};
use url::Url;

use crate::client::StorageClient;

/// A client over fresh in-memory backends.
pub struct TestStorage {
    pub client: StorageClient,
    pub cancel: CancellationToken,
}

impl TestStorage {
    pub fn new() -> Self {
        let blobs = BlobStorage::new(&BlobStorageConfig::in_memory(), None).unwrap();
        let queues = InMemoryQueueStore::new(QueueStoreConfig::default());
        Self::with_backends(Arc::new(blobs), Arc::new(queues))
    }

    pub fn with_backends(blobs: Arc<dyn BlobBackend>, queues: Arc<dyn QueueBackend>) -> Self {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("trace"));
        let _ = subscriber::set_global_default(
            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().with_filter(env_filter)),
        );

        let client =
            StorageClient::with_backends(Some(blobs), Some(queues), QueueStoreConfig::default())
                .unwrap();

        Self {
            client,
            cancel: CancellationToken::new(),
        }
    }

    fn blob_backend(&self) -> &Arc<dyn BlobBackend> {
        self.client.blobs().backend()
    }

    pub async fn create_container(&self, container: &str) {
        self.blob_backend().create_container(container).await.unwrap();
    }

    pub async fn create_queue(&self, queue: &str) {
        self.client.queues().backend().create_queue(queue).await.unwrap();
    }

    /// Writes a blob directly through the backend, creating the container.
    pub async fn put_blob(&self, container: &str, name: &str, data: &[u8]) {
        self.create_container(container).await;
        self.blob_backend()
            .upload(
                container,
                name,
                UploadBody::from(data.to_vec()),
                WriteMode::Overwrite,
            )
            .await
            .unwrap();
    }

    pub async fn read_blob(&self, container: &str, name: &str) -> Bytes {
        self.blob_backend().download(container, name).await.unwrap()
    }
}

/// In-memory object store where another writer replaces the object right
/// before every conditional update lands.
#[derive(Debug)]
pub struct ConcurrentWriterStore {
    inner: InMemory,
}

impl ConcurrentWriterStore {
    pub const CONCURRENT_BYTES: &'static [u8] = b"written concurrently";

    pub fn blob_storage() -> BlobStorage {
        let store = Self {
            inner: InMemory::new(),
        };
        BlobStorage::from_object_store(
            Arc::new(store),
            None,
            Url::parse("memory:///").unwrap(),
        )
    }
}

impl fmt::Display for ConcurrentWriterStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConcurrentWriterStore({})", self.inner)
    }
}

#[async_trait]
impl ObjectStore for ConcurrentWriterStore {
    async fn put_opts(
        &self,
        location: &Path,
        payload: PutPayload,
        opts: PutOptions,
    ) -> object_store::Result<object_store::PutResult> {
        if matches!(opts.mode, PutMode::Update(_)) {
            self.inner
                .put(location, Bytes::from_static(Self::CONCURRENT_BYTES).into())
                .await?;
        }
        self.inner.put_opts(location, payload, opts).await
    }

    async fn put_multipart_opts(
        &self,
        location: &Path,
        opts: PutMultipartOpts,
    ) -> object_store::Result<Box<dyn MultipartUpload>> {
        self.inner.put_multipart_opts(location, opts).await
    }

    async fn get_opts(
        &self,
        location: &Path,
        options: GetOptions,
    ) -> object_store::Result<GetResult> {
        self.inner.get_opts(location, options).await
    }

    async fn delete(&self, location: &Path) -> object_store::Result<()> {
        self.inner.delete(location).await
    }

    fn list(&self, prefix: Option<&Path>) -> BoxStream<'static, object_store::Result<ObjectMeta>> {
        self.inner.list(prefix)
    }

    async fn list_with_delimiter(&self, prefix: Option<&Path>) -> object_store::Result<ListResult> {
        self.inner.list_with_delimiter(prefix).await
    }

    async fn copy(&self, from: &Path, to: &Path) -> object_store::Result<()> {
        self.inner.copy(from, to).await
    }

    async fn copy_if_not_exists(&self, from: &Path, to: &Path) -> object_store::Result<()> {
        self.inner.copy_if_not_exists(from, to).await
    }
}

/// In-memory queue store whose n-th `delete_message` call (1-based) fails.
pub struct FailingDeleteQueue {
    inner: InMemoryQueueStore,
    fail_on: usize,
    deletes: AtomicUsize,
}

impl FailingDeleteQueue {
    pub fn new(fail_on: usize) -> Self {
        Self {
            inner: InMemoryQueueStore::new(QueueStoreConfig::default()),
            fail_on,
            deletes: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl QueueBackend for FailingDeleteQueue {
    async fn queue_exists(&self, queue: &str) -> QueueResult<bool> {
        self.inner.queue_exists(queue).await
    }

    async fn create_queue(&self, queue: &str) -> QueueResult<bool> {
        self.inner.create_queue(queue).await
    }

    async fn list_queues(&self) -> QueueResult<Vec<String>> {
        self.inner.list_queues().await
    }

    async fn send_message(&self, queue: &str, text: &str) -> QueueResult<SendReceipt> {
        self.inner.send_message(queue, text).await
    }

    async fn receive_messages(
        &self,
        queue: &str,
        count: usize,
        visibility: Duration,
    ) -> QueueResult<Vec<ReceivedMessage>> {
        self.inner.receive_messages(queue, count, visibility).await
    }

    async fn peek_messages(&self, queue: &str, count: usize) -> QueueResult<Vec<PeekedMessage>> {
        self.inner.peek_messages(queue, count).await
    }

    async fn approximate_message_count(&self, queue: &str) -> QueueResult<u64> {
        self.inner.approximate_message_count(queue).await
    }

    async fn delete_message(
        &self,
        queue: &str,
        message_id: &str,
        pop_receipt: &str,
    ) -> QueueResult<()> {
        if self.deletes.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_on {
            return Err(QueueError::Other(anyhow::anyhow!("connection reset")));
        }
        self.inner.delete_message(queue, message_id, pop_receipt).await
    }

    async fn update_visibility(
        &self,
        queue: &str,
        message_id: &str,
        pop_receipt: &str,
        visibility: Duration,
    ) -> QueueResult<String> {
        self.inner
            .update_visibility(queue, message_id, pop_receipt, visibility)
            .await
    }
}
