//! Normalization of the accepted payload representations into bytes that
//! can be handed to a blob backend.

use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD, Engine};
use blob_store::UploadBody;
use bytes::Bytes;
use futures::{stream::BoxStream, Stream, StreamExt, TryStreamExt};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::error::{Result, StorageError};

/// Files at least this large are uploaded as a stream instead of being read
/// into memory.
pub const FILE_STREAMING_THRESHOLD: u64 = 8 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum PayloadKind {
    Base64,
    Bytes,
    FilePath,
    Stream,
    Text,
}

/// A byte stream together with the length its producer announced.
pub struct SizedStream {
    stream: BoxStream<'static, anyhow::Result<Bytes>>,
    content_length: u64,
}

impl SizedStream {
    pub fn new<S>(stream: S, content_length: u64) -> Self
    where
        S: Stream<Item = anyhow::Result<Bytes>> + Send + 'static,
    {
        Self {
            stream: stream.boxed(),
            content_length,
        }
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    pub fn into_inner(self) -> BoxStream<'static, anyhow::Result<Bytes>> {
        self.stream
    }
}

impl std::fmt::Debug for SizedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SizedStream")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Where the bytes of a write come from. `None` models an absent source.
#[derive(Debug)]
pub enum PayloadSource {
    Base64(Option<String>),
    Bytes(Option<Bytes>),
    FilePath(Option<PathBuf>),
    Stream(Option<SizedStream>),
}

impl PayloadSource {
    pub fn kind(&self) -> PayloadKind {
        match self {
            PayloadSource::Base64(_) => PayloadKind::Base64,
            PayloadSource::Bytes(_) => PayloadKind::Bytes,
            PayloadSource::FilePath(_) => PayloadKind::FilePath,
            PayloadSource::Stream(_) => PayloadKind::Stream,
        }
    }
}

/// A validated, non-empty payload.
#[derive(Debug)]
pub enum NormalizedPayload {
    Buffered(Bytes),
    Streamed(SizedStream),
}

impl NormalizedPayload {
    pub fn len(&self) -> u64 {
        match self {
            NormalizedPayload::Buffered(bytes) => bytes.len() as u64,
            NormalizedPayload::Streamed(stream) => stream.content_length(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<NormalizedPayload> for UploadBody {
    fn from(payload: NormalizedPayload) -> Self {
        match payload {
            NormalizedPayload::Buffered(bytes) => UploadBody::Bytes(bytes),
            NormalizedPayload::Streamed(stream) => UploadBody::Stream {
                content_length: stream.content_length(),
                stream: stream.into_inner(),
            },
        }
    }
}

fn null(resource: &str, kind: PayloadKind) -> StorageError {
    StorageError::NullPayload {
        resource: resource.to_string(),
        kind,
    }
}

fn empty(resource: &str, kind: PayloadKind) -> StorageError {
    StorageError::EmptyPayload {
        resource: resource.to_string(),
        kind,
    }
}

/// Strips a `data:<mime>;base64,` prefix if present.
fn strip_data_uri(data: &str) -> &str {
    if !data.starts_with("data:") {
        return data;
    }
    match data.find(";base64,") {
        Some(index) => &data[index + ";base64,".len()..],
        None => data,
    }
}

/// Validate `source` and turn it into a payload for `resource`.
pub async fn normalize(source: PayloadSource, resource: &str) -> Result<NormalizedPayload> {
    let kind = source.kind();
    match source {
        PayloadSource::Base64(data) => {
            let data = data.ok_or_else(|| null(resource, kind))?;
            let encoded = strip_data_uri(&data);
            if encoded.is_empty() {
                return Err(empty(resource, kind));
            }
            let decoded = STANDARD
                .decode(encoded)
                .map_err(|_| StorageError::InvalidEncoding {
                    resource: resource.to_string(),
                    data: data.clone(),
                })?;
            Ok(NormalizedPayload::Buffered(Bytes::from(decoded)))
        }
        PayloadSource::Bytes(bytes) => {
            let bytes = bytes.ok_or_else(|| null(resource, kind))?;
            if bytes.is_empty() {
                return Err(empty(resource, kind));
            }
            Ok(NormalizedPayload::Buffered(bytes))
        }
        PayloadSource::FilePath(path) => {
            let path = path.ok_or_else(|| null(resource, kind))?;
            if path.as_os_str().is_empty() {
                return Err(empty(resource, kind));
            }
            read_file(path, resource).await
        }
        PayloadSource::Stream(stream) => {
            let stream = stream.ok_or_else(|| null(resource, kind))?;
            if stream.content_length() == 0 {
                return Err(empty(resource, kind));
            }
            Ok(NormalizedPayload::Streamed(stream))
        }
    }
}

async fn read_file(path: PathBuf, resource: &str) -> Result<NormalizedPayload> {
    let not_found = || StorageError::FileNotFound {
        resource: resource.to_string(),
        path: path.clone(),
    };
    let metadata = match tokio::fs::metadata(&path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) => return Err(e.into()),
    };
    if !metadata.is_file() {
        return Err(not_found());
    }
    if metadata.len() == 0 {
        return Err(empty(resource, PayloadKind::FilePath));
    }

    if metadata.len() >= FILE_STREAMING_THRESHOLD {
        debug!(path = %path.display(), size = metadata.len(), "streaming file payload");
        let file = tokio::fs::File::open(&path).await?;
        let stream = ReaderStream::new(file).map_err(anyhow::Error::from);
        return Ok(NormalizedPayload::Streamed(SizedStream::new(
            stream,
            metadata.len(),
        )));
    }

    let contents = tokio::fs::read(&path).await?;
    if contents.is_empty() {
        return Err(empty(resource, PayloadKind::FilePath));
    }
    Ok(NormalizedPayload::Buffered(Bytes::from(contents)))
}
