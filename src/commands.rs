//! Immutable command values accepted by the blob and queue services.

use std::path::PathBuf;

use bytes::Bytes;

use crate::payload::{PayloadSource, SizedStream};

/// Add or update a blob.
///
/// `does_container_exist` states whether the caller expects the container to
/// exist already. When it is `false`, adding a blob creates the container and
/// fails if it is already there.
#[derive(Debug)]
pub struct BlobCommand {
    container_name: String,
    blob_name: String,
    payload: PayloadSource,
    does_container_exist: bool,
}

impl BlobCommand {
    pub fn new(
        container_name: impl Into<String>,
        blob_name: impl Into<String>,
        payload: PayloadSource,
        does_container_exist: bool,
    ) -> Self {
        Self {
            container_name: container_name.into(),
            blob_name: blob_name.into(),
            payload,
            does_container_exist,
        }
    }

    /// Standard base64, optionally with a `data:<mime>;base64,` prefix.
    pub fn base64(
        container_name: impl Into<String>,
        blob_name: impl Into<String>,
        data: impl Into<Option<String>>,
        does_container_exist: bool,
    ) -> Self {
        Self::new(
            container_name,
            blob_name,
            PayloadSource::Base64(data.into()),
            does_container_exist,
        )
    }

    pub fn bytes(
        container_name: impl Into<String>,
        blob_name: impl Into<String>,
        bytes: impl Into<Option<Bytes>>,
        does_container_exist: bool,
    ) -> Self {
        Self::new(
            container_name,
            blob_name,
            PayloadSource::Bytes(bytes.into()),
            does_container_exist,
        )
    }

    pub fn file(
        container_name: impl Into<String>,
        blob_name: impl Into<String>,
        path: impl Into<Option<PathBuf>>,
        does_container_exist: bool,
    ) -> Self {
        Self::new(
            container_name,
            blob_name,
            PayloadSource::FilePath(path.into()),
            does_container_exist,
        )
    }

    pub fn stream(
        container_name: impl Into<String>,
        blob_name: impl Into<String>,
        stream: impl Into<Option<SizedStream>>,
        does_container_exist: bool,
    ) -> Self {
        Self::new(
            container_name,
            blob_name,
            PayloadSource::Stream(stream.into()),
            does_container_exist,
        )
    }

    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    pub fn blob_name(&self) -> &str {
        &self.blob_name
    }

    pub fn payload(&self) -> &PayloadSource {
        &self.payload
    }

    pub fn does_container_exist(&self) -> bool {
        self.does_container_exist
    }

    pub(crate) fn into_payload(self) -> PayloadSource {
        self.payload
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteBlobCommand {
    container_name: String,
    blob_name: String,
}

impl DeleteBlobCommand {
    pub fn new(container_name: impl Into<String>, blob_name: impl Into<String>) -> Self {
        Self {
            container_name: container_name.into(),
            blob_name: blob_name.into(),
        }
    }

    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    pub fn blob_name(&self) -> &str {
        &self.blob_name
    }
}

/// Enqueue a text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageCommand {
    queue_name: String,
    text: Option<String>,
    does_queue_exist: bool,
}

impl SendMessageCommand {
    pub fn new(
        queue_name: impl Into<String>,
        text: impl Into<Option<String>>,
        does_queue_exist: bool,
    ) -> Self {
        Self {
            queue_name: queue_name.into(),
            text: text.into(),
            does_queue_exist,
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn does_queue_exist(&self) -> bool {
        self.does_queue_exist
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveMessagesCommand {
    queue_name: String,
    max_messages: usize,
    delete_after_receiving: bool,
}

impl ReceiveMessagesCommand {
    pub fn new(
        queue_name: impl Into<String>,
        max_messages: usize,
        delete_after_receiving: bool,
    ) -> Self {
        Self {
            queue_name: queue_name.into(),
            max_messages,
            delete_after_receiving,
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    pub fn delete_after_receiving(&self) -> bool {
        self.delete_after_receiving
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteMessageCommand {
    queue_name: String,
    message_id: String,
}

impl DeleteMessageCommand {
    pub fn new(queue_name: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
            message_id: message_id.into(),
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }
}
