//! Shapes a blob can be returned in.

use base64::{engine::general_purpose::STANDARD, Engine};
use blob_store::SignedAccess;
use bytes::Bytes;
use url::Url;

use crate::{
    error::{Result, StorageError},
    payload::PayloadKind,
};

/// How a fetched blob is handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReturnOption {
    /// Raw bytes.
    #[default]
    Bytes,
    /// `data:<mime>;base64,<data>`, the mime type guessed from the blob name.
    Base64DataUri,
    /// The blob's public URL. Nothing is downloaded.
    Url,
    /// A signed URL granting temporary read access. Nothing is downloaded.
    SignedUrl(SignedAccess),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobContent {
    Bytes(Bytes),
    DataUri(String),
    Url(Url),
}

impl BlobContent {
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            BlobContent::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_data_uri(&self) -> Option<&str> {
        match self {
            BlobContent::DataUri(uri) => Some(uri),
            _ => None,
        }
    }

    pub fn as_url(&self) -> Option<&Url> {
        match self {
            BlobContent::Url(url) => Some(url),
            _ => None,
        }
    }
}

impl ReturnOption {
    /// Whether the blob contents must be downloaded to build the result.
    pub fn needs_content(&self) -> bool {
        matches!(self, ReturnOption::Bytes | ReturnOption::Base64DataUri)
    }

    /// Build the result for `name`. `source_url` is the public URL of the
    /// blob, or the signed one for [`ReturnOption::SignedUrl`].
    pub fn parse(&self, name: &str, bytes: Option<Bytes>, source_url: Url) -> Result<BlobContent> {
        let content = |bytes: Option<Bytes>| {
            bytes.ok_or_else(|| StorageError::NullPayload {
                resource: name.to_string(),
                kind: PayloadKind::Bytes,
            })
        };
        match self {
            ReturnOption::Bytes => Ok(BlobContent::Bytes(content(bytes)?)),
            ReturnOption::Base64DataUri => {
                let bytes = content(bytes)?;
                let mime = mime_guess::from_path(name).first_or_octet_stream();
                Ok(BlobContent::DataUri(format!(
                    "data:{};base64,{}",
                    mime.essence_str(),
                    STANDARD.encode(&bytes)
                )))
            }
            ReturnOption::Url | ReturnOption::SignedUrl(_) => Ok(BlobContent::Url(source_url)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> Url {
        Url::parse("https://account.blob.core.windows.net/photos/cat.png").unwrap()
    }

    #[test]
    fn test_data_uri_uses_guessed_mime_type() {
        let content = ReturnOption::Base64DataUri
            .parse("cat.png", Some(Bytes::from_static(b"hello")), source())
            .unwrap();
        assert_eq!(content.as_data_uri(), Some("data:image/png;base64,aGVsbG8="));

        let content = ReturnOption::Base64DataUri
            .parse("blob.unknownext", Some(Bytes::from_static(b"hello")), source())
            .unwrap();
        assert_eq!(
            content.as_data_uri(),
            Some("data:application/octet-stream;base64,aGVsbG8=")
        );
    }

    #[test]
    fn test_url_options_ignore_content() {
        assert!(!ReturnOption::Url.needs_content());
        assert!(!ReturnOption::SignedUrl(SignedAccess::default()).needs_content());

        let content = ReturnOption::Url.parse("cat.png", None, source()).unwrap();
        assert_eq!(content.as_url(), Some(&source()));
    }

    #[test]
    fn test_bytes_require_content() {
        let err = ReturnOption::Bytes.parse("cat.png", None, source()).unwrap_err();
        assert!(matches!(err, StorageError::NullPayload { .. }));

        let content = ReturnOption::Bytes
            .parse("cat.png", Some(Bytes::from_static(b"raw")), source())
            .unwrap();
        assert_eq!(content.as_bytes().map(|b| b.as_ref()), Some(&b"raw"[..]));
    }
}
