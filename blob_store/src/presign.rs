//! Signed URL structures for direct client access.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Expiry used when the caller does not pick one.
pub const DEFAULT_SIGNED_URL_EXPIRY: Duration = Duration::from_secs(60 * 60);

/// Maximum signed URL expiry (7 days for S3).
pub const MAX_PRESIGN_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// How a signed URL is scoped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignedAccess {
    /// Read access expiring after the given duration.
    Expiry(Duration),

    /// Access governed by a named stored access policy on the container.
    StoredPolicy(String),
}

impl Default for SignedAccess {
    fn default() -> Self {
        SignedAccess::Expiry(DEFAULT_SIGNED_URL_EXPIRY)
    }
}

/// A signed URL for GET or PUT operations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresignedUrl {
    /// The signed URL.
    pub url: Url,

    /// Expiration duration from creation time.
    pub expires_in: Duration,

    /// HTTP method (GET or PUT).
    pub method: HttpMethod,
}

/// HTTP method for signed requests.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Put,
}

impl From<HttpMethod> for http::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => http::Method::GET,
            HttpMethod::Put => http::Method::PUT,
        }
    }
}

impl PresignedUrl {
    /// Create a signed GET URL.
    pub fn get(url: Url, expires_in: Duration) -> Self {
        Self {
            url,
            expires_in,
            method: HttpMethod::Get,
        }
    }
}

/// Validate signed URL expiry duration.
pub fn validate_expiry(expires_in: Duration) -> Result<(), String> {
    if expires_in > MAX_PRESIGN_EXPIRY {
        Err(format!(
            "Expiry duration {:?} exceeds maximum allowed {:?}",
            expires_in, MAX_PRESIGN_EXPIRY
        ))
    } else if expires_in.is_zero() {
        Err("Expiry duration must be greater than zero".to_string())
    } else {
        Ok(())
    }
}
