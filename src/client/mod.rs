//! Remote object store seam
//!
//! The [`ObjectStore`] trait is the boundary between the virtual filesystem
//! and the remote transport. Everything behind it (HTTP, request signing,
//! retry/backoff, endpoint selection) is an external collaborator; the core
//! only assumes the blocking call contract described here.

pub mod memory;
pub mod paginator;

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::StorageClass;
use crate::error::ClientError;

pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Page size used for every listing call.
pub const PAGE_LIMIT: usize = 1000;

/// Per-item batch status: the operation succeeded.
pub const CODE_OK: u16 = 200;

/// Per-item batch status: the key was already absent. Treated as success,
/// the goal ("this key is not present") is already satisfied.
pub const CODE_ALREADY_GONE: u16 = 612;

/// Validity window of a minted upload token.
pub const UPLOAD_TOKEN_TTL: Duration = Duration::from_secs(24 * 3600);

/// Metadata the remote listing reports for one object, passed through
/// verbatim. `put_time` is in the store's native 100 ns epoch units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub size: u64,
    pub put_time: i64,
}

impl ObjectMetadata {
    /// The put timestamp as a UTC datetime (millisecond precision).
    pub fn modified(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.put_time / 10_000).unwrap_or(DateTime::UNIX_EPOCH)
    }
}

/// One entry of a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedObject {
    pub key: String,
    pub metadata: ObjectMetadata,
}

/// One page of a prefix listing. Pagination ends when `marker` is absent.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub items: Vec<ListedObject>,
    /// Directory-like groupings, only populated when the listing call was
    /// given a delimiter.
    pub common_prefixes: Vec<String>,
    pub marker: Option<String>,
}

/// Status of one item in a batch response, order-aligned with the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntryStatus {
    pub code: u16,
    pub error: Option<String>,
}

impl BatchEntryStatus {
    pub fn ok(&self) -> bool {
        self.code == CODE_OK || self.code == CODE_ALREADY_GONE
    }
}

/// Parameters for minting an upload token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadTokenSpec {
    /// The one bucket the token is scoped to.
    pub bucket: String,
    /// Validity window.
    pub ttl: Duration,
    /// Reject the upload if the target key already exists.
    pub insert_only: bool,
    /// Storage tier tag, threaded through unchanged from configuration.
    pub storage_class: Option<StorageClass>,
}

/// An opaque, pre-signed upload credential.
#[derive(Debug, Clone)]
pub struct UploadToken(String);

impl UploadToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Blocking contract with the remote object store.
///
/// Implementations must not retry internally on behalf of the core; the
/// first failure of any call is propagated as-is.
pub trait ObjectStore: Send + Sync {
    /// List one page of keys under `prefix`, resuming at `marker`. With a
    /// `delimiter`, keys containing the delimiter past the prefix are
    /// grouped into `common_prefixes` instead of being returned as items.
    fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        marker: Option<&str>,
        limit: usize,
        delimiter: Option<&str>,
    ) -> ClientResult<ListPage>;

    /// Metadata for one key, or `None` if it does not exist.
    fn stat(&self, bucket: &str, key: &str) -> ClientResult<Option<ObjectMetadata>>;

    /// Delete one key.
    fn delete(&self, bucket: &str, key: &str) -> ClientResult<()>;

    /// Delete up to [`crate::batch::MAX_BATCH_OPS`] keys in one call. The
    /// response is order-aligned with `keys`; per-item failures are reported
    /// as statuses, not as a call-level error.
    fn batch_delete(&self, bucket: &str, keys: &[String]) -> ClientResult<Vec<BatchEntryStatus>>;

    /// Mint an upload credential for the given scope.
    fn mint_upload_token(&self, spec: &UploadTokenSpec) -> ClientResult<UploadToken>;

    /// Upload one local file to `key`.
    fn put(&self, bucket: &str, key: &str, token: &UploadToken, local: &Path) -> ClientResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modified_converts_hundred_ns_units() {
        let meta = ObjectMetadata {
            size: 1,
            put_time: 15_000_000_000_000_000,
        };
        // 15_000_000_000_000_000 * 100ns == 1_500_000_000_000 ms
        assert_eq!(meta.modified().timestamp_millis(), 1_500_000_000_000);
    }

    #[test]
    fn test_batch_status_classification() {
        let deleted = BatchEntryStatus {
            code: CODE_OK,
            error: None,
        };
        let gone = BatchEntryStatus {
            code: CODE_ALREADY_GONE,
            error: Some("no such file or directory".into()),
        };
        let denied = BatchEntryStatus {
            code: 403,
            error: Some("forbidden".into()),
        };
        assert!(deleted.ok());
        assert!(gone.ok());
        assert!(!denied.ok());
    }
}
