//! Error types for virtual filesystem and remote store operations.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Error reported by an [`crate::client::ObjectStore`] implementation.
///
/// Carries the transport's message and, when the remote replied at all, the
/// status code it replied with. The core never retries these; retry policy
/// belongs to the transport behind the trait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientError {
    pub message: String,
    pub code: Option<u16>,
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "object store error (code {}): {}", code, self.message),
            None => write!(f, "object store error: {}", self.message),
        }
    }
}

impl std::error::Error for ClientError {}

impl ClientError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: u16) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }
}

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or empty path/key. Fatal to the call, never retried.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// A lookup expected a file node and found something else.
    #[error("{0} is not a file")]
    NotAFile(String),

    /// A lookup expected a directory node and found something else.
    #[error("{0} is not a directory")]
    NotADirectory(String),

    /// No node exists at the given path.
    #[error("{0} not found")]
    NotFound(String),

    /// The target key already exists and the upload was insert-only.
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// The initial prefix listing failed. Stored on the filesystem instance
    /// and re-raised on the first operation that depends on the tree.
    #[error("listing prefix {prefix} failed: {source}")]
    Listing {
        prefix: String,
        source: ClientError,
    },

    /// An item in a batch-delete response carried an unexpected status code.
    /// Aborts the remaining batches of the operation.
    #[error("delete error {key} (code {code}): {message}")]
    BatchDelete {
        key: String,
        code: u16,
        message: String,
    },

    /// A single file upload failed. Aborts the remaining uploads of the run.
    #[error("upload of {key} failed: {source}")]
    Upload {
        key: String,
        source: ClientError,
    },

    /// The configuration lacks something the requested operation needs.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport-level failure reported by the object store.
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl Error {
    pub(crate) fn invalid_path(detail: impl Into<String>) -> Self {
        Error::InvalidPath(detail.into())
    }
}
