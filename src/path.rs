//! Object key codec
//!
//! Translates between flat object keys (`/`-separated strings, the only
//! addressing the remote store understands) and structured segment sequences.
//! Pure functions, no I/O.

use crate::error::{Error, Result};

/// The key separator the remote store uses. Bit-exact: segments
/// `["a", "b", "c.txt"]` encode to `"a/b/c.txt"`, no leading separator.
pub const SEPARATOR: char = '/';

/// A parsed object key: a non-empty sequence of non-empty segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectPath {
    segments: Vec<String>,
}

impl ObjectPath {
    /// Build a path from segments. Fails if the sequence is empty or any
    /// segment is empty or contains the separator.
    pub fn from_segments<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(Error::invalid_path("path is empty"));
        }
        for segment in &segments {
            if segment.is_empty() {
                return Err(Error::invalid_path("path contains an empty segment"));
            }
            if segment.contains(SEPARATOR) {
                return Err(Error::invalid_path(format!(
                    "segment {:?} contains the separator",
                    segment
                )));
            }
        }
        Ok(Self { segments })
    }

    /// Split a key on the separator. An empty key, a bare separator, or any
    /// empty segment is invalid.
    pub fn parse(key: &str) -> Result<Self> {
        if key.is_empty() {
            return Err(Error::invalid_path("path is empty"));
        }
        Self::from_segments(key.split(SEPARATOR))
    }

    /// Parse a listed key relative to the filesystem's own root prefix.
    /// `prefix` must already be normalized (see [`normalize_prefix`]).
    pub fn parse_relative(key: &str, prefix: &str) -> Result<Self> {
        match key.strip_prefix(prefix) {
            Some(rest) => Self::parse(rest),
            None => Err(Error::invalid_path(format!(
                "key {:?} is not under prefix {:?}",
                key, prefix
            ))),
        }
    }

    /// Join segments back into a flat key.
    pub fn encode(&self) -> String {
        self.segments.join("/")
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The final segment.
    pub fn file_name(&self) -> &str {
        // Invariant: segments is never empty.
        &self.segments[self.segments.len() - 1]
    }

    /// The path minus its final segment, or `None` for a single-segment path.
    pub fn parent(&self) -> Option<ObjectPath> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(ObjectPath {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }
}

impl std::fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Normalize a caller-supplied prefix for use as a listing prefix: a
/// non-empty prefix that does not end with the separator gets one appended.
/// An empty prefix stays empty (the whole bucket).
pub fn normalize_prefix(prefix: &str) -> String {
    if prefix.is_empty() || prefix.ends_with(SEPARATOR) {
        prefix.to_string()
    } else {
        format!("{}{}", prefix, SEPARATOR)
    }
}
