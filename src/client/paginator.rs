//! Listing pagination
//!
//! Hides continuation-marker pagination behind a single logical iteration.
//! The first I/O failure propagates immediately; retry is the transport's
//! concern, not this module's.

use tracing::debug;

use super::{ObjectMetadata, ObjectStore, PAGE_LIMIT};
use crate::error::Result;
use crate::path::SEPARATOR;

/// Invoke `on_entry` for every object under `prefix`, across all pages.
/// `prefix` must already be normalized.
pub fn for_each_under_prefix<F>(
    store: &dyn ObjectStore,
    bucket: &str,
    prefix: &str,
    mut on_entry: F,
) -> Result<()>
where
    F: FnMut(&str, &ObjectMetadata) -> Result<()>,
{
    let mut marker: Option<String> = None;
    loop {
        debug!(bucket, prefix, marker = ?marker, "listing page");
        let page = store.list_page(bucket, prefix, marker.as_deref(), PAGE_LIMIT, None)?;
        for item in &page.items {
            on_entry(&item.key, &item.metadata)?;
        }
        match page.marker {
            Some(next) if !next.is_empty() => marker = Some(next),
            _ => return Ok(()),
        }
    }
}

/// Single-level listing: invoke `on_entry` for objects directly under
/// `prefix` and `on_common_prefix` for each directory-like grouping the
/// delimiter produces. The listing prefix itself is skipped when the store
/// echoes it back as an entry.
pub fn for_each_shallow<F, G>(
    store: &dyn ObjectStore,
    bucket: &str,
    prefix: &str,
    mut on_entry: F,
    mut on_common_prefix: G,
) -> Result<()>
where
    F: FnMut(&str, &ObjectMetadata) -> Result<()>,
    G: FnMut(&str) -> Result<()>,
{
    let delimiter = SEPARATOR.to_string();
    let mut marker: Option<String> = None;
    loop {
        debug!(bucket, prefix, marker = ?marker, "listing shallow page");
        let page = store.list_page(
            bucket,
            prefix,
            marker.as_deref(),
            PAGE_LIMIT,
            Some(&delimiter),
        )?;
        for item in &page.items {
            if item.key != prefix {
                on_entry(&item.key, &item.metadata)?;
            }
        }
        for common in &page.common_prefixes {
            if common != prefix {
                on_common_prefix(common)?;
            }
        }
        match page.marker {
            Some(next) if !next.is_empty() => marker = Some(next),
            _ => return Ok(()),
        }
    }
}
