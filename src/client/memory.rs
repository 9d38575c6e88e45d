//! In-process object store
//!
//! A [`MemoryObjectStore`] backs the trait with plain maps: real marker
//! pagination, delimiter grouping, per-item batch statuses, and insert-only
//! enforcement. Used by the crate's own tests and as a stand-in transport
//! for local experiments.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use parking_lot::Mutex;

use super::{
    BatchEntryStatus, ClientResult, ListPage, ListedObject, ObjectMetadata, ObjectStore,
    UploadToken, UploadTokenSpec, CODE_ALREADY_GONE, CODE_OK,
};
use crate::error::ClientError;

// Seeded/uploaded objects get increasing put times starting here, in the
// store's native 100 ns units (2020-01-01T00:00:00Z).
const PUT_TIME_BASE: i64 = 15_778_368_000_000_000;

#[derive(Default)]
struct State {
    /// bucket -> key -> metadata.
    buckets: BTreeMap<String, BTreeMap<String, ObjectMetadata>>,
    /// Per-key forced batch-delete statuses.
    poisoned_deletes: HashMap<String, (u16, String)>,
    listing_failure: Option<String>,
    page_limit_override: Option<usize>,
    clock: i64,
    list_calls: usize,
    batch_calls: Vec<usize>,
}

impl State {
    fn next_put_time(&mut self) -> i64 {
        self.clock += 10_000_000; // one second
        PUT_TIME_BASE + self.clock
    }
}

/// Map-backed [`ObjectStore`] implementation.
#[derive(Default)]
pub struct MemoryObjectStore {
    state: Mutex<State>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object directly, bypassing the upload path.
    pub fn seed(&self, bucket: &str, key: &str, size: u64) {
        let mut state = self.state.lock();
        let put_time = state.next_put_time();
        state
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), ObjectMetadata { size, put_time });
    }

    /// Make every subsequent `list_page` call fail with the given message.
    pub fn fail_listings(&self, message: &str) {
        self.state.lock().listing_failure = Some(message.to_string());
    }

    /// Restore normal listing behavior.
    pub fn clear_listing_failure(&self) {
        self.state.lock().listing_failure = None;
    }

    /// Force the batch-delete status of one key.
    pub fn poison_delete(&self, key: &str, code: u16, message: &str) {
        self.state
            .lock()
            .poisoned_deletes
            .insert(key.to_string(), (code, message.to_string()));
    }

    /// Cap page sizes below the caller-requested limit, to exercise
    /// pagination with small fixtures.
    pub fn set_page_limit_override(&self, limit: usize) {
        self.state.lock().page_limit_override = Some(limit);
    }

    /// Number of `list_page` calls served so far.
    pub fn list_calls(&self) -> usize {
        self.state.lock().list_calls
    }

    /// Sizes of the batch-delete calls received so far.
    pub fn batch_calls(&self) -> Vec<usize> {
        self.state.lock().batch_calls.clone()
    }

    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.state
            .lock()
            .buckets
            .get(bucket)
            .is_some_and(|b| b.contains_key(key))
    }

    pub fn object_count(&self, bucket: &str) -> usize {
        self.state.lock().buckets.get(bucket).map_or(0, |b| b.len())
    }
}

impl ObjectStore for MemoryObjectStore {
    fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        marker: Option<&str>,
        limit: usize,
        delimiter: Option<&str>,
    ) -> ClientResult<ListPage> {
        let mut state = self.state.lock();
        state.list_calls += 1;
        if let Some(message) = &state.listing_failure {
            return Err(ClientError::new(message.clone()));
        }
        let limit = state.page_limit_override.map_or(limit, |l| l.min(limit));
        let objects = state.buckets.get(bucket).cloned().unwrap_or_default();

        let mut page = ListPage::default();
        let mut emitted = 0usize;
        let mut remaining = false;
        for (key, metadata) in objects.range::<str, _>((
            marker.map_or(std::ops::Bound::Unbounded, std::ops::Bound::Excluded),
            std::ops::Bound::Unbounded,
        )) {
            if !key.starts_with(prefix) {
                continue;
            }
            if emitted >= limit {
                remaining = true;
                break;
            }
            emitted += 1;
            page.marker = Some(key.clone());
            match delimiter.and_then(|d| key[prefix.len()..].find(d).map(|i| (d, i))) {
                Some((d, idx)) => {
                    let common = format!("{}{}", &key[..prefix.len() + idx], d);
                    if page.common_prefixes.last() != Some(&common) {
                        page.common_prefixes.push(common);
                    }
                }
                None => page.items.push(ListedObject {
                    key: key.clone(),
                    metadata: *metadata,
                }),
            }
        }
        if !remaining {
            page.marker = None;
        }
        Ok(page)
    }

    fn stat(&self, bucket: &str, key: &str) -> ClientResult<Option<ObjectMetadata>> {
        Ok(self
            .state
            .lock()
            .buckets
            .get(bucket)
            .and_then(|b| b.get(key))
            .copied())
    }

    fn delete(&self, bucket: &str, key: &str) -> ClientResult<()> {
        let mut state = self.state.lock();
        match state.buckets.get_mut(bucket).and_then(|b| b.remove(key)) {
            Some(_) => Ok(()),
            None => Err(ClientError::with_code(
                "no such file or directory",
                CODE_ALREADY_GONE,
            )),
        }
    }

    fn batch_delete(&self, bucket: &str, keys: &[String]) -> ClientResult<Vec<BatchEntryStatus>> {
        let mut state = self.state.lock();
        state.batch_calls.push(keys.len());
        let mut statuses = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some((code, message)) = state.poisoned_deletes.get(key).cloned() {
                statuses.push(BatchEntryStatus {
                    code,
                    error: Some(message),
                });
                continue;
            }
            let removed = state.buckets.get_mut(bucket).and_then(|b| b.remove(key));
            statuses.push(match removed {
                Some(_) => BatchEntryStatus {
                    code: CODE_OK,
                    error: None,
                },
                None => BatchEntryStatus {
                    code: CODE_ALREADY_GONE,
                    error: Some("no such file or directory".to_string()),
                },
            });
        }
        Ok(statuses)
    }

    fn mint_upload_token(&self, spec: &UploadTokenSpec) -> ClientResult<UploadToken> {
        let encoded = serde_json::to_string(spec)
            .map_err(|e| ClientError::new(format!("token encoding failed: {}", e)))?;
        Ok(UploadToken::new(encoded))
    }

    fn put(&self, bucket: &str, key: &str, token: &UploadToken, local: &Path) -> ClientResult<()> {
        let spec: UploadTokenSpec = serde_json::from_str(token.as_str())
            .map_err(|_| ClientError::with_code("bad upload token", 401))?;
        if spec.bucket != bucket {
            return Err(ClientError::with_code("token scoped to another bucket", 401));
        }
        let size = std::fs::metadata(local)
            .map_err(|e| ClientError::new(format!("read {}: {}", local.display(), e)))?
            .len();

        let mut state = self.state.lock();
        let exists = state
            .buckets
            .get(bucket)
            .is_some_and(|b| b.contains_key(key));
        if spec.insert_only && exists {
            return Err(ClientError::with_code("file exists", 614));
        }
        let put_time = state.next_put_time();
        state
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), ObjectMetadata { size, put_time });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_list_page_paginates_with_marker() {
        let store = MemoryObjectStore::new();
        for i in 0..3 {
            store.seed("b", &format!("p/{}", i), 1);
        }
        let first = store.list_page("b", "p/", None, 2, None).unwrap();
        assert_eq!(first.items.len(), 2);
        let marker = first.marker.unwrap();
        let second = store
            .list_page("b", "p/", Some(&marker), 2, None)
            .unwrap();
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.marker, None);
    }

    #[test]
    fn test_single_delete_of_absent_key_reports_612() {
        let store = MemoryObjectStore::new();
        let err = store.delete("b", "missing").unwrap_err();
        assert_eq!(err.code, Some(CODE_ALREADY_GONE));
    }

    #[test]
    fn test_insert_only_put_rejects_existing_key() {
        let store = MemoryObjectStore::new();
        store.seed("b", "k", 1);
        let token = store
            .mint_upload_token(&UploadTokenSpec {
                bucket: "b".to_string(),
                ttl: super::super::UPLOAD_TOKEN_TTL,
                insert_only: true,
                storage_class: None,
            })
            .unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"data").unwrap();
        let err = store.put("b", "k", &token, file.path()).unwrap_err();
        assert_eq!(err.code, Some(614));
    }
}
