//! Upload coordination
//!
//! Pre-cleans the run's namespace, mints one scoped insert-only credential,
//! then uploads each planned file sequentially. The first failed upload
//! aborts the remainder; already-uploaded objects stay uploaded.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::batch;
use crate::client::{ObjectStore, UploadTokenSpec, UPLOAD_TOKEN_TTL};
use crate::config::{StorageClass, StoreConfig};
use crate::error::{Error, Result};

/// Mapping from target object-key suffixes to local file paths. Iteration
/// is in suffix order, so upload order and logs are deterministic.
#[derive(Debug, Clone, Default)]
pub struct UploadPlan {
    entries: BTreeMap<String, PathBuf>,
}

impl UploadPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, suffix: impl Into<String>, local: impl Into<PathBuf>) -> &mut Self {
        self.entries.insert(suffix.into(), local.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.entries
            .iter()
            .map(|(suffix, local)| (suffix.as_str(), local.as_path()))
    }
}

/// Drives one archive run under an object-key prefix.
pub struct UploadCoordinator<'a> {
    store: &'a dyn ObjectStore,
    config: &'a StoreConfig,
}

impl<'a> UploadCoordinator<'a> {
    pub fn new(store: &'a dyn ObjectStore, config: &'a StoreConfig) -> Self {
        Self { store, config }
    }

    /// Upload every planned file to `prefix + suffix`. Returns the number of
    /// files uploaded. A no-op for an empty plan.
    ///
    /// Existing objects under `prefix` are deleted first, so repeated runs
    /// under the same prefix never leave stale siblings. The minted token is
    /// bucket-scoped, valid for 24 hours, and insert-only: a concurrent
    /// writer racing us to the same key loses instead of being overwritten.
    pub fn upload_all(&self, prefix: &str, plan: &UploadPlan) -> Result<usize> {
        if plan.is_empty() {
            return Ok(0);
        }

        batch::delete_prefix(self.store, &self.config.bucket, prefix)?;

        let storage_class = match self.config.storage_class {
            StorageClass::Standard => None,
            other => Some(other),
        };
        let token = self.store.mint_upload_token(&UploadTokenSpec {
            bucket: self.config.bucket.clone(),
            ttl: UPLOAD_TOKEN_TTL,
            insert_only: true,
            storage_class,
        })?;

        let mut uploaded = 0usize;
        for (suffix, local) in plan.iter() {
            let key = format!("{}{}", prefix, suffix);
            self.store
                .put(&self.config.bucket, &key, &token, local)
                .map_err(|source| match source.code {
                    Some(614) => Error::AlreadyExists(key.clone()),
                    _ => Error::Upload {
                        key: key.clone(),
                        source,
                    },
                })?;
            info!(local = %local.display(), key = %key, "uploaded");
            uploaded += 1;
        }
        info!(prefix, uploaded, "uploading is done");
        Ok(uploaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::memory::MemoryObjectStore;
    use std::io::Write;
    use tempfile::TempDir;

    fn local_file(dir: &TempDir, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents).unwrap();
        path
    }

    fn config() -> StoreConfig {
        StoreConfig::new("ak", "sk", "bucket", "jobs")
    }

    #[test]
    fn test_uploads_all_planned_files_under_prefix() {
        let dir = TempDir::new().unwrap();
        let store = MemoryObjectStore::new();
        let config = config();
        let mut plan = UploadPlan::new();
        plan.insert("sub/a.txt", local_file(&dir, "a.txt", b"aaaa"));
        plan.insert("b.txt", local_file(&dir, "b.txt", b"bb"));

        let uploaded = UploadCoordinator::new(&store, &config)
            .upload_all("jobs/7/", &plan)
            .unwrap();
        assert_eq!(uploaded, 2);
        assert!(store.contains("bucket", "jobs/7/sub/a.txt"));
        assert!(store.contains("bucket", "jobs/7/b.txt"));
    }

    #[test]
    fn test_preclean_removes_stale_siblings() {
        let dir = TempDir::new().unwrap();
        let store = MemoryObjectStore::new();
        store.seed("bucket", "jobs/7/stale.bin", 9);
        store.seed("bucket", "jobs/8/unrelated.bin", 9);
        let config = config();
        let mut plan = UploadPlan::new();
        plan.insert("fresh.txt", local_file(&dir, "fresh.txt", b"x"));

        UploadCoordinator::new(&store, &config)
            .upload_all("jobs/7/", &plan)
            .unwrap();
        assert!(!store.contains("bucket", "jobs/7/stale.bin"));
        assert!(store.contains("bucket", "jobs/7/fresh.txt"));
        assert!(store.contains("bucket", "jobs/8/unrelated.bin"));
    }

    #[test]
    fn test_empty_plan_skips_preclean_and_token() {
        let store = MemoryObjectStore::new();
        store.seed("bucket", "jobs/7/existing.bin", 9);
        let config = config();
        let uploaded = UploadCoordinator::new(&store, &config)
            .upload_all("jobs/7/", &UploadPlan::new())
            .unwrap();
        assert_eq!(uploaded, 0);
        assert!(store.contains("bucket", "jobs/7/existing.bin"));
    }

    #[test]
    fn test_missing_local_file_aborts_remaining_uploads() {
        let dir = TempDir::new().unwrap();
        let store = MemoryObjectStore::new();
        let config = config();
        let mut plan = UploadPlan::new();
        plan.insert("a.txt", dir.path().join("does-not-exist"));
        plan.insert("z.txt", local_file(&dir, "z.txt", b"zz"));

        let err = UploadCoordinator::new(&store, &config)
            .upload_all("jobs/7/", &plan)
            .unwrap_err();
        assert!(matches!(err, Error::Upload { ref key, .. } if key == "jobs/7/a.txt"));
        // a.txt failed first, so z.txt was never attempted
        assert!(!store.contains("bucket", "jobs/7/z.txt"));
    }

    /// Store whose `put` always reports an insert-only conflict, standing in
    /// for a concurrent writer that won the race after our pre-clean.
    struct ConflictingStore(MemoryObjectStore);

    impl crate::client::ObjectStore for ConflictingStore {
        fn list_page(
            &self,
            bucket: &str,
            prefix: &str,
            marker: Option<&str>,
            limit: usize,
            delimiter: Option<&str>,
        ) -> crate::client::ClientResult<crate::client::ListPage> {
            self.0.list_page(bucket, prefix, marker, limit, delimiter)
        }

        fn stat(
            &self,
            bucket: &str,
            key: &str,
        ) -> crate::client::ClientResult<Option<crate::client::ObjectMetadata>> {
            self.0.stat(bucket, key)
        }

        fn delete(&self, bucket: &str, key: &str) -> crate::client::ClientResult<()> {
            self.0.delete(bucket, key)
        }

        fn batch_delete(
            &self,
            bucket: &str,
            keys: &[String],
        ) -> crate::client::ClientResult<Vec<crate::client::BatchEntryStatus>> {
            self.0.batch_delete(bucket, keys)
        }

        fn mint_upload_token(
            &self,
            spec: &UploadTokenSpec,
        ) -> crate::client::ClientResult<crate::client::UploadToken> {
            self.0.mint_upload_token(spec)
        }

        fn put(
            &self,
            _bucket: &str,
            _key: &str,
            _token: &crate::client::UploadToken,
            _local: &Path,
        ) -> crate::client::ClientResult<()> {
            Err(crate::error::ClientError::with_code("file exists", 614))
        }
    }

    #[test]
    fn test_racing_writer_surfaces_already_exists() {
        let dir = TempDir::new().unwrap();
        let store = ConflictingStore(MemoryObjectStore::new());
        let config = config();
        let mut plan = UploadPlan::new();
        plan.insert("a.txt", local_file(&dir, "a.txt", b"x"));
        let err = UploadCoordinator::new(&store, &config)
            .upload_all("jobs/7/", &plan)
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(ref key) if key == "jobs/7/a.txt"));
    }
}
