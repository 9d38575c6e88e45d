//! Virtual filesystem facade
//!
//! [`BucketFs`] roots a directory tree at one bucket/prefix pair and keeps
//! it in sync with the remote store. The lifecycle is two-phase: `restore`
//! builds the instance without touching the network, `rehydrate` replays the
//! prefix listing into the tree. `open` does both, and a listing failure at
//! that point is stored rather than returned, then re-raised by the first
//! operation that depends on the tree.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::batch;
use crate::client::paginator;
use crate::client::{ObjectStore, CODE_ALREADY_GONE};
use crate::config::StoreConfig;
use crate::error::{ClientError, Error, Result};
use crate::path::{normalize_prefix, ObjectPath, SEPARATOR};
use crate::tree::{DirectoryTree, NodeId, ROOT_ID};
use crate::upload::{UploadCoordinator, UploadPlan};

/// Size and timestamp of a file node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
    pub modified: DateTime<Utc>,
}

enum TreeState {
    /// Restored from configuration; the listing has not been replayed yet.
    NotHydrated,
    Ready,
    /// The listing failed; the error is re-raised on first use.
    Failed(ClientError),
}

struct Inner {
    tree: DirectoryTree,
    state: TreeState,
}

/// Hierarchical view over one prefix of a flat object store.
pub struct BucketFs {
    store: Arc<dyn ObjectStore>,
    config: StoreConfig,
    prefix: String,
    inner: Mutex<Inner>,
}

impl BucketFs {
    /// Build an instance and immediately replay the listing. A listing
    /// failure does not fail `open`; it is stored and surfaces on the first
    /// tree-dependent call. Only a malformed prefix fails here.
    pub fn open(store: Arc<dyn ObjectStore>, config: StoreConfig) -> Result<Self> {
        let fs = Self::restore(store, config)?;
        if let Err(err) = fs.rehydrate() {
            warn!(prefix = %fs.prefix, error = %err, "initial listing failed, deferred");
        }
        Ok(fs)
    }

    /// Build an instance without touching the network. The tree hydrates
    /// lazily on first use, or explicitly via [`BucketFs::rehydrate`].
    pub fn restore(store: Arc<dyn ObjectStore>, config: StoreConfig) -> Result<Self> {
        if !config.object_prefix.is_empty() {
            // Reject prefixes that cannot name a real key subtree.
            let trimmed = config.object_prefix.trim_end_matches(SEPARATOR);
            ObjectPath::parse(trimmed)?;
        }
        let prefix = normalize_prefix(&config.object_prefix);
        Ok(Self {
            store,
            config,
            prefix,
            inner: Mutex::new(Inner {
                tree: DirectoryTree::new(),
                state: TreeState::NotHydrated,
            }),
        })
    }

    /// Discard the tree and rebuild it from a fresh full listing.
    pub fn rehydrate(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        self.populate(&mut inner)
    }

    fn populate(&self, inner: &mut Inner) -> Result<()> {
        info!(prefix = %self.prefix, "replaying prefix listing");
        let mut tree = DirectoryTree::new();
        let result = paginator::for_each_under_prefix(
            self.store.as_ref(),
            &self.config.bucket,
            &self.prefix,
            |key, metadata| {
                let relative = ObjectPath::parse_relative(key, &self.prefix)?;
                tree.insert_file(&relative, *metadata)?;
                Ok(())
            },
        );
        match result {
            Ok(()) => {
                info!(prefix = %self.prefix, nodes = tree.len(), "listing replay done");
                inner.tree = tree;
                inner.state = TreeState::Ready;
                Ok(())
            }
            Err(err) => {
                let source = match err {
                    Error::Client(client) => client,
                    other => ClientError::new(other.to_string()),
                };
                inner.tree = DirectoryTree::new();
                inner.state = TreeState::Failed(source.clone());
                Err(Error::Listing {
                    prefix: self.prefix.clone(),
                    source,
                })
            }
        }
    }

    /// Re-raise a stored listing failure, or hydrate lazily after `restore`.
    fn ensure_ready(&self, inner: &mut Inner) -> Result<()> {
        match &inner.state {
            TreeState::Ready => Ok(()),
            TreeState::NotHydrated => self.populate(inner),
            TreeState::Failed(source) => Err(Error::Listing {
                prefix: self.prefix.clone(),
                source: source.clone(),
            }),
        }
    }

    /// Parse a caller path. The empty string names the root.
    fn parse(&self, path: &str) -> Result<Option<ObjectPath>> {
        if path.is_empty() {
            return Ok(None);
        }
        ObjectPath::parse(path).map(Some)
    }

    fn find(&self, inner: &Inner, path: &Option<ObjectPath>) -> Result<Option<NodeId>> {
        match path {
            None => Ok(Some(ROOT_ID)),
            Some(path) => inner.tree.find(path),
        }
    }

    /// Child names at `path`, in name order. The empty path lists the root.
    pub fn list(&self, path: &str) -> Result<Vec<String>> {
        let path = self.parse(path)?;
        let mut inner = self.inner.lock();
        self.ensure_ready(&mut inner)?;
        let id = self
            .find(&inner, &path)?
            .ok_or_else(|| Error::NotFound(display(&path)))?;
        inner
            .tree
            .child_names(id)
            .ok_or_else(|| Error::NotADirectory(display(&path)))
    }

    pub fn list_root(&self) -> Result<Vec<String>> {
        self.list("")
    }

    pub fn exists(&self, path: &str) -> Result<bool> {
        let path = self.parse(path)?;
        let mut inner = self.inner.lock();
        self.ensure_ready(&mut inner)?;
        Ok(self.find(&inner, &path)?.is_some())
    }

    pub fn is_file(&self, path: &str) -> Result<bool> {
        let path = self.parse(path)?;
        let mut inner = self.inner.lock();
        self.ensure_ready(&mut inner)?;
        Ok(self
            .find(&inner, &path)?
            .is_some_and(|id| inner.tree.is_file(id)))
    }

    pub fn is_dir(&self, path: &str) -> Result<bool> {
        let path = self.parse(path)?;
        let mut inner = self.inner.lock();
        self.ensure_ready(&mut inner)?;
        Ok(self
            .find(&inner, &path)?
            .is_some_and(|id| inner.tree.is_dir(id)))
    }

    /// Size and last-modified time of the file at `path`.
    pub fn stat(&self, path: &str) -> Result<FileStat> {
        let parsed = self.parse(path)?;
        let mut inner = self.inner.lock();
        self.ensure_ready(&mut inner)?;
        let id = self
            .find(&inner, &parsed)?
            .ok_or_else(|| Error::NotFound(path.to_string()))?;
        let metadata = inner
            .tree
            .metadata(id)
            .ok_or_else(|| Error::NotAFile(path.to_string()))?;
        Ok(FileStat {
            size: metadata.size,
            modified: metadata.modified(),
        })
    }

    /// Size and last-modified time straight from the remote store, bypassing
    /// the tree. Useful when the tree may be stale relative to the remote.
    pub fn stat_remote(&self, path: &str) -> Result<FileStat> {
        let parsed = self
            .parse(path)?
            .ok_or_else(|| Error::NotAFile(path.to_string()))?;
        let key = format!("{}{}", self.prefix, parsed.encode());
        let metadata = self
            .store
            .stat(&self.config.bucket, &key)?
            .ok_or_else(|| Error::NotFound(path.to_string()))?;
        Ok(FileStat {
            size: metadata.size,
            modified: metadata.modified(),
        })
    }

    /// Direct-download URL for the file at `path` on the configured domain.
    pub fn download_url(&self, path: &str) -> Result<String> {
        if self.config.download_domain.is_empty() {
            return Err(Error::Config(
                "download domain is not configured".to_string(),
            ));
        }
        let parsed = self
            .parse(path)?
            .ok_or_else(|| Error::NotAFile(path.to_string()))?;
        {
            let mut inner = self.inner.lock();
            self.ensure_ready(&mut inner)?;
            let id = inner
                .tree
                .find(&parsed)?
                .ok_or_else(|| Error::NotFound(path.to_string()))?;
            if !inner.tree.is_file(id) {
                return Err(Error::NotAFile(path.to_string()));
            }
        }
        let scheme = if self.config.use_https { "https" } else { "http" };
        Ok(format!(
            "{}://{}/{}{}",
            scheme,
            self.config.download_domain,
            self.prefix,
            parsed.encode()
        ))
    }

    /// One-level listing straight from the remote store, bypassing the
    /// tree: names of objects directly under `path` plus directory-like
    /// groupings (returned with a trailing separator).
    pub fn list_shallow(&self, path: &str) -> Result<Vec<String>> {
        let mut prefix = self.prefix.clone();
        if let Some(parsed) = self.parse(path)? {
            prefix.push_str(&parsed.encode());
            prefix.push(SEPARATOR);
        }
        let names = std::cell::RefCell::new(Vec::new());
        paginator::for_each_shallow(
            self.store.as_ref(),
            &self.config.bucket,
            &prefix,
            |key, _| {
                names.borrow_mut().push(key[prefix.len()..].to_string());
                Ok(())
            },
            |common| {
                names.borrow_mut().push(common[prefix.len()..].to_string());
                Ok(())
            },
        )?;
        Ok(names.into_inner())
    }

    /// Delete one file remotely, then drop its node and prune now-empty
    /// ancestors locally.
    pub fn delete_file(&self, path: &str) -> Result<()> {
        let parsed = self
            .parse(path)?
            .ok_or_else(|| Error::NotAFile(path.to_string()))?;
        let mut inner = self.inner.lock();
        self.ensure_ready(&mut inner)?;
        let id = inner
            .tree
            .find(&parsed)?
            .ok_or_else(|| Error::NotFound(path.to_string()))?;
        if !inner.tree.is_file(id) {
            return Err(Error::NotAFile(path.to_string()));
        }
        let key = format!("{}{}", self.prefix, parsed.encode());
        info!(key = %key, "deleting object");
        match self.store.delete(&self.config.bucket, &key) {
            Ok(()) => {}
            // Already gone remotely; the goal is already satisfied.
            Err(err) if err.code == Some(CODE_ALREADY_GONE) => {}
            Err(err) => return Err(err.into()),
        }
        inner.tree.remove_file(&parsed)
    }

    /// Delete every object under this instance's prefix, then clear the
    /// tree. An aborted run leaves already-deleted keys deleted; the error
    /// names the key that stopped it.
    pub fn delete_all(&self) -> Result<usize> {
        let mut inner = self.inner.lock();
        self.ensure_ready(&mut inner)?;
        let deleted = batch::delete_prefix(self.store.as_ref(), &self.config.bucket, &self.prefix)?;
        inner.tree.clear();
        Ok(deleted)
    }

    /// Archive a set of local files under this instance's prefix (pre-clean,
    /// insert-only upload), then rebuild the tree to reflect the result.
    pub fn archive(&self, plan: &UploadPlan) -> Result<usize> {
        let uploaded = UploadCoordinator::new(self.store.as_ref(), &self.config)
            .upload_all(&self.prefix, plan)?;
        self.rehydrate()?;
        Ok(uploaded)
    }

    /// The normalized object-key prefix this instance is rooted at.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// True once a listing replay has succeeded.
    pub fn is_hydrated(&self) -> bool {
        matches!(self.inner.lock().state, TreeState::Ready)
    }
}

fn display(path: &Option<ObjectPath>) -> String {
    path.as_ref().map_or_else(String::new, ObjectPath::encode)
}
