//! Batched remote deletion
//!
//! Accumulates object keys into bounded groups, submits each group as one
//! remote batch call, and classifies the per-item statuses. Codes 200 and
//! 612 are both success; any other code fails the whole operation before
//! further batches are submitted (fail-fast).

use tracing::{debug, info};

use crate::client::paginator;
use crate::client::{ObjectStore, CODE_ALREADY_GONE, CODE_OK};
use crate::error::{Error, Result};

/// Maximum number of operations per remote batch call.
pub const MAX_BATCH_OPS: usize = 1000;

/// Accumulator for one logical delete operation.
pub struct BatchDeleter<'a> {
    store: &'a dyn ObjectStore,
    bucket: &'a str,
    pending: Vec<String>,
    submitted: usize,
}

impl<'a> BatchDeleter<'a> {
    pub fn new(store: &'a dyn ObjectStore, bucket: &'a str) -> Self {
        Self {
            store,
            bucket,
            pending: Vec::with_capacity(MAX_BATCH_OPS),
            submitted: 0,
        }
    }

    /// Enqueue a key; submits the current batch once it reaches
    /// [`MAX_BATCH_OPS`].
    pub fn push(&mut self, key: impl Into<String>) -> Result<()> {
        let key = key.into();
        debug!(bucket = self.bucket, key = %key, "enqueue delete");
        self.pending.push(key);
        if self.pending.len() >= MAX_BATCH_OPS {
            self.submit()?;
        }
        Ok(())
    }

    /// Flush the trailing partial batch and return the total number of keys
    /// processed across all submitted batches.
    pub fn finish(mut self) -> Result<usize> {
        if !self.pending.is_empty() {
            self.submit()?;
        }
        Ok(self.submitted)
    }

    fn submit(&mut self) -> Result<()> {
        let keys = std::mem::replace(&mut self.pending, Vec::with_capacity(MAX_BATCH_OPS));
        debug!(bucket = self.bucket, count = keys.len(), "submit batch delete");
        let statuses = self.store.batch_delete(self.bucket, &keys)?;
        for (index, key) in keys.iter().enumerate() {
            match statuses.get(index) {
                Some(status) if status.code == CODE_OK || status.code == CODE_ALREADY_GONE => {}
                Some(status) => {
                    return Err(Error::BatchDelete {
                        key: key.clone(),
                        code: status.code,
                        message: status.error.clone().unwrap_or_default(),
                    })
                }
                None => {
                    return Err(Error::BatchDelete {
                        key: key.clone(),
                        code: 0,
                        message: "missing status in batch response".to_string(),
                    })
                }
            }
        }
        self.submitted += keys.len();
        Ok(())
    }
}

/// Delete every object under `prefix`: stream the listing straight into a
/// [`BatchDeleter`]. Returns the number of keys deleted.
pub fn delete_prefix(store: &dyn ObjectStore, bucket: &str, prefix: &str) -> Result<usize> {
    let mut deleter = BatchDeleter::new(store, bucket);
    paginator::for_each_under_prefix(store, bucket, prefix, |key, _| deleter.push(key))?;
    let deleted = deleter.finish()?;
    info!(bucket, prefix, deleted, "prefix deletion done");
    Ok(deleted)
}
