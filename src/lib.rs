//! bucketfs: a hierarchical view over a flat object store
//!
//! Remote object stores address everything by a flat string key under a
//! bucket; there are no real directories. This crate synthesizes a
//! directory tree from a paginated "list keys by prefix" API and keeps it
//! consistent through deletes and uploads:
//!
//! - [`path`] translates between flat keys and segment sequences.
//! - [`client`] is the seam to the remote store: a blocking trait, its wire
//!   types, a paginator, and a map-backed in-process implementation.
//! - [`tree`] holds the synthesized node graph, with idempotent population
//!   and empty-directory pruning after deletes.
//! - [`batch`] groups deletions into bounded remote batches and classifies
//!   per-item results.
//! - [`upload`] pre-cleans a namespace and uploads files under an
//!   insert-only credential.
//! - [`fs`] ties it together as [`BucketFs`], with a restore/rehydrate
//!   lifecycle and deferred listing failures.
//!
//! The tree is a derived cache: nothing in it is persisted, and a fresh
//! instance rebuilds it by replaying the listing.

pub mod batch;
pub mod client;
pub mod config;
pub mod error;
pub mod fs;
pub mod logging;
pub mod path;
pub mod tree;
pub mod upload;

pub use client::memory::MemoryObjectStore;
pub use client::ObjectStore;
pub use config::{StorageClass, StoreConfig};
pub use error::{ClientError, Error, Result};
pub use fs::{BucketFs, FileStat};
pub use path::ObjectPath;
pub use upload::UploadPlan;
