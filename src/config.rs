//! Store configuration
//!
//! Everything the filesystem needs to identify and reach its remote
//! namespace. These values are consumed here and passed through to the
//! transport unchanged; no process-global state is ever mutated from an
//! instance. This is also the only state worth persisting: the tree itself
//! is rebuilt from the listing.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Storage tier tag for uploaded objects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageClass {
    #[default]
    Standard,
    InfrequentAccess,
}

/// Configuration for one filesystem instance.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    /// Object-key prefix identifying this instance's namespace.
    #[serde(default)]
    pub object_prefix: String,
    /// Domain serving direct downloads of stored objects.
    #[serde(default)]
    pub download_domain: String,
    #[serde(default = "default_use_https")]
    pub use_https: bool,

    // Per-host endpoint overrides, handed to the transport verbatim.
    #[serde(default)]
    pub up_host: Option<String>,
    #[serde(default)]
    pub rs_host: Option<String>,
    #[serde(default)]
    pub rsf_host: Option<String>,
    #[serde(default)]
    pub uc_host: Option<String>,
    #[serde(default)]
    pub api_host: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Uploads at or above this size may go through the transport's
    /// multipart path.
    #[serde(default = "default_multipart_threshold")]
    pub multipart_threshold: u64,
    #[serde(default)]
    pub storage_class: StorageClass,
}

fn default_use_https() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retries() -> u32 {
    3
}

fn default_multipart_threshold() -> u64 {
    4 * 1024 * 1024
}

impl StoreConfig {
    /// Minimal configuration for a bucket and prefix.
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        bucket: impl Into<String>,
        object_prefix: impl Into<String>,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            bucket: bucket.into(),
            object_prefix: object_prefix.into(),
            download_domain: String::new(),
            use_https: default_use_https(),
            up_host: None,
            rs_host: None,
            rsf_host: None,
            uc_host: None,
            api_host: None,
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
            multipart_threshold: default_multipart_threshold(),
            storage_class: StorageClass::default(),
        }
    }

    /// Load configuration from a file, with `BUCKETFS_*` environment
    /// variables taking precedence.
    pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("BUCKETFS"))
            .build()?
            .try_deserialize()
    }
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("object_prefix", &self.object_prefix)
            .field("download_domain", &self.download_domain)
            .field("use_https", &self.use_https)
            .field("storage_class", &self.storage_class)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_debug_redacts_secret_key() {
        let config = StoreConfig::new("ak", "very-secret", "bucket", "jobs/");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("very-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_defaults_applied_on_deserialize() {
        let config: StoreConfig = serde_json::from_str(
            r#"{"access_key":"ak","secret_key":"sk","bucket":"b"}"#,
        )
        .unwrap();
        assert!(config.use_https);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.retries, 3);
        assert_eq!(config.storage_class, StorageClass::Standard);
        assert_eq!(config.object_prefix, "");
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "access_key = \"ak\"\nsecret_key = \"sk\"\nbucket = \"artifacts\"\nobject_prefix = \"jobs\"\nstorage_class = \"infrequent_access\""
        )
        .unwrap();
        let config = StoreConfig::load(file.path()).unwrap();
        assert_eq!(config.bucket, "artifacts");
        assert_eq!(config.storage_class, StorageClass::InfrequentAccess);
    }
}
