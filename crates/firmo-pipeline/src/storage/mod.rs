//! Object storage landing zone
//!
//! Landed datasets, dbt artifacts and the docs site all go through
//! [`ObjectStore`]. Writes overwrite: putting a key twice leaves exactly one
//! object, holding the second payload.

use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

use crate::error::Result;

pub mod config;
pub mod memory;
pub mod s3;

pub use config::StorageConfig;
pub use memory::MemoryStore;
pub use s3::S3Storage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub key: String,
    /// Hex sha256 of the uploaded bytes
    pub checksum: String,
    pub size: u64,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Bucket the store writes into (for log lines and `s3://` URIs)
    fn bucket(&self) -> &str;

    /// Put an object, replacing any existing object at `key`.
    async fn put(&self, key: &str, data: Vec<u8>, content_type: Option<&str>)
        -> Result<UploadResult>;

    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// All keys starting with `prefix`, in lexicographic order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Upload a local file verbatim.
    async fn upload_file(&self, path: &Path, key: &str) -> Result<UploadResult> {
        let data = tokio::fs::read(path).await?;
        debug!(path = %path.display(), key, bytes = data.len(), "Uploading local file");
        self.put(key, data, content_type_for(path)).await
    }
}

/// Join a landing prefix and a file name with exactly one separator.
pub fn landing_key(prefix: &str, file: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let file = file.trim_start_matches('/');
    if prefix.is_empty() {
        file.to_string()
    } else {
        format!("{}/{}", prefix, file)
    }
}

/// Content type for the file kinds the pipeline publishes.
pub fn content_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "json" => Some("application/json"),
        "html" => Some("text/html"),
        "css" => Some("text/css"),
        "js" => Some("application/javascript"),
        _ => None,
    }
}
