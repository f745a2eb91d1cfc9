use async_trait::async_trait;
use firmo_common::checksum::sha256_hex;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use super::{ObjectStore, UploadResult};
use crate::error::{PipelineError, Result};

/// In-process object store with the same overwrite semantics as S3.
///
/// Clones share the same objects.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    bucket: String,
    objects: Arc<RwLock<BTreeMap<String, StoredObject>>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
}

impl MemoryStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Arc::default(),
        }
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().ok()?.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .read()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.objects.read().map(|objects| objects.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> PipelineError {
    PipelineError::Storage("memory store lock poisoned".to_string())
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<UploadResult> {
        let result = UploadResult {
            key: key.to_string(),
            checksum: sha256_hex(&data),
            size: data.len() as u64,
        };
        self.objects.write().map_err(|_| poisoned())?.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.map(str::to_string),
            },
        );
        Ok(result)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.objects
            .read()
            .map_err(|_| poisoned())?
            .get(key)
            .map(|obj| obj.data.clone())
            .ok_or_else(|| PipelineError::Storage(format!("no such key: {}", key)))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .objects
            .read()
            .map_err(|_| poisoned())?
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }
}
