//! dbt artifact publisher
//!
//! After the docs have been generated, the run artifacts and the static docs
//! site are copied to storage under the dbt invocation id:
//!
//! - `dbt_artifacts/<invocation_id>/{manifest.json,run_results.json}`
//! - `dbt_docs/<invocation_id>/<relative path>` for every html/json/css/js
//!   file found under the target directory
//!
//! Uploads are not transactional. A failure part-way through the walk leaves
//! whatever was already uploaded in place.

use firmo_common::InvocationId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

use crate::error::{PipelineError, Result};
use crate::storage::{landing_key, ObjectStore, UploadResult};

pub const RUN_RESULTS_FILE: &str = "run_results.json";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Files uploaded under the artifacts prefix
pub const ARTIFACT_FILES: [&str; 2] = [MANIFEST_FILE, RUN_RESULTS_FILE];

/// Extensions that make up the docs site
pub const DOC_EXTENSIONS: [&str; 4] = ["html", "json", "css", "js"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishConfig {
    pub artifacts_prefix: String,
    pub docs_prefix: String,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            artifacts_prefix: "dbt_artifacts/".to_string(),
            docs_prefix: "dbt_docs/".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub invocation_id: InvocationId,
    pub artifacts: Vec<UploadResult>,
    pub docs: Vec<UploadResult>,
}

pub struct ArtifactPublisher {
    store: Arc<dyn ObjectStore>,
    config: PublishConfig,
}

impl ArtifactPublisher {
    pub fn new(store: Arc<dyn ObjectStore>, config: PublishConfig) -> Self {
        Self { store, config }
    }

    #[instrument(skip(self), fields(bucket = %self.store.bucket()))]
    pub async fn publish(&self, target_dir: &Path) -> Result<PublishReport> {
        // Resolve the id before touching storage, so a bad manifest uploads nothing.
        let invocation_id = read_invocation_id(target_dir).await?;
        info!(%invocation_id, "Publishing dbt artifacts");

        let artifact_root = landing_key(&self.config.artifacts_prefix, invocation_id.as_str());
        let mut artifacts = Vec::with_capacity(ARTIFACT_FILES.len());
        for file in ARTIFACT_FILES {
            let key = landing_key(&artifact_root, file);
            let result = self.store.upload_file(&target_dir.join(file), &key).await?;
            info!("Uploaded {} to s3://{}/{}", file, self.store.bucket(), key);
            artifacts.push(result);
        }

        let docs_root = landing_key(&self.config.docs_prefix, invocation_id.as_str());
        let mut docs = Vec::new();
        for relative in doc_files(target_dir).await? {
            let key = landing_key(&docs_root, &to_key_path(&relative));
            let result = self.store.upload_file(&target_dir.join(&relative), &key).await?;
            debug!("Uploaded {} to s3://{}/{}", relative.display(), self.store.bucket(), key);
            docs.push(result);
        }

        info!(
            %invocation_id,
            artifacts = artifacts.len(),
            docs = docs.len(),
            "dbt artifacts published"
        );

        Ok(PublishReport {
            invocation_id,
            artifacts,
            docs,
        })
    }
}

/// Read `metadata.invocation_id` from the run results in `target_dir`.
pub async fn read_invocation_id(target_dir: &Path) -> Result<InvocationId> {
    let path = target_dir.join(RUN_RESULTS_FILE);
    let raw = tokio::fs::read(&path).await?;
    let run_results: Value = serde_json::from_slice(&raw)?;

    let missing = || PipelineError::MissingInvocationId {
        path: path.display().to_string(),
    };

    let id = run_results
        .pointer("/metadata/invocation_id")
        .and_then(Value::as_str)
        .ok_or_else(missing)?;

    InvocationId::parse(id).map_err(|_| missing())
}

/// Docs-site files under `target_dir`, relative to it, in a stable order.
pub async fn doc_files(target_dir: &Path) -> Result<Vec<PathBuf>> {
    let root = target_dir.to_path_buf();
    tokio::task::spawn_blocking(move || walk_doc_files(&root))
        .await
        .map_err(std::io::Error::other)?
}

fn walk_doc_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() || !is_doc_file(entry.path()) {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(root) {
            files.push(relative.to_path_buf());
        }
    }

    Ok(files)
}

fn is_doc_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| DOC_EXTENSIONS.iter().any(|doc| ext.eq_ignore_ascii_case(doc)))
        .unwrap_or(false)
}

fn to_key_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
