use serde::{Deserialize, Serialize};
use std::env;

/// Default landing bucket
pub const DEFAULT_BUCKET: &str = "firmographics-landing-2025";

/// Default AWS region
pub const DEFAULT_REGION: &str = "us-east-1";

#[derive(Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Custom endpoint (MinIO, localstack); `None` means AWS
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    /// Static credentials; when absent the default AWS provider chain is used
    pub access_key: Option<String>,
    #[serde(skip_serializing)]
    pub secret_key: Option<String>,
    pub path_style: bool,
}

impl StorageConfig {
    /// Read `S3_*` variables; blank values count as unset.
    pub fn from_env() -> Self {
        Self {
            endpoint: var("S3_ENDPOINT"),
            region: var("S3_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            bucket: var("FIRMO_BUCKET")
                .or_else(|| var("S3_BUCKET"))
                .unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            access_key: var("S3_ACCESS_KEY").or_else(|| var("AWS_ACCESS_KEY_ID")),
            secret_key: var("S3_SECRET_KEY").or_else(|| var("AWS_SECRET_ACCESS_KEY")),
            path_style: var("S3_PATH_STYLE")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(false),
        }
    }

    pub fn for_minio(endpoint: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            region: DEFAULT_REGION.to_string(),
            bucket: bucket.into(),
            access_key: Some("minioadmin".to_string()),
            secret_key: Some("minioadmin".to_string()),
            path_style: true,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bucket.trim().is_empty() {
            anyhow::bail!("Storage bucket cannot be empty");
        }
        if self.access_key.is_some() != self.secret_key.is_some() {
            anyhow::bail!("S3 access key and secret key must be set together");
        }
        Ok(())
    }
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: DEFAULT_REGION.to_string(),
            bucket: DEFAULT_BUCKET.to_string(),
            access_key: None,
            secret_key: None,
            path_style: false,
        }
    }
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "***"))
            .field("path_style", &self.path_style)
            .finish()
    }
}
