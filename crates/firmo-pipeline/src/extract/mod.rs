//! Source extractors
//!
//! Each extractor fetches one remote dataset and produces a single JSON
//! document, which [`land`] writes to the landing prefix under the dataset's
//! fixed file name. Landing overwrites, so re-running an extractor never
//! leaves more than one object per dataset.

use async_trait::async_trait;
use firmo_common::Dataset;
use reqwest::Client;
use std::time::Duration;
use tracing::{info, instrument};

use crate::error::{PipelineError, Result};
use crate::storage::{landing_key, ObjectStore, UploadResult};

pub mod ranking;
pub mod web_table;

pub use ranking::RankingExtractor;
pub use web_table::{parse_table, WebTableExtractor};

#[async_trait]
pub trait Extractor: Send + Sync {
    /// Dataset this extractor lands
    fn dataset(&self) -> &Dataset;

    /// Fetch the dataset and return the JSON document to land.
    async fn fetch(&self) -> Result<Vec<u8>>;
}

/// Fetch from `extractor` and write the document to `prefix/<landing_file>`.
#[instrument(skip_all, fields(source = %extractor.dataset().source_name))]
pub async fn land(
    extractor: &dyn Extractor,
    store: &dyn ObjectStore,
    prefix: &str,
) -> Result<UploadResult> {
    let document = extractor.fetch().await?;
    let key = landing_key(prefix, &extractor.dataset().landing_file);
    let result = store.put(&key, document, Some("application/json")).await?;

    info!(
        key = %result.key,
        bytes = result.size,
        checksum = %result.checksum,
        "Landed s3://{}/{}",
        store.bucket(),
        result.key
    );

    Ok(result)
}

/// HTTP client shared by the extractors. No timeout unless one is configured.
pub fn http_client(timeout: Option<Duration>) -> Result<Client> {
    let mut builder = Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

/// Turn a non-success status into [`PipelineError::Fetch`].
pub(crate) fn ensure_success(url: &str, response: &reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(PipelineError::Fetch {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}
