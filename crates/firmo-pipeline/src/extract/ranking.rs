//! Company ranking API extractor

use async_trait::async_trait;
use firmo_common::Dataset;
use reqwest::Client;
use serde::de::IgnoredAny;
use tracing::{debug, instrument};

use super::{ensure_success, Extractor};
use crate::error::{PipelineError, Result};

/// Pulls the ranking list as JSON and lands the response body unchanged.
pub struct RankingExtractor {
    client: Client,
    url: String,
    dataset: Dataset,
}

impl RankingExtractor {
    pub fn new(client: Client, url: impl Into<String>, dataset: Dataset) -> Self {
        Self {
            client,
            url: url.into(),
            dataset,
        }
    }
}

#[async_trait]
impl Extractor for RankingExtractor {
    fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch(&self) -> Result<Vec<u8>> {
        let response = self.client.get(&self.url).send().await?;
        ensure_success(&self.url, &response)?;

        let body = response.bytes().await?;

        // The body must at least be JSON; its shape is not inspected.
        serde_json::from_slice::<IgnoredAny>(&body).map_err(|e| {
            PipelineError::Parse(format!("ranking response from {} is not JSON: {}", self.url, e))
        })?;

        debug!(bytes = body.len(), "Fetched ranking document");

        Ok(body.to_vec())
    }
}
