//! The production task runner
//!
//! Wires configuration into the extractors, loader, dbt runner and publisher,
//! and maps each [`TaskId`] onto one of them.

use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::{TaskId, TaskRunner};
use crate::config::PipelineConfig;
use crate::extract::{http_client, land, Extractor, RankingExtractor, WebTableExtractor};
use crate::publish::ArtifactPublisher;
use crate::storage::{ObjectStore, S3Storage};
use crate::transform::{DbtRunner, TransformStep};
use crate::warehouse::{CopyInto, PgWarehouse, StageLoader, Warehouse};

pub struct Pipeline {
    config: PipelineConfig,
    store: Arc<dyn ObjectStore>,
    ranking: RankingExtractor,
    web_table: WebTableExtractor,
    loader: StageLoader,
    dbt: DbtRunner,
    publisher: ArtifactPublisher,
}

impl Pipeline {
    /// Assemble a pipeline over the given store and warehouse.
    pub fn new(
        config: PipelineConfig,
        store: Arc<dyn ObjectStore>,
        warehouse: Arc<dyn Warehouse>,
    ) -> anyhow::Result<Self> {
        let client =
            http_client(config.sources.http_timeout).context("Failed to build HTTP client")?;

        let ranking = RankingExtractor::new(
            client.clone(),
            &config.sources.ranking.url,
            config.sources.ranking.dataset.clone(),
        );
        let web_table = WebTableExtractor::new(
            client,
            &config.sources.web_table.url,
            &config.sources.web_table.user_agent,
            config.sources.web_table.table_index,
            config.sources.web_table.dataset.clone(),
        );

        Ok(Self {
            loader: StageLoader::new(store.clone(), warehouse),
            dbt: DbtRunner::new(config.transform.clone()),
            publisher: ArtifactPublisher::new(store.clone(), config.publish.clone()),
            ranking,
            web_table,
            store,
            config,
        })
    }

    /// Connect to S3 and Postgres as configured.
    pub async fn from_config(config: PipelineConfig) -> anyhow::Result<Self> {
        let store = S3Storage::new(config.storage.clone())
            .await
            .context("Failed to initialize object storage")?;

        let database_url = config
            .warehouse
            .database_url
            .clone()
            .context("DATABASE_URL must be set")?;
        let warehouse = PgWarehouse::connect_lazy(
            &database_url,
            &config.warehouse.schema,
            config.warehouse.max_connections,
        )
        .context("Failed to configure warehouse pool")?;

        Self::new(config, Arc::new(store), Arc::new(warehouse))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    async fn extract(&self, extractor: &dyn Extractor) -> anyhow::Result<()> {
        land(extractor, self.store.as_ref(), &self.config.landing.prefix)
            .await
            .with_context(|| format!("Failed to land {}", extractor.dataset().landing_file))?;
        Ok(())
    }

    async fn load(&self, extractor: &dyn Extractor) -> anyhow::Result<()> {
        let cmd = CopyInto::for_dataset(extractor.dataset(), &self.config.landing.prefix);
        let report = self
            .loader
            .copy_into(&cmd)
            .await
            .with_context(|| format!("Failed to load {}", cmd.table))?;

        info!(
            table = %report.table,
            files = report.files_loaded.len(),
            rows = report.rows_appended,
            "Raw load finished"
        );
        Ok(())
    }

    async fn transform(&self, step: TransformStep) -> anyhow::Result<()> {
        self.dbt.run_step(step).await?;
        Ok(())
    }

    async fn publish(&self) -> anyhow::Result<()> {
        let report = self
            .publisher
            .publish(&self.config.transform.target_dir)
            .await
            .context("Failed to publish dbt artifacts")?;

        info!(
            invocation_id = %report.invocation_id,
            docs = report.docs.len(),
            "Artifacts available"
        );
        Ok(())
    }
}

#[async_trait]
impl TaskRunner for Pipeline {
    async fn run(&self, task: TaskId) -> anyhow::Result<()> {
        match task {
            TaskId::ExtractFortune => self.extract(&self.ranking).await,
            TaskId::ScrapeSp500 => self.extract(&self.web_table).await,
            TaskId::LoadFortune => self.load(&self.ranking).await,
            TaskId::LoadSp500 => self.load(&self.web_table).await,
            TaskId::DbtRunStage => self.transform(TransformStep::RunStaging).await,
            TaskId::DbtRunCore => self.transform(TransformStep::RunCore).await,
            TaskId::DbtSnapshot => self.transform(TransformStep::Snapshot).await,
            TaskId::DbtRunAnalytics => self.transform(TransformStep::RunAnalytics).await,
            TaskId::DbtTest => self.transform(TransformStep::Test).await,
            TaskId::DbtDocs => self.transform(TransformStep::DocsGenerate).await,
            TaskId::UploadArtifacts => self.publish().await,
        }
    }
}
