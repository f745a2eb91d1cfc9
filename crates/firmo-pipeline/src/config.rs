//! Pipeline configuration
//!
//! Every value is read from the environment (after loading `.env` if one is
//! present) and falls back to the defaults of the production deployment.

use firmo_common::Dataset;
use serde::Serialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{PipelineError, Result};
use crate::publish::PublishConfig;
use crate::storage::StorageConfig;
use crate::transform::TransformConfig;
use crate::warehouse::validate_identifier;

/// Default landing prefix inside the bucket
pub const DEFAULT_LANDING_PREFIX: &str = "firmographics/raw/";

pub const DEFAULT_RANKING_URL: &str =
    "https://fortune.com/api/getRankingSearchYear/fortune500/2025/";
pub const DEFAULT_RANKING_FILE: &str = "fortune500_2025.json";

pub const DEFAULT_WEB_TABLE_URL: &str =
    "https://en.wikipedia.org/wiki/List_of_S%26P_500_companies";
pub const DEFAULT_WEB_TABLE_FILE: &str = "sp500.json";
pub const DEFAULT_WEB_TABLE_INDEX: usize = 1;
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0";

pub const DEFAULT_WAREHOUSE_SCHEMA: &str = "raw";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, Serialize)]
pub struct LandingConfig {
    pub prefix: String,
}

impl Default for LandingConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_LANDING_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RankingSource {
    pub url: String,
    pub dataset: Dataset,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebTableSource {
    pub url: String,
    pub user_agent: String,
    /// Position of the table among all `<table>` elements on the page
    pub table_index: usize,
    pub dataset: Dataset,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourcesConfig {
    pub ranking: RankingSource,
    pub web_table: WebTableSource,
    /// Per-request timeout; unset means wait indefinitely
    pub http_timeout: Option<Duration>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            ranking: RankingSource {
                url: DEFAULT_RANKING_URL.to_string(),
                dataset: Dataset::new("fortune500", DEFAULT_RANKING_FILE, "fortune_500"),
            },
            web_table: WebTableSource {
                url: DEFAULT_WEB_TABLE_URL.to_string(),
                user_agent: DEFAULT_USER_AGENT.to_string(),
                table_index: DEFAULT_WEB_TABLE_INDEX,
                dataset: Dataset::new("wikipedia_sp500", DEFAULT_WEB_TABLE_FILE, "wiki_sp500"),
            },
            http_timeout: None,
        }
    }
}

#[derive(Clone, Serialize)]
pub struct WarehouseConfig {
    #[serde(skip_serializing)]
    pub database_url: Option<String>,
    pub schema: String,
    pub max_connections: u32,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            schema: DEFAULT_WAREHOUSE_SCHEMA.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl std::fmt::Debug for WarehouseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarehouseConfig")
            .field("database_url", &self.database_url.as_ref().map(|_| "***"))
            .field("schema", &self.schema)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineConfig {
    pub storage: StorageConfig,
    pub landing: LandingConfig,
    pub sources: SourcesConfig,
    pub warehouse: WarehouseConfig,
    pub transform: TransformConfig,
    pub publish: PublishConfig,
}

impl PipelineConfig {
    /// Load `.env` if present, read the environment and validate.
    pub fn load() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                return Err(PipelineError::Config(format!("failed to read .env: {}", e)));
            }
        }

        let config = Self::from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Build from environment variables without validating.
    pub fn from_env() -> Result<Self> {
        let defaults = SourcesConfig::default();

        let mut ranking = defaults.ranking;
        if let Some(url) = var("FIRMO_RANKING_URL") {
            ranking.url = url;
        }
        if let Some(file) = var("FIRMO_RANKING_FILE") {
            ranking.dataset.landing_file = file;
        }

        let mut web_table = defaults.web_table;
        if let Some(url) = var("FIRMO_WEB_TABLE_URL") {
            web_table.url = url;
        }
        if let Some(file) = var("FIRMO_WEB_TABLE_FILE") {
            web_table.dataset.landing_file = file;
        }
        if let Some(agent) = var("FIRMO_USER_AGENT") {
            web_table.user_agent = agent;
        }
        if let Some(index) = parsed::<usize>("FIRMO_WEB_TABLE_INDEX")? {
            web_table.table_index = index;
        }

        let http_timeout = parsed::<u64>("FIRMO_HTTP_TIMEOUT_SECS")?.map(Duration::from_secs);

        let project_dir = var("DBT_PROJECT_DIR").map(PathBuf::from);
        let mut transform = TransformConfig::default();
        if let Some(dir) = project_dir {
            transform.target_dir = dir.join("target");
            transform.project_dir = dir;
        }
        if let Some(exe) = var("DBT_EXECUTABLE") {
            transform.executable = exe;
        }
        if let Some(dir) = var("DBT_PROFILES_DIR") {
            transform.profiles_dir = PathBuf::from(dir);
        }
        if let Some(dir) = var("DBT_TARGET_DIR") {
            transform.target_dir = PathBuf::from(dir);
        }

        Ok(Self {
            storage: StorageConfig::from_env(),
            landing: LandingConfig {
                prefix: var("FIRMO_LANDING_PREFIX")
                    .unwrap_or_else(|| DEFAULT_LANDING_PREFIX.to_string()),
            },
            sources: SourcesConfig {
                ranking,
                web_table,
                http_timeout,
            },
            warehouse: WarehouseConfig {
                database_url: var("DATABASE_URL"),
                schema: var("FIRMO_WAREHOUSE_SCHEMA")
                    .unwrap_or_else(|| DEFAULT_WAREHOUSE_SCHEMA.to_string()),
                max_connections: parsed("FIRMO_WAREHOUSE_MAX_CONNECTIONS")?
                    .unwrap_or(DEFAULT_MAX_CONNECTIONS),
            },
            transform,
            publish: PublishConfig::default(),
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.storage
            .validate()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        if self.landing.prefix.trim().is_empty() {
            return Err(PipelineError::Config("landing prefix cannot be empty".to_string()));
        }

        for (name, url) in [
            ("ranking", &self.sources.ranking.url),
            ("web table", &self.sources.web_table.url),
        ] {
            if url.trim().is_empty() {
                return Err(PipelineError::Config(format!("{} URL cannot be empty", name)));
            }
        }

        for dataset in self.datasets() {
            if !dataset.landing_file.ends_with(".json") || dataset.landing_file.contains('/') {
                return Err(PipelineError::Config(format!(
                    "landing file '{}' must be a plain .json file name",
                    dataset.landing_file
                )));
            }
            validate_identifier(&dataset.raw_table)?;
        }

        validate_identifier(&self.warehouse.schema)?;
        if self.warehouse.max_connections == 0 {
            return Err(PipelineError::Config(
                "warehouse max connections must be at least 1".to_string(),
            ));
        }

        if self.transform.executable.trim().is_empty() {
            return Err(PipelineError::Config("dbt executable cannot be empty".to_string()));
        }

        Ok(())
    }

    pub fn datasets(&self) -> [&Dataset; 2] {
        [&self.sources.ranking.dataset, &self.sources.web_table.dataset]
    }
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    var(name)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| PipelineError::Config(format!("{}='{}': {}", name, raw, e)))
        })
        .transpose()
}
