//! Firmographics Pipeline Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Lands two firmographic datasets in object storage, bulk-loads them into a
//! warehouse raw zone, builds the dbt project on top and publishes the dbt
//! artifacts and docs site.
//!
//! # Overview
//!
//! - **Extract**: company ranking API and a scraped HTML table, landed as JSON
//! - **Storage**: S3-compatible landing bucket (in-memory store for tests)
//! - **Warehouse**: append-only raw tables of `(source, ingested_at, payload)`
//! - **Transform**: dbt invoked phase by phase as an external process
//! - **Publish**: `manifest.json`, `run_results.json` and the docs site,
//!   keyed by the dbt invocation id
//! - **Orchestrator**: a static DAG of eleven tasks each started once its upstreams succeed
//!
//! # Example
//!
//! ```no_run
//! use firmo_pipeline::config::PipelineConfig;
//! use firmo_pipeline::orchestrator::{Dag, Orchestrator, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pipeline = Pipeline::from_config(PipelineConfig::load()?).await?;
//!     let summary = Orchestrator::new().run(&Dag::firmographics(), &pipeline).await?;
//!     assert!(summary.succeeded());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod orchestrator;
pub mod publish;
pub mod storage;
pub mod transform;
pub mod warehouse;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use orchestrator::{Dag, Orchestrator, Pipeline, RunSummary, TaskId, TaskRunner, TaskState};
