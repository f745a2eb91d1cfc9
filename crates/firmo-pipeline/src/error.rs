//! Pipeline error types
//!
//! Every variant is fatal for the task that raised it. The orchestrator
//! records the message and blocks downstream tasks; nothing here is retried.

use thiserror::Error;

use crate::orchestrator::DagError;
use crate::transform::TransformStep;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Remote endpoint answered with a non-success status
    #[error("Fetch of {url} failed with HTTP {status}")]
    Fetch { url: String, status: u16 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// run_results.json has no usable `metadata.invocation_id`
    #[error("Could not find invocation_id in {path}")]
    MissingInvocationId { path: String },

    /// External transformation tool exited non-zero or could not be spawned
    #[error("dbt step '{step}' failed (exit code {code:?}): {stderr}")]
    ToolFailed {
        step: TransformStep,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Warehouse error: {0}")]
    Warehouse(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid task graph: {0}")]
    Dag(#[from] DagError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Common(#[from] firmo_common::CommonError),
}

impl From<regex::Error> for PipelineError {
    fn from(err: regex::Error) -> Self {
        PipelineError::Config(format!("invalid stage pattern: {}", err))
    }
}
