//! Warehouse raw-zone loader
//!
//! A [`CopyInto`] is the bulk-copy-from-stage command: every landed object
//! under the stage prefix whose key matches the pattern becomes one row of
//! `(source, ingested_at, payload)` in the target table. Loads only append;
//! running the same copy twice against an unchanged stage yields duplicate
//! rows that differ only in `ingested_at`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use firmo_common::Dataset;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::error::{PipelineError, Result};
use crate::storage::ObjectStore;

pub mod memory;
pub mod postgres;

pub use memory::MemoryWarehouse;
pub use postgres::PgWarehouse;

/// Postgres caps identifiers at 63 bytes.
const MAX_IDENTIFIER_LEN: usize = 63;

/// One raw-zone row: the whole landed document as a single JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    pub source: String,
    pub ingested_at: DateTime<Utc>,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyInto {
    /// Literal written to the `source` column
    pub source_name: String,
    /// Stage location, listed by prefix
    pub stage_prefix: String,
    /// Regex that must match the whole object key
    pub pattern: String,
    pub table: String,
}

impl CopyInto {
    /// Copy command picking up `dataset`'s landing file anywhere under `stage_prefix`.
    pub fn for_dataset(dataset: &Dataset, stage_prefix: impl Into<String>) -> Self {
        Self {
            source_name: dataset.source_name.clone(),
            stage_prefix: stage_prefix.into(),
            pattern: format!(".*{}", regex::escape(&dataset.landing_file)),
            table: dataset.raw_table.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub table: String,
    pub files_loaded: Vec<String>,
    pub rows_appended: u64,
    pub ingested_at: DateTime<Utc>,
}

#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Create the raw table if it does not exist yet.
    async fn ensure_raw_table(&self, table: &str) -> Result<()>;

    /// Append rows, returning how many were written.
    async fn append(&self, table: &str, rows: Vec<RawRow>) -> Result<u64>;
}

/// Executes [`CopyInto`] commands from the landing store into a warehouse.
#[derive(Clone)]
pub struct StageLoader {
    store: Arc<dyn ObjectStore>,
    warehouse: Arc<dyn Warehouse>,
}

impl StageLoader {
    pub fn new(store: Arc<dyn ObjectStore>, warehouse: Arc<dyn Warehouse>) -> Self {
        Self { store, warehouse }
    }

    #[instrument(skip(self), fields(table = %cmd.table, source = %cmd.source_name))]
    pub async fn copy_into(&self, cmd: &CopyInto) -> Result<LoadReport> {
        validate_identifier(&cmd.table)?;
        let pattern = Regex::new(&format!("^(?:{})$", cmd.pattern))?;

        let files: Vec<String> = self
            .store
            .list(&cmd.stage_prefix)
            .await?
            .into_iter()
            .filter(|key| pattern.is_match(key))
            .collect();

        let ingested_at = Utc::now();
        let mut rows = Vec::with_capacity(files.len());
        for key in &files {
            let data = self.store.get(key).await?;
            let payload: Value = serde_json::from_slice(&data).map_err(|e| {
                PipelineError::Warehouse(format!("staged object {} is not JSON: {}", key, e))
            })?;
            rows.push(RawRow {
                source: cmd.source_name.clone(),
                ingested_at,
                payload,
            });
        }

        self.warehouse.ensure_raw_table(&cmd.table).await?;

        let rows_appended = if rows.is_empty() {
            warn!(
                prefix = %cmd.stage_prefix,
                pattern = %cmd.pattern,
                "No staged objects matched; nothing loaded"
            );
            0
        } else {
            self.warehouse.append(&cmd.table, rows).await?
        };

        info!(files = files.len(), rows = rows_appended, "Copy into raw table complete");

        Ok(LoadReport {
            table: cmd.table.clone(),
            files_loaded: files,
            rows_appended,
            ingested_at,
        })
    }
}

/// Accept plain SQL identifiers only, since table and schema names are
/// interpolated into statements.
pub fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let well_formed = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        },
        _ => false,
    };

    if well_formed && name.len() <= MAX_IDENTIFIER_LEN {
        Ok(())
    } else {
        Err(PipelineError::Config(format!("invalid SQL identifier: '{}'", name)))
    }
}
