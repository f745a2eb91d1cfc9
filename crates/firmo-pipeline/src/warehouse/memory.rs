use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{RawRow, Warehouse};
use crate::error::{PipelineError, Result};

/// Append-only in-process warehouse. Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryWarehouse {
    tables: Arc<RwLock<HashMap<String, Vec<RawRow>>>>,
}

impl MemoryWarehouse {
    pub fn rows(&self, table: &str) -> Vec<RawRow> {
        self.tables
            .read()
            .ok()
            .and_then(|tables| tables.get(table).cloned())
            .unwrap_or_default()
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.tables
            .read()
            .map(|tables| tables.contains_key(table))
            .unwrap_or(false)
    }
}

fn poisoned() -> PipelineError {
    PipelineError::Warehouse("memory warehouse lock poisoned".to_string())
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn ensure_raw_table(&self, table: &str) -> Result<()> {
        self.tables
            .write()
            .map_err(|_| poisoned())?
            .entry(table.to_string())
            .or_default();
        Ok(())
    }

    async fn append(&self, table: &str, rows: Vec<RawRow>) -> Result<u64> {
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        let target = tables
            .get_mut(table)
            .ok_or_else(|| PipelineError::Warehouse(format!("table {} does not exist", table)))?;
        let count = rows.len() as u64;
        target.extend(rows);
        Ok(count)
    }
}
