//! Domain types shared across the pipeline

use serde::{Deserialize, Serialize};

use crate::error::{CommonError, Result};

/// A firmographic dataset as it moves from landing storage into the raw zone.
///
/// One dataset maps to exactly one landed object and one raw table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    /// Literal source tag written into every warehouse row (e.g. `fortune500`)
    pub source_name: String,
    /// File name under the landing prefix (e.g. `fortune500_2025.json`)
    pub landing_file: String,
    /// Raw-zone table receiving the bulk copy (e.g. `fortune_500`)
    pub raw_table: String,
}

impl Dataset {
    pub fn new(
        source_name: impl Into<String>,
        landing_file: impl Into<String>,
        raw_table: impl Into<String>,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            landing_file: landing_file.into(),
            raw_table: raw_table.into(),
        }
    }
}

/// Identifier minted by the transformation tool for one invocation.
///
/// This is the only identity that survives a pipeline run; published
/// artifacts are namespaced by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvocationId(String);

impl InvocationId {
    /// Build an id, rejecting empty values and anything that would escape a
    /// storage key segment.
    pub fn parse(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(CommonError::InvalidIdentifier(
                "invocation id is empty".to_string(),
            ));
        }
        if trimmed.contains('/') || trimmed == "." || trimmed == ".." {
            return Err(CommonError::InvalidIdentifier(format!(
                "invocation id '{}' is not a valid key segment",
                trimmed
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InvocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
