//! Firmographics Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types and utilities for the firmographics pipeline workspace.
//!
//! # Overview
//!
//! - **Logging**: tracing subscriber setup driven by `LOG_*` environment variables
//! - **Checksums**: sha256 digest recorded for every landed object
//! - **Types**: dataset descriptors and the transformation run identifier
//!
//! # Example
//!
//! ```no_run
//! use firmo_common::logging::{init_logging, LogConfig};
//! use firmo_common::types::Dataset;
//!
//! fn main() -> anyhow::Result<()> {
//!     init_logging(&LogConfig::from_env()?)?;
//!     let dataset = Dataset::new("fortune500", "fortune500_2025.json", "fortune_500");
//!     tracing::info!(source = %dataset.source_name, "configured dataset");
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;
pub mod types;

pub use error::{CommonError, Result};
pub use types::{Dataset, InvocationId};
