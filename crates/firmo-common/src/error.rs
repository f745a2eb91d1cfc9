//! Error types shared by workspace crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

#[derive(Error, Debug)]
pub enum CommonError {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
}
