//! Error types for ransomsync

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Errors raised by the shared domain types
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("Invalid partition year {year}: must be between {min} and {max}")]
    InvalidPartitionYear { year: i32, min: i32, max: i32 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
