//! Error types for customers-choice
//!
//! Only construction, configuration and I/O paths surface these. The
//! assignment hot path (`CustomersChoice::get_variant`) never fails.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// customers-choice error types
#[derive(Error, Debug)]
pub enum Error {
    /// Variant rejected at construction (blank name, empty or non-positive spreading)
    #[error("Invalid variant: {0}")]
    InvalidVariant(String),

    /// Configuration document is malformed or a collaborator is misconfigured
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration document is not valid JSON
    #[error("Configuration parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Weighted selection cannot produce an index
    #[error("Selection failed: {0}\nEvery spreading needs at least one positive weight")]
    Selection(String),

    /// Variant name not present in the registry
    #[error("Unknown variant: {0}")]
    UnknownVariant(String),

    /// Forced bucket outside the variant's spreading
    #[error("Bucket {bucket} out of range for variant {name} (valid: 0..={max})")]
    InvalidBucket {
        /// Variant name
        name: String,
        /// Requested bucket
        bucket: u32,
        /// Highest valid bucket (length of the spreading)
        max: u32,
    },

    /// Configuration source answered with an unusable status
    #[error("Fetch of {source_id} failed with status {status}")]
    Fetch {
        /// Source identifier (URL or path)
        source_id: String,
        /// Status reported by the transport
        status: u16,
    },

    /// Configuration source did not answer in time
    #[error("Fetch of {0} timed out")]
    Timeout(String),

    /// Persistence read/write failure (in-memory state stays authoritative)
    #[error("Storage error: {0}")]
    Storage(String),

    /// No async runtime available for background work
    #[error("Runtime error: {0}\nBuild the engine from within a tokio runtime")]
    Runtime(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
