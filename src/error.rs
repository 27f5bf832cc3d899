//! Error types for proxima.

use thiserror::Error;

/// Errors that can occur while building, searching, or persisting an index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Dimension mismatch between a query or inserted vector and the index.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Invalid configuration or argument value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Empty corpus where at least one vector is required.
    #[error("index is empty")]
    EmptyIndex,

    /// Attempted to L2-normalize a vector with zero norm.
    #[error("cannot normalize a vector with zero norm")]
    ZeroNorm,

    /// A similarity computation produced NaN or infinity.
    ///
    /// Guarded by a debug assertion at the call site; in release builds the
    /// search surfaces this instead of letting the bad score reorder results.
    #[error("non-finite similarity score for node {node}")]
    NonFiniteScore { node: u32 },

    /// I/O error during on-disk graph operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed on-disk graph (header or size mismatch, bad edge data).
    #[error("corrupt graph file: {0}")]
    Corrupt(String),
}

/// Result type alias for proxima operations.
pub type Result<T> = std::result::Result<T, IndexError>;
