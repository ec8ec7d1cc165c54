//! Error types for rust_bulk2single

use thiserror::Error;

/// Main error type for bulk-to-single-cell preparation and estimation
#[derive(Error, Debug)]
pub enum Bulk2SingleError {
    #[error("Missing key '{key}' in {context}")]
    MissingKey { key: String, context: String },

    #[error("Insufficient data: {reason}")]
    InsufficientData { reason: String },

    #[error("Insufficient markers: {reason}")]
    InsufficientMarkers { reason: String },

    #[error("Degenerate fit: {reason}")]
    DegenerateFit { reason: String },

    #[error("Optimization failed: {reason}")]
    OptimizationFailed { reason: String },

    #[error("Invalid expression matrix: {reason}")]
    InvalidExpressionMatrix { reason: String },

    #[error("Invalid metadata: {reason}")]
    InvalidMetadata { reason: String },

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: String, got: String },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Empty data: {reason}")]
    EmptyData { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl Bulk2SingleError {
    /// Shorthand for a missing key error
    pub fn missing_key(key: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingKey {
            key: key.into(),
            context: context.into(),
        }
    }
}

/// Result type alias for rust_bulk2single operations
pub type Result<T> = std::result::Result<T, Bulk2SingleError>;
