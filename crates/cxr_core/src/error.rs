//! Error types for cxr_core.

use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur in cxr_core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid tensor or image shape provided.
    #[error("Invalid shape: expected {expected}, got {got}")]
    InvalidShape {
        /// Expected shape description.
        expected: String,
        /// Actual shape description.
        got: String,
    },

    /// Shape mismatch between tensors or buffers.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Class index outside the model's output range.
    #[error("Class index {index} out of range for {n_classes} classes")]
    ClassOutOfRange {
        /// Requested class index.
        index: usize,
        /// Number of classes the model produces.
        n_classes: usize,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}
