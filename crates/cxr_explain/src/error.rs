//! Error types for cxr_explain.

use thiserror::Error;

/// Result type alias using [`ExplainError`].
pub type Result<T> = std::result::Result<T, ExplainError>;

/// Errors that can occur while computing an attribution map.
///
/// Only [`ExplainError::ClassOutOfRange`] ever reaches the caller of the
/// engine; every other variant is recovered locally by falling back to the
/// radial placeholder map.
#[derive(Error, Debug)]
pub enum ExplainError {
    /// The model contains no 2D convolution layer to attribute against.
    #[error("model has no 2D convolution layer")]
    NoConvLayer,

    /// A tap never captured its tensor (e.g. the forward pass did not
    /// reach the target layer, or the backward pass produced no gradient
    /// for it).
    #[error("tap did not capture {0}")]
    CaptureMissing(&'static str),

    /// The requested target class is outside the model's output range.
    /// This is a caller-contract violation and propagates.
    #[error("target class {index} out of range for {n_classes} classes")]
    ClassOutOfRange {
        /// Requested class index.
        index: usize,
        /// Number of classes the model produces.
        n_classes: usize,
    },

    /// Tensor data could not be read back from the backend.
    #[error("numerical failure: {0}")]
    Numerical(String),

    /// Error from a core type.
    #[error(transparent)]
    Core(#[from] cxr_core::CoreError),
}
