//! Error types for cxr_models.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using [`ModelError`].
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors that can occur in model operations.
#[derive(Error, Debug)]
pub enum ModelError {
    /// No weights file found at the configured path.
    #[error("model weights not found at: {0} (tried .bin and .mpk)")]
    WeightsNotFound(PathBuf),

    /// A checkpoint could not be read or did not match the architecture.
    #[error("failed to load checkpoint: {0}")]
    Load(String),

    /// A checkpoint could not be written.
    #[error("failed to save checkpoint: {0}")]
    Save(String),

    /// The model produced an empty or unusable score vector.
    #[error("invalid model output: {0}")]
    InvalidOutput(String),

    /// Error from a core type.
    #[error(transparent)]
    Core(#[from] cxr_core::CoreError),
}
