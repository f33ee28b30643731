//! Error types for cxr_imaging.

use thiserror::Error;

/// Result type alias using [`ImagingError`].
pub type Result<T> = std::result::Result<T, ImagingError>;

/// Errors that can occur in imaging operations.
#[derive(Error, Debug)]
pub enum ImagingError {
    /// The uploaded bytes could not be decoded as an image.
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// Encoding or other image-library failure.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Filesystem failure while writing output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from a core type.
    #[error(transparent)]
    Core(#[from] cxr_core::CoreError),
}
