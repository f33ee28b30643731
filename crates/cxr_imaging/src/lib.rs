//! # cxr_imaging
//!
//! Imaging support for cxr-rs: heatmap compositing and preprocessing.
//!
//! This crate provides:
//! - The jet pseudo-color palette and heatmap colorization
//! - [`overlay`]: blend a colorized heatmap onto the original photograph
//! - [`save_heatmap`]: write the composite as a PNG, creating parent
//!   directories as needed
//! - [`preprocess_bytes`]: decode an uploaded image into the normalized
//!   `(1, 3, H, W)` tensor the classifier expects

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod colormap;
mod error;
mod overlay;
mod preprocess;
mod save;

pub use colormap::{colorize, jet};
pub use error::{ImagingError, Result};
pub use overlay::{overlay, DEFAULT_ALPHA};
pub use preprocess::{
    equalize_contrast, preprocess_bytes, PreprocessConfig, Preprocessed, IMAGENET_MEAN,
    IMAGENET_STD,
};
pub use save::save_heatmap;
