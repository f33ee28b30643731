//! # cxr_core
//!
//! Core types and traits for cxr-rs chest X-ray screening.
//!
//! This crate provides:
//! - [`Heatmap`] for single-channel attribution maps
//! - [`ImageShape`] for image tensor shape metadata
//! - [`CxrClassificationModel`] and [`InspectableModel`] model traits
//! - [`TapRegistry`] for scoped activation/gradient capture
//! - Error types and common utilities
//!
//! ## Shape Convention
//!
//! Image tensors follow the convention `(B, C, H, W)`:
//! - `B`: Batch size (always 1 for the screening pipeline)
//! - `C`: Color channels (3 for RGB chest X-ray scans)
//! - `H`, `W`: Spatial dimensions

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod heatmap;
mod inspect;
mod model_trait;
mod shape;

pub use error::{CoreError, Result};
pub use heatmap::Heatmap;
pub use inspect::{LayerDescriptor, LayerKind, TapHandle, TapRegistry};
pub use model_trait::{CxrClassificationModel, InspectableModel};
pub use shape::ImageShape;

/// Backend type aliases for convenience
pub mod backend {
    #[cfg(feature = "backend-ndarray")]
    pub use burn_ndarray::NdArray;
}
