//! # cxr
//!
//! Chest X-ray tuberculosis screening in Rust.
//!
//! cxr-rs classifies chest X-rays as Normal or Tuberculosis and explains
//! every prediction with a Grad-CAM heatmap:
//!
//! - **Core**: heatmap and shape types, layer taps, model traits
//! - **Models**: the TbNet classifier, labels, checkpointing
//! - **Explain**: the Grad-CAM attribution engine with radial fallback
//! - **Imaging**: preprocessing, jet colorization, heatmap compositing
//! - **Server**: the screening HTTP API
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cxr::prelude::*;
//! use cxr::server::ScreenBackend;
//!
//! let device = Default::default();
//! let model = load_tbnet::<ScreenBackend>(&TbNetConfig::new(2), "weights/tbnet", &device)?;
//!
//! let bytes = std::fs::read("scan.png")?;
//! let pre = preprocess_bytes::<ScreenBackend>(&bytes, &PreprocessConfig::default(), &device)?;
//!
//! let prediction = predict(&model, pre.tensor.clone(), &ClassLabels::tb_screening())?;
//! let attribution = compute_attribution(&model, pre.tensor, None)?;
//! save_heatmap(attribution.heatmap(), "heatmap.png", Some(&pre.image), 0.45)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `backend-ndarray` (default): CPU backend using ndarray

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export all crates
pub use cxr_core as core;
pub use cxr_explain as explain;
pub use cxr_imaging as imaging;
pub use cxr_models as models;
pub use cxr_server as server;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use cxr::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use cxr_core::{
        CxrClassificationModel, Heatmap, ImageShape, InspectableModel, LayerDescriptor,
        LayerKind, TapRegistry,
    };

    // Models
    pub use cxr_models::{
        load_tbnet, predict, save_tbnet, ClassLabels, Prediction, TbNet, TbNetConfig,
    };

    // Explain
    pub use cxr_explain::{compute_attribution, radial_placeholder, Attribution};

    // Imaging
    pub use cxr_imaging::{
        colorize, overlay, preprocess_bytes, save_heatmap, PreprocessConfig, Preprocessed,
    };

    // Server
    pub use cxr_server::{Screener, ServerConfig};
}
