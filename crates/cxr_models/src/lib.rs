//! # cxr_models
//!
//! CNN classifier for cxr-rs chest X-ray screening.
//!
//! This crate provides:
//! - [`TbNet`], a convolutional Normal/Tuberculosis classifier
//! - [`ClassLabels`] and [`predict`] for label/confidence output
//! - Checkpoint save/load with a binary-then-named-record fallback

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod checkpoint;
mod error;
mod labels;
mod tbnet;

pub use checkpoint::{load_tbnet, save_tbnet};
pub use error::{ModelError, Result};
pub use labels::{predict, ClassLabels, Prediction};
pub use tbnet::{ConvBlock, TbNet, TbNetConfig};
