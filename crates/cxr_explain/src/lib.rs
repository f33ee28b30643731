//! # cxr_explain
//!
//! Grad-CAM attribution for cxr-rs chest X-ray classifiers.
//!
//! This crate provides:
//! - The attribution engine: scoped activation/gradient capture on the
//!   model's last convolution layer, single-class backward pass, and the
//!   gradient-weighted channel combination
//! - The two-branch [`Attribution`] result: a real Grad-CAM map, or the
//!   deterministic radial placeholder when attribution is structurally
//!   impossible
//! - Pure building blocks ([`grad_cam`], [`normalize_to_heatmap`],
//!   [`radial_placeholder`]) that are unit-testable without a model

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod attribution;
mod engine;
mod error;
mod placeholder;

pub use attribution::{grad_cam, normalize_to_heatmap, Attribution};
pub use engine::{compute_attribution, compute_with_registry};
pub use error::{ExplainError, Result};
pub use placeholder::radial_placeholder;
