//! Model traits for classification and attribution.
//!
//! Defines the capability interfaces the attribution engine works over,
//! so it binds to "ordered layers + tap-aware forward" rather than to one
//! concrete network type.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use crate::inspect::{LayerDescriptor, TapRegistry};

/// Trait for chest X-ray classification models.
pub trait CxrClassificationModel<B: Backend> {
    /// Forward pass returning logits.
    ///
    /// # Arguments
    ///
    /// * `x` - Input tensor of shape (batch, channels, height, width)
    ///
    /// # Returns
    ///
    /// Logits tensor of shape (batch, n_classes)
    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2>;

    /// Forward pass returning probabilities.
    fn forward_probs(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let logits = self.forward(x);
        burn::tensor::activation::softmax(logits, 1)
    }
}

/// Trait for models whose internals can be observed for attribution.
///
/// Implementors expose their layers in execution order and a forward pass
/// that feeds feature-map outputs through a [`TapRegistry`], letting the
/// attribution engine capture one layer's activation and gradient without
/// knowing the architecture.
pub trait InspectableModel<B: AutodiffBackend>: CxrClassificationModel<B> {
    /// Layers in execution order.
    fn layers(&self) -> Vec<LayerDescriptor>;

    /// Forward pass that routes feature-map outputs through `taps`.
    ///
    /// Must produce the same logits as [`CxrClassificationModel::forward`]
    /// when no taps are registered.
    fn forward_traced(&self, x: Tensor<B, 4>, taps: &TapRegistry<B>) -> Tensor<B, 2>;
}
