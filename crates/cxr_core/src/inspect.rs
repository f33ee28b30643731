//! Layer inspection: descriptors and scoped activation/gradient taps.
//!
//! Burn modules are functional and have no PyTorch-style layer hooks. The
//! [`TapRegistry`] fills that role: a model's tap-aware forward pass feeds
//! each layer output through [`TapRegistry::record`], which re-tracks the
//! tensor (`detach().require_grad()`) whenever a tap is registered on that
//! layer. The re-tracked tensor is both the captured activation and the
//! gradient anchor: after `backward()`, the gradient of the target score
//! with respect to the layer output is read straight off it.
//!
//! Taps are scoped. Registering returns a [`TapHandle`] guard whose `Drop`
//! deregisters the tap, so capture state is released on every exit path,
//! including early returns and panics.

use std::collections::HashMap;
use std::sync::Mutex;

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

/// Kind of a model layer, used for target-layer selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerKind {
    /// 2D spatial convolution.
    Conv2d,
    /// Batch normalization.
    BatchNorm,
    /// Elementwise activation (ReLU and friends).
    Activation,
    /// Spatial pooling.
    Pool,
    /// Fully connected layer.
    Linear,
}

/// A layer's position, name and kind within a model's execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    /// Index in execution order. Taps are addressed by this index.
    pub index: usize,
    /// Human-readable layer name.
    pub name: String,
    /// Layer kind.
    pub kind: LayerKind,
}

impl LayerDescriptor {
    /// Create a new descriptor.
    pub fn new(index: usize, name: impl Into<String>, kind: LayerKind) -> Self {
        Self {
            index,
            name: name.into(),
            kind,
        }
    }
}

/// Which side of a layer a tap observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TapKind {
    Forward,
    Gradient,
}

#[derive(Debug)]
struct TapSlot<B: AutodiffBackend> {
    wants_forward: bool,
    wants_gradient: bool,
    /// Re-tracked layer output, populated by [`TapRegistry::record`].
    activation: Option<Tensor<B, 4>>,
}

impl<B: AutodiffBackend> TapSlot<B> {
    fn empty() -> Self {
        Self {
            wants_forward: false,
            wants_gradient: false,
            activation: None,
        }
    }

    fn wanted(&self) -> bool {
        self.wants_forward || self.wants_gradient
    }
}

/// Registry of scoped taps, keyed by layer index.
///
/// One registry serves one attribution call. The captured state is
/// per-call and mutable, which is why concurrent attribution against a
/// shared classifier must be serialized by the caller.
#[derive(Debug)]
pub struct TapRegistry<B: AutodiffBackend> {
    slots: Mutex<HashMap<usize, TapSlot<B>>>,
}

impl<B: AutodiffBackend> TapRegistry<B> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn with_slots<R>(&self, f: impl FnOnce(&mut HashMap<usize, TapSlot<B>>) -> R) -> R {
        // A poisoned lock only means another tap call panicked; the map
        // itself is still valid.
        let mut guard = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut guard)
    }

    /// Register a forward-output tap on `layer`.
    pub fn tap_forward(&self, layer: usize) -> TapHandle<'_, B> {
        self.register(layer, TapKind::Forward)
    }

    /// Register an incoming-gradient tap on `layer`.
    pub fn tap_gradient(&self, layer: usize) -> TapHandle<'_, B> {
        self.register(layer, TapKind::Gradient)
    }

    fn register(&self, layer: usize, kind: TapKind) -> TapHandle<'_, B> {
        self.with_slots(|slots| {
            let slot = slots.entry(layer).or_insert_with(TapSlot::empty);
            match kind {
                TapKind::Forward => slot.wants_forward = true,
                TapKind::Gradient => slot.wants_gradient = true,
            }
        });
        TapHandle {
            registry: self,
            layer,
            kind,
        }
    }

    fn deregister(&self, layer: usize, kind: TapKind) {
        self.with_slots(|slots| {
            if let Some(slot) = slots.get_mut(&layer) {
                match kind {
                    TapKind::Forward => slot.wants_forward = false,
                    TapKind::Gradient => slot.wants_gradient = false,
                }
                if !slot.wanted() {
                    slots.remove(&layer);
                }
            }
        });
    }

    /// Feed a layer output through the registry.
    ///
    /// Models call this from their tap-aware forward pass. When a tap is
    /// registered on `layer`, the output is re-tracked so its gradient can
    /// be extracted after the backward pass, and the re-tracked tensor is
    /// returned to continue the forward pass. Otherwise the output passes
    /// through untouched.
    pub fn record(&self, layer: usize, output: Tensor<B, 4>) -> Tensor<B, 4> {
        self.with_slots(|slots| match slots.get_mut(&layer) {
            Some(slot) => {
                let tracked = output.detach().require_grad();
                slot.activation = Some(tracked.clone());
                tracked
            }
            None => output,
        })
    }

    /// Captured activation for `layer`, if the forward pass reached it.
    pub fn activation(&self, layer: usize) -> Option<Tensor<B, 4>> {
        self.with_slots(|slots| slots.get(&layer).and_then(|s| s.activation.clone()))
    }

    /// Gradient of the backward root with respect to `layer`'s output.
    ///
    /// Only meaningful after `backward()` has produced `grads`.
    pub fn gradient(
        &self,
        layer: usize,
        grads: &mut <B as AutodiffBackend>::Gradients,
    ) -> Option<Tensor<B::InnerBackend, 4>> {
        self.activation(layer).and_then(|act| act.grad_remove(grads))
    }

    /// Number of layers with at least one registered tap.
    pub fn active_taps(&self) -> usize {
        self.with_slots(|slots| slots.len())
    }
}

impl<B: AutodiffBackend> Default for TapRegistry<B> {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped deregistration guard for a single tap.
///
/// Dropping the handle removes the tap and, once a layer has no taps left,
/// its captured activation.
#[derive(Debug)]
pub struct TapHandle<'a, B: AutodiffBackend> {
    registry: &'a TapRegistry<B>,
    layer: usize,
    kind: TapKind,
}

impl<B: AutodiffBackend> TapHandle<'_, B> {
    /// Layer index this tap observes.
    pub fn layer(&self) -> usize {
        self.layer
    }
}

impl<B: AutodiffBackend> Drop for TapHandle<'_, B> {
    fn drop(&mut self) {
        self.registry.deregister(self.layer, self.kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_autodiff::Autodiff;
    use burn_ndarray::NdArray;

    type TestBackend = Autodiff<NdArray>;

    #[test]
    fn test_register_and_drop() {
        let registry: TapRegistry<TestBackend> = TapRegistry::new();
        {
            let _fwd = registry.tap_forward(3);
            let _bwd = registry.tap_gradient(3);
            assert_eq!(registry.active_taps(), 1);
        }
        assert_eq!(registry.active_taps(), 0);
    }

    #[test]
    fn test_guards_release_on_early_exit() {
        let registry: TapRegistry<TestBackend> = TapRegistry::new();
        let failing = || -> Result<(), ()> {
            let _fwd = registry.tap_forward(0);
            let _bwd = registry.tap_gradient(0);
            Err(())
        };
        assert!(failing().is_err());
        assert_eq!(registry.active_taps(), 0);
    }

    #[test]
    fn test_record_passthrough_without_tap() {
        let device = Default::default();
        let registry: TapRegistry<TestBackend> = TapRegistry::new();
        let x = Tensor::<TestBackend, 4>::ones([1, 2, 4, 4], &device);
        let out = registry.record(7, x);
        assert_eq!(out.dims(), [1, 2, 4, 4]);
        assert!(registry.activation(7).is_none());
    }

    #[test]
    fn test_record_captures_activation() {
        let device = Default::default();
        let registry: TapRegistry<TestBackend> = TapRegistry::new();
        let _fwd = registry.tap_forward(0);

        let x = Tensor::<TestBackend, 4>::ones([1, 2, 4, 4], &device);
        let _ = registry.record(0, x);

        let captured = registry.activation(0).expect("activation captured");
        assert_eq!(captured.dims(), [1, 2, 4, 4]);
    }

    #[test]
    fn test_gradient_through_recorded_tensor() {
        let device = Default::default();
        let registry: TapRegistry<TestBackend> = TapRegistry::new();
        let _fwd = registry.tap_forward(0);
        let _bwd = registry.tap_gradient(0);

        let x = Tensor::<TestBackend, 4>::ones([1, 1, 2, 2], &device);
        let tracked = registry.record(0, x);

        // Scalar score: 3 * sum(x); gradient should be uniformly 3.
        let score = tracked.mul_scalar(3.0).sum();
        let mut grads = score.backward();

        let grad = registry.gradient(0, &mut grads).expect("gradient captured");
        let values: Vec<f32> = grad.into_data().to_vec().unwrap();
        assert!(values.iter().all(|v| (v - 3.0).abs() < 1e-6));
    }
}
