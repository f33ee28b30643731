//! The attribution engine: scoped capture, backward pass, fallback.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use tracing::{debug, warn};

use cxr_core::{ImageShape, InspectableModel, LayerKind, TapRegistry};

use crate::attribution::{grad_cam, normalize_to_heatmap, Attribution};
use crate::error::{ExplainError, Result};
use crate::placeholder::radial_placeholder;

/// Compute a Grad-CAM attribution map for one preprocessed image.
///
/// The map's spatial dimensions follow the target layer's activation map,
/// not the input image. When `target_class` is `None` the class with the
/// highest score is attributed.
///
/// Attribution failures (no convolution layer, capture failure, numerical
/// failure) never surface: the engine degrades to the radial placeholder
/// sized to the input tensor's spatial dimensions. The only error this
/// function returns is an out-of-range `target_class`, which is a caller
/// contract violation.
///
/// The forward/backward/capture sequence mutates per-call tap state, so
/// concurrent calls against the same model instance must be serialized by
/// the caller.
pub fn compute_attribution<B, M>(
    model: &M,
    input: Tensor<B, 4>,
    target_class: Option<usize>,
) -> Result<Attribution>
where
    B: AutodiffBackend,
    M: InspectableModel<B>,
{
    let taps = TapRegistry::new();
    compute_with_registry(model, input, target_class, &taps)
}

/// [`compute_attribution`] against a caller-supplied tap registry.
///
/// The engine registers and releases its taps on `taps`; exposing the
/// registry lets tests assert that nothing stays registered after the
/// call, on the success and the fallback path alike.
pub fn compute_with_registry<B, M>(
    model: &M,
    input: Tensor<B, 4>,
    target_class: Option<usize>,
    taps: &TapRegistry<B>,
) -> Result<Attribution>
where
    B: AutodiffBackend,
    M: InspectableModel<B>,
{
    let shape = ImageShape::from_dims(input.dims());
    debug!(input = %shape, "computing attribution");

    match try_grad_cam(model, input, target_class, taps) {
        Ok(map) => Ok(Attribution::GradCam(map)),
        Err(err @ ExplainError::ClassOutOfRange { .. }) => Err(err),
        Err(err) => {
            warn!(error = %err, "attribution failed, using radial placeholder");
            Ok(Attribution::Placeholder(radial_placeholder(
                shape.width,
                shape.height,
            )))
        }
    }
}

fn try_grad_cam<B, M>(
    model: &M,
    input: Tensor<B, 4>,
    target_class: Option<usize>,
    taps: &TapRegistry<B>,
) -> Result<cxr_core::Heatmap>
where
    B: AutodiffBackend,
    M: InspectableModel<B>,
{
    // Target layer: the LAST 2D convolution in execution order.
    let target = model
        .layers()
        .into_iter()
        .filter(|layer| layer.kind == LayerKind::Conv2d)
        .next_back()
        .ok_or(ExplainError::NoConvLayer)?;
    debug!(layer = %target.name, index = target.index, "attributing against layer");

    // Scoped taps; the guards deregister on every exit path below.
    let _forward_tap = taps.tap_forward(target.index);
    let _gradient_tap = taps.tap_gradient(target.index);

    // Burn's autodiff is functional: gradients live in the per-call
    // container returned by backward(), so there is no accumulated
    // parameter gradient state to reset before the forward pass.
    let logits = model.forward_traced(input, taps);
    let [_, n_classes] = logits.dims();

    let class = match target_class {
        Some(index) if index < n_classes => index,
        Some(index) => {
            return Err(ExplainError::ClassOutOfRange { index, n_classes });
        }
        None => {
            let index: i64 = logits.clone().argmax(1).into_scalar().elem();
            index as usize
        }
    };

    // Backward from the single scalar score, not the full vector.
    let score = logits.slice([0..1, class..class + 1]);
    let mut grads = score.backward();

    let activation = taps
        .activation(target.index)
        .ok_or(ExplainError::CaptureMissing("activation"))?;
    let gradient = taps
        .gradient(target.index, &mut grads)
        .ok_or(ExplainError::CaptureMissing("gradient"))?;

    let cam = grad_cam(activation.inner(), gradient);
    normalize_to_heatmap(cam)
}
