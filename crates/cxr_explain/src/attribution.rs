//! Attribution map computation.

use burn::prelude::*;

use cxr_core::Heatmap;

use crate::error::{ExplainError, Result};

/// Result of an attribution call.
///
/// Attribution is best-effort: when the Grad-CAM path fails for any
/// reason, the engine degrades to a deterministic placeholder instead of
/// surfacing an error. The two branches keep the fallback explicit and
/// independently testable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribution {
    /// Gradient-weighted class activation map from the target layer.
    GradCam(Heatmap),
    /// Radial placeholder produced when attribution could not run.
    Placeholder(Heatmap),
}

impl Attribution {
    /// The heatmap, regardless of branch.
    pub fn heatmap(&self) -> &Heatmap {
        match self {
            Self::GradCam(map) | Self::Placeholder(map) => map,
        }
    }

    /// Consume into the heatmap.
    pub fn into_heatmap(self) -> Heatmap {
        match self {
            Self::GradCam(map) | Self::Placeholder(map) => map,
        }
    }

    /// Whether this is the fallback placeholder rather than a real map.
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder(_))
    }
}

/// Compute the raw Grad-CAM map from captured tensors.
///
/// Each feature-map channel is weighted by the spatial mean of its
/// gradient (the channel's overall importance for the target score), the
/// weighted channels are summed, and negative values are rectified away so
/// only positive influence on the target class remains.
///
/// # Arguments
///
/// * `activations` - Target layer output, shape (1, channels, h, w)
/// * `gradients` - Gradient of the target score w.r.t. that output, same shape
///
/// # Returns
///
/// Unnormalized non-negative map of shape (h, w).
pub fn grad_cam<B: Backend>(activations: Tensor<B, 4>, gradients: Tensor<B, 4>) -> Tensor<B, 2> {
    // Global average pool the gradients: (1, c, h, w) -> (1, c, 1, 1)
    let weights = gradients.mean_dim(3).mean_dim(2);

    // Weight the activations and sum across channels: -> (1, 1, h, w)
    let cam = (activations * weights).sum_dim(1);

    // ReLU: keep only positive influence.
    let cam = cam.clamp_min(0.0);

    let [_, _, h, w] = cam.dims();
    cam.reshape([h, w])
}

/// Normalize a rectified map to `[0, 255]` and quantize to a [`Heatmap`].
///
/// The minimum is subtracted first; division by the maximum only happens
/// when the maximum is strictly positive, so a uniformly zero map stays
/// zero rather than producing NaNs. Rectify-then-normalize order matters
/// and is preserved from the technique's definition.
pub fn normalize_to_heatmap<B: Backend>(cam: Tensor<B, 2>) -> Result<Heatmap> {
    let [height, width] = cam.dims();

    let min: f32 = cam.clone().min().into_scalar().elem();
    let cam = cam - min;

    let max: f32 = cam.clone().max().into_scalar().elem();
    let cam = if max > 0.0 { cam / max } else { cam };

    let values: Vec<f32> = cam
        .into_data()
        .to_vec()
        .map_err(|e| ExplainError::Numerical(format!("{e:?}")))?;

    let pixels: Vec<u8> = values.iter().map(|v| (v * 255.0) as u8).collect();
    Ok(Heatmap::new(width, height, pixels)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cxr_core::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_grad_cam_shape() {
        let device = Default::default();
        let activations = Tensor::<TestBackend, 4>::ones([1, 16, 7, 7], &device);
        let gradients = Tensor::<TestBackend, 4>::ones([1, 16, 7, 7], &device);

        let cam = grad_cam(activations, gradients);
        assert_eq!(cam.dims(), [7, 7]);
    }

    #[test]
    fn test_grad_cam_rectifies_negative_influence() {
        let device = Default::default();
        let activations = Tensor::<TestBackend, 4>::ones([1, 4, 3, 3], &device);
        // All-negative gradients give negative channel weights, so the
        // combined map is negative everywhere and rectifies to zero.
        let gradients = Tensor::<TestBackend, 4>::ones([1, 4, 3, 3], &device) * -1.0;

        let cam = grad_cam(activations, gradients);
        let sum: f32 = cam.sum().into_scalar().elem();
        assert_eq!(sum, 0.0);
    }

    #[test]
    fn test_grad_cam_channel_weighting() {
        let device = Default::default();
        // One channel, gradient uniformly 0.5: weight is 0.5 and the map
        // is uniformly activation * 0.5.
        let activations = Tensor::<TestBackend, 4>::ones([1, 1, 7, 7], &device);
        let gradients = Tensor::<TestBackend, 4>::ones([1, 1, 7, 7], &device) * 0.5;

        let cam = grad_cam(activations, gradients);
        let values: Vec<f32> = cam.into_data().to_vec().unwrap();
        assert!(values.iter().all(|v| (v - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_uniform_map_normalizes_to_zero() {
        // A uniform positive map has min == max: subtracting the minimum
        // zeroes it out and the max-guard skips the division, so every
        // pixel quantizes to 0.
        let device = Default::default();
        let activations = Tensor::<TestBackend, 4>::ones([1, 1, 7, 7], &device);
        let gradients = Tensor::<TestBackend, 4>::ones([1, 1, 7, 7], &device) * 0.5;

        let cam = grad_cam(activations, gradients);
        let map = normalize_to_heatmap(cam).unwrap();

        assert_eq!(map.width(), 7);
        assert_eq!(map.height(), 7);
        assert!(map.pixels().iter().all(|&p| p == 0));
    }

    #[test]
    fn test_normalize_zero_map_stays_zero() {
        let device = Default::default();
        let cam = Tensor::<TestBackend, 2>::zeros([5, 5], &device);
        let map = normalize_to_heatmap(cam).unwrap();
        assert!(map.pixels().iter().all(|&p| p == 0));
    }

    #[test]
    fn test_normalize_full_range() {
        let device = Default::default();
        let cam = Tensor::<TestBackend, 1>::from_floats([0.0, 0.25, 0.5, 1.0], &device)
            .reshape([2, 2]);
        let map = normalize_to_heatmap(cam).unwrap();

        assert_eq!(map.get(0, 0), 0);
        assert_eq!(map.get(1, 1), 255);
        // Interior values scale linearly.
        assert_eq!(map.get(1, 0), 63);
        assert_eq!(map.get(0, 1), 127);
    }

    #[test]
    fn test_normalize_shifts_positive_minimum() {
        let device = Default::default();
        let cam = Tensor::<TestBackend, 1>::from_floats([2.0, 4.0], &device).reshape([1, 2]);
        let map = normalize_to_heatmap(cam).unwrap();

        // min-subtract makes the low end 0 even though the raw map is
        // strictly positive everywhere.
        assert_eq!(map.get(0, 0), 0);
        assert_eq!(map.get(1, 0), 255);
    }

    #[test]
    fn test_attribution_accessors() {
        let map = Heatmap::from_fn(2, 2, |_, _| 1);
        let attr = Attribution::GradCam(map.clone());
        assert!(!attr.is_placeholder());
        assert_eq!(attr.heatmap(), &map);

        let fallback = Attribution::Placeholder(map.clone());
        assert!(fallback.is_placeholder());
        assert_eq!(fallback.into_heatmap(), map);
    }
}
