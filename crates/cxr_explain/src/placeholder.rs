//! Deterministic placeholder heatmap.

use cxr_core::Heatmap;

/// Radial placeholder map used when attribution cannot be computed.
///
/// Value at each pixel is `clip(1 - sqrt(x^2 + y^2), 0, 1) * 255` where
/// `x` and `y` range linearly over `[-1, 1]` across width and height.
/// The map peaks at 255 in the center and decays to 0 toward the corners,
/// guaranteeing the pipeline always produces some visual artifact.
pub fn radial_placeholder(width: usize, height: usize) -> Heatmap {
    Heatmap::from_fn(width, height, |xi, yi| {
        let x = axis_coord(xi, width);
        let y = axis_coord(yi, height);
        let radius = (x * x + y * y).sqrt();
        let heat = (1.0 - radius).clamp(0.0, 1.0);
        (heat * 255.0) as u8
    })
}

/// Linear coordinate over `[-1, 1]` for index `i` of an axis of length
/// `n`, endpoints inclusive. A one-pixel axis maps to -1.
fn axis_coord(i: usize, n: usize) -> f32 {
    if n <= 1 {
        -1.0
    } else {
        -1.0 + 2.0 * i as f32 / (n - 1) as f32
    }
}
