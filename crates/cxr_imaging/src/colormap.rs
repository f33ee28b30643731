//! Jet pseudo-color palette.

use image::RgbImage;

use cxr_core::Heatmap;

/// Map an intensity to the jet palette: blue through green and yellow to
/// red, low to high.
///
/// Uses the standard piecewise-linear jet formula. The endpoints are dark
/// blue at 0 and dark red at 255, matching the conventional ordering.
pub fn jet(value: u8) -> [u8; 3] {
    let x = value as f32 / 255.0;
    let channel = |center: f32| ((1.5 - (4.0 * x - center).abs()).clamp(0.0, 1.0) * 255.0) as u8;
    [channel(3.0), channel(2.0), channel(1.0)]
}

/// Colorize a grayscale heatmap through the jet palette.
pub fn colorize(heatmap: &Heatmap) -> RgbImage {
    RgbImage::from_fn(heatmap.width() as u32, heatmap.height() as u32, |x, y| {
        image::Rgb(jet(heatmap.get(x as usize, y as usize)))
    })
}
