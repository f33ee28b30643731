//! Heatmap compositing.

use image::imageops::{self, FilterType};
use image::RgbImage;

use cxr_core::Heatmap;

use crate::colormap::colorize;

/// Default blend opacity for the heatmap overlay.
pub const DEFAULT_ALPHA: f32 = 0.4;

/// Composite a heatmap onto the original photograph.
///
/// The heatmap is colorized through the jet palette, resized bilinearly to
/// the ORIGINAL image's dimensions, and blended as
/// `output = original + colored * alpha` with per-channel saturation.
/// Without an original image the colorized map is returned unblended at
/// its own size.
///
/// Pure and deterministic; the output always has the original's
/// dimensions when one is supplied.
pub fn overlay(original: Option<&RgbImage>, heatmap: &Heatmap, alpha: f32) -> RgbImage {
    let colored = colorize(heatmap);

    let Some(original) = original else {
        return colored;
    };

    let (width, height) = original.dimensions();
    let resized = imageops::resize(&colored, width, height, FilterType::Triangle);

    let mut output = original.clone();
    for (out_pixel, heat_pixel) in output.pixels_mut().zip(resized.pixels()) {
        for c in 0..3 {
            let blended = out_pixel.0[c] as f32 + heat_pixel.0[c] as f32 * alpha;
            out_pixel.0[c] = blended.min(255.0) as u8;
        }
    }
    output
}
