//! Upload preprocessing: decode, contrast enhancement, normalization.

use burn::prelude::*;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::{ImagingError, Result};

/// ImageNet channel means, the convention the classifier is trained with.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet channel standard deviations.
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Configuration for upload preprocessing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Side length the model input is resized to.
    pub size: u32,
    /// Whether to equalize the luminance histogram before resizing.
    /// X-ray scans often arrive with compressed contrast.
    pub equalize: bool,
    /// Per-channel normalization means.
    pub mean: [f32; 3],
    /// Per-channel normalization standard deviations.
    pub std: [f32; 3],
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            size: 224,
            equalize: true,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }
}

impl PreprocessConfig {
    /// Set the model input side length.
    #[must_use]
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    /// Enable or disable contrast equalization.
    #[must_use]
    pub fn with_equalize(mut self, equalize: bool) -> Self {
        self.equalize = equalize;
        self
    }
}

/// Result of preprocessing one upload.
#[derive(Debug, Clone)]
pub struct Preprocessed<B: Backend> {
    /// Normalized model input of shape (1, 3, size, size).
    pub tensor: Tensor<B, 4>,
    /// The decoded (and contrast-enhanced) photograph at its original
    /// dimensions, kept for heatmap compositing.
    pub image: RgbImage,
}

/// Decode uploaded bytes and produce the classifier input tensor.
///
/// Steps: decode to RGB, optional luminance histogram equalization,
/// bilinear resize to `size x size`, scale to `[0, 1]` and normalize per
/// channel, lay out as `(1, 3, size, size)`.
pub fn preprocess_bytes<B: Backend>(
    bytes: &[u8],
    config: &PreprocessConfig,
    device: &B::Device,
) -> Result<Preprocessed<B>> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| ImagingError::Decode(e.to_string()))?
        .to_rgb8();

    let image = if config.equalize {
        equalize_contrast(&decoded)
    } else {
        decoded
    };

    let size = config.size;
    let resized = imageops::resize(&image, size, size, FilterType::Triangle);

    let side = size as usize;
    let mut data = Vec::with_capacity(3 * side * side);
    for c in 0..3 {
        for pixel in resized.pixels() {
            let value = pixel.0[c] as f32 / 255.0;
            data.push((value - config.mean[c]) / config.std[c]);
        }
    }

    let tensor =
        Tensor::<B, 1>::from_floats(data.as_slice(), device).reshape([1, 3, side, side]);

    Ok(Preprocessed { tensor, image })
}

/// Equalize the luminance histogram of an RGB image.
///
/// Plays the contrast-enhancement role CLAHE has in OpenCV pipelines:
/// the luminance histogram is equalized and each pixel's channels are
/// scaled by its luminance gain, preserving hue.
pub fn equalize_contrast(img: &RgbImage) -> RgbImage {
    let luma = |p: &Rgb<u8>| {
        (0.299 * p.0[0] as f32 + 0.587 * p.0[1] as f32 + 0.114 * p.0[2] as f32) as usize
    };

    let mut hist = [0u64; 256];
    for pixel in img.pixels() {
        hist[luma(pixel).min(255)] += 1;
    }

    let total: u64 = (img.width() as u64) * (img.height() as u64);
    let mut cdf = [0u64; 256];
    let mut running = 0u64;
    for (bin, &count) in hist.iter().enumerate() {
        running += count;
        cdf[bin] = running;
    }
    let cdf_min = cdf.iter().copied().find(|&c| c > 0).unwrap_or(0);

    // Flat or empty histogram: nothing to equalize.
    if total <= cdf_min {
        return img.clone();
    }

    let mut map = [0u8; 256];
    for bin in 0..256 {
        let scaled = (cdf[bin].saturating_sub(cdf_min)) as f32 / (total - cdf_min) as f32;
        map[bin] = (scaled * 255.0).round() as u8;
    }

    RgbImage::from_fn(img.width(), img.height(), |x, y| {
        let pixel = img.get_pixel(x, y);
        let y_in = luma(pixel).min(255);
        let y_out = map[y_in];
        if y_in == 0 {
            Rgb([y_out, y_out, y_out])
        } else {
            let gain = y_out as f32 / y_in as f32;
            let scale = |c: u8| ((c as f32 * gain).min(255.0)) as u8;
            Rgb([scale(pixel.0[0]), scale(pixel.0[1]), scale(pixel.0[2])])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use std::io::Cursor;

    type TestBackend = NdArray;

    fn png_bytes(img: &RgbImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_tensor_shape() {
        let device = Default::default();
        let img = RgbImage::from_pixel(100, 60, Rgb([120, 120, 120]));
        let config = PreprocessConfig::default().with_size(32);

        let pre = preprocess_bytes::<TestBackend>(&png_bytes(&img), &config, &device).unwrap();
        assert_eq!(pre.tensor.dims(), [1, 3, 32, 32]);
    }

    #[test]
    fn test_original_image_keeps_dimensions() {
        let device = Default::default();
        let img = RgbImage::from_pixel(100, 60, Rgb([120, 120, 120]));
        let config = PreprocessConfig::default().with_size(32);

        let pre = preprocess_bytes::<TestBackend>(&png_bytes(&img), &config, &device).unwrap();
        assert_eq!(pre.image.dimensions(), (100, 60));
    }

    #[test]
    fn test_normalization_white_image() {
        let device = Default::default();
        let img = RgbImage::from_pixel(16, 16, Rgb([255, 255, 255]));
        let config = PreprocessConfig::default().with_size(8).with_equalize(false);

        let pre = preprocess_bytes::<TestBackend>(&png_bytes(&img), &config, &device).unwrap();
        let values: Vec<f32> = pre.tensor.into_data().to_vec().unwrap();

        // Channel-major layout: first 64 values are the red channel.
        let expected_r = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        assert!((values[0] - expected_r).abs() < 1e-5);
        let expected_b = (1.0 - IMAGENET_MEAN[2]) / IMAGENET_STD[2];
        assert!((values[2 * 64] - expected_b).abs() < 1e-5);
    }

    #[test]
    fn test_invalid_bytes_fail_to_decode() {
        let device = Default::default();
        let config = PreprocessConfig::default();
        let result = preprocess_bytes::<TestBackend>(b"not an image", &config, &device);
        assert!(matches!(result, Err(ImagingError::Decode(_))));
    }

    #[test]
    fn test_equalize_expands_compressed_contrast() {
        // Two gray levels squeezed into the middle of the range spread
        // toward the extremes after equalization.
        let img = RgbImage::from_fn(16, 16, |x, _| {
            if x < 8 {
                Rgb([100, 100, 100])
            } else {
                Rgb([140, 140, 140])
            }
        });

        let eq = equalize_contrast(&img);
        let dark = eq.get_pixel(0, 0).0[0];
        let bright = eq.get_pixel(15, 0).0[0];
        assert!(bright as i32 - dark as i32 > 140 - 100);
    }

    #[test]
    fn test_equalize_uniform_image_is_stable() {
        let img = RgbImage::from_pixel(8, 8, Rgb([77, 77, 77]));
        let eq = equalize_contrast(&img);
        assert_eq!(eq.dimensions(), (8, 8));
        // A single-level histogram maps that level to 0 gain or full
        // range; either way all pixels stay equal to each other.
        let first = eq.get_pixel(0, 0);
        assert!(eq.pixels().all(|p| p == first));
    }
}
