//! Single-channel attribution heatmap.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// A single-channel 2D map with values in `0..=255`, row-major.
///
/// This is the artifact produced by the attribution engine and consumed by
/// the compositor. Its spatial dimensions match the target layer's
/// activation map, not necessarily the input image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heatmap {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl Heatmap {
    /// Create a heatmap from raw row-major pixels.
    ///
    /// Fails when the buffer length does not match `width * height`.
    pub fn new(width: usize, height: usize, pixels: Vec<u8>) -> Result<Self> {
        if pixels.len() != width * height {
            return Err(CoreError::ShapeMismatch(format!(
                "heatmap buffer of {} bytes does not match {width}x{height}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Create a heatmap by evaluating `f(x, y)` at every pixel.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> u8) -> Self {
        let mut pixels = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Value at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics when the coordinates are out of bounds.
    pub fn get(&self, x: usize, y: usize) -> u8 {
        assert!(x < self.width && y < self.height, "pixel out of bounds");
        self.pixels[y * self.width + x]
    }

    /// Row-major pixel buffer.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Consume into the row-major pixel buffer.
    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }
}
