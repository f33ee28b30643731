//! Image tensor shape metadata.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Shape metadata for an image tensor `(B, C, H, W)`.
///
/// The screening pipeline processes one image at a time, so the batch
/// dimension is carried for tensor compatibility but is always 1 in
/// practice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageShape {
    /// Batch size.
    pub batch: usize,
    /// Number of color channels.
    pub channels: usize,
    /// Image height in pixels.
    pub height: usize,
    /// Image width in pixels.
    pub width: usize,
}

impl ImageShape {
    /// Create a new shape.
    pub fn new(batch: usize, channels: usize, height: usize, width: usize) -> Self {
        Self {
            batch,
            channels,
            height,
            width,
        }
    }

    /// Shape from a burn dims array `[b, c, h, w]`.
    pub fn from_dims(dims: [usize; 4]) -> Self {
        Self::new(dims[0], dims[1], dims[2], dims[3])
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.batch * self.channels * self.height * self.width
    }

    /// Validate that a flat buffer matches this shape.
    pub fn validate_len(&self, len: usize) -> Result<()> {
        if len == self.numel() {
            Ok(())
        } else {
            Err(CoreError::InvalidShape {
                expected: format!("{} elements for {:?}", self.numel(), self),
                got: format!("{len} elements"),
            })
        }
    }
}

impl std::fmt::Display for ImageShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.batch, self.channels, self.height, self.width
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_numel() {
        let shape = ImageShape::new(1, 3, 224, 224);
        assert_eq!(shape.numel(), 3 * 224 * 224);
    }

    #[test]
    fn test_shape_from_dims() {
        let shape = ImageShape::from_dims([1, 3, 28, 28]);
        assert_eq!(shape.height, 28);
        assert_eq!(shape.width, 28);
    }

    #[test]
    fn test_validate_len() {
        let shape = ImageShape::new(1, 1, 7, 7);
        assert!(shape.validate_len(49).is_ok());
        assert!(shape.validate_len(48).is_err());
    }
}
