//! Heatmap serialization.

use std::fs;
use std::path::Path;

use image::RgbImage;

use cxr_core::Heatmap;

use crate::error::Result;
use crate::overlay::overlay;

/// Write a colored heatmap to `path` as a PNG, overlaying it on the
/// original photograph when one is supplied.
///
/// Missing parent directories are created first. I/O and encoding
/// failures propagate to the caller; unlike attribution, serialization has
/// no graceful fallback.
pub fn save_heatmap(
    heatmap: &Heatmap,
    path: impl AsRef<Path>,
    original: Option<&RgbImage>,
    alpha: f32,
) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let composite = overlay(original, heatmap, alpha);
    composite.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("static").join("heatmaps").join("out.png");

        let map = Heatmap::from_fn(7, 7, |x, _| (x * 36) as u8);
        save_heatmap(&map, &path, None, 0.4).unwrap();

        assert!(path.exists());
        let reloaded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(reloaded.dimensions(), (7, 7));
    }

    #[test]
    fn test_save_composites_over_original() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overlay.png");

        let original = RgbImage::from_pixel(32, 32, Rgb([40, 40, 40]));
        let map = Heatmap::from_fn(8, 8, |_, _| 255);
        save_heatmap(&map, &path, Some(&original), 0.45).unwrap();

        let reloaded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(reloaded.dimensions(), (32, 32));
    }

    #[test]
    fn test_unwritable_path_surfaces_error() {
        let dir = tempfile::tempdir().unwrap();
        // A file where a directory is needed makes create_dir_all fail.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();

        let map = Heatmap::from_fn(4, 4, |_, _| 0);
        let result = save_heatmap(&map, blocker.join("out.png"), None, 0.4);
        assert!(result.is_err());
    }
}
