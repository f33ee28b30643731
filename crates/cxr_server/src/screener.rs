//! The screening pipeline behind `/predict`.

use std::path::Path;

use burn::module::AutodiffModule;
use burn::prelude::*;
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use image::RgbImage;
use tracing::info;

use cxr_core::Heatmap;
use cxr_explain::compute_attribution;
use cxr_imaging::{preprocess_bytes, PreprocessConfig};
use cxr_models::{load_tbnet, predict, ClassLabels, Prediction, TbNet, TbNetConfig};

use crate::Result;

/// The backend the service runs on. Attribution needs autodiff; plain
/// prediction runs on the inner backend via `valid()`.
pub type ScreenBackend = Autodiff<NdArray>;

/// Everything `/predict` needs from one screening pass.
#[derive(Debug)]
pub struct ScreenOutcome {
    /// Top class and confidence.
    pub prediction: Prediction,
    /// Attribution map at the conv layer's resolution, or the radial
    /// placeholder sized to the model input.
    pub heatmap: Heatmap,
    /// The decoded upload at its original dimensions, for compositing.
    pub original: RgbImage,
}

/// A loaded classifier plus the preprocessing it expects.
///
/// One screening pass runs a forward, a backward, and tap captures, so
/// calls against a shared instance are serialized by the handler.
pub struct Screener {
    model: TbNet<ScreenBackend>,
    labels: ClassLabels,
    preprocess: PreprocessConfig,
    device: <ScreenBackend as Backend>::Device,
}

impl Screener {
    /// Wrap an existing model.
    pub fn new(model: TbNet<ScreenBackend>, labels: ClassLabels) -> Self {
        Self {
            model,
            labels,
            preprocess: PreprocessConfig::default(),
            device: Default::default(),
        }
    }

    /// A screener with freshly initialized weights. Predictions are
    /// meaningless; useful for wiring and endpoint tests.
    pub fn untrained() -> Self {
        let device = Default::default();
        let model = TbNetConfig::new(2).init::<ScreenBackend>(&device);
        Self::new(model, ClassLabels::tb_screening())
    }

    /// Load a screener from a weights record.
    pub fn from_weights(path: impl AsRef<Path>) -> Result<Self> {
        let device = Default::default();
        let config = TbNetConfig::new(2);
        let model = load_tbnet::<ScreenBackend>(&config, path.as_ref(), &device)?;
        info!(path = %path.as_ref().display(), "screener model loaded");
        Ok(Self::new(model, ClassLabels::tb_screening()))
    }

    /// Override the preprocessing configuration.
    #[must_use]
    pub fn with_preprocess(mut self, preprocess: PreprocessConfig) -> Self {
        self.preprocess = preprocess;
        self
    }

    /// The class labels in model output order.
    pub fn labels(&self) -> &ClassLabels {
        &self.labels
    }

    /// Screen one uploaded image: decode, predict, attribute.
    pub fn screen(&self, bytes: &[u8]) -> Result<ScreenOutcome> {
        self.screen_with_target(bytes, None)
    }

    /// [`Screener::screen`] attributing a specific class instead of the
    /// predicted one.
    pub fn screen_with_target(
        &self,
        bytes: &[u8],
        target_class: Option<usize>,
    ) -> Result<ScreenOutcome> {
        let pre = preprocess_bytes::<ScreenBackend>(bytes, &self.preprocess, &self.device)?;

        // Prediction runs on the inner backend: no autodiff bookkeeping,
        // and normalization layers in inference mode.
        let prediction = predict(&self.model.valid(), pre.tensor.clone().inner(), &self.labels)?;

        let attribution = compute_attribution(&self.model, pre.tensor, target_class)?;
        Ok(ScreenOutcome {
            prediction,
            heatmap: attribution.into_heatmap(),
            original: pre.image,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn small_screener() -> Screener {
        let device = Default::default();
        let config = TbNetConfig::new(2).with_widths([4, 8, 8, 8]).with_hidden(16);
        let model = config.init::<ScreenBackend>(&device);
        Screener::new(model, ClassLabels::tb_screening())
            .with_preprocess(PreprocessConfig::default().with_size(32))
    }

    #[test]
    fn test_screen_produces_prediction_and_heatmap() {
        let screener = small_screener();
        let outcome = screener.screen(&png_bytes(64, 48)).unwrap();

        assert!(outcome.prediction.class_index < 2);
        assert!(outcome.prediction.confidence > 0.0 && outcome.prediction.confidence <= 1.0);
        assert!(outcome.heatmap.width() > 0);
        assert_eq!(outcome.original.dimensions(), (64, 48));
    }

    #[test]
    fn test_screen_is_deterministic() {
        let screener = small_screener();
        let bytes = png_bytes(64, 64);

        // The attribution pass runs forward and backward over the shared
        // model; repeated screenings of the same upload must not drift.
        let first = screener.screen(&bytes).unwrap();
        for _ in 0..2 {
            let repeat = screener.screen(&bytes).unwrap();
            assert_eq!(first.prediction, repeat.prediction);
            assert_eq!(first.heatmap, repeat.heatmap);
        }
    }

    #[test]
    fn test_screen_rejects_target_class_out_of_range() {
        let screener = small_screener();
        let err = screener
            .screen_with_target(&png_bytes(32, 32), Some(9))
            .unwrap_err();
        assert!(matches!(err, crate::ServerError::Explain(_)));
    }

    #[test]
    fn test_screen_rejects_undecodable_bytes() {
        let screener = small_screener();
        let err = screener.screen(b"definitely not a png").unwrap_err();
        assert!(matches!(err, crate::ServerError::Imaging(_)));
    }
}
