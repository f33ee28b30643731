//! Class labels and prediction output.

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use cxr_core::CxrClassificationModel;

use crate::error::{ModelError, Result};

/// Ordered class names for a classifier's output vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassLabels {
    names: Vec<String>,
}

impl ClassLabels {
    /// Create labels from ordered names.
    pub fn new(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// The Normal/Tuberculosis screening labels, in model output order.
    pub fn tb_screening() -> Self {
        Self::new(["Normal", "Tuberculosis"])
    }

    /// Number of classes.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether there are no labels.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Name for a class index; falls back to the index itself when the
    /// model produces more classes than there are names.
    pub fn label(&self, index: usize) -> String {
        self.names
            .get(index)
            .cloned()
            .unwrap_or_else(|| index.to_string())
    }
}

/// A classifier's answer for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted class name.
    pub label: String,
    /// Predicted class index.
    pub class_index: usize,
    /// Softmax probability of the predicted class, in `[0, 1]`.
    pub confidence: f32,
}

/// Run the classifier on one preprocessed image and pick the top class.
///
/// # Arguments
///
/// * `model` - The classifier
/// * `input` - Preprocessed tensor of shape (1, channels, height, width)
/// * `labels` - Class names in output order
pub fn predict<B, M>(model: &M, input: Tensor<B, 4>, labels: &ClassLabels) -> Result<Prediction>
where
    B: Backend,
    M: CxrClassificationModel<B>,
{
    let probs = model.forward_probs(input);
    let [_, n_classes] = probs.dims();
    if n_classes == 0 {
        return Err(ModelError::InvalidOutput("empty score vector".into()));
    }

    let class_index: i64 = probs.clone().argmax(1).into_scalar().elem();
    let class_index = class_index as usize;
    let confidence: f32 = probs.max().into_scalar().elem();

    Ok(Prediction {
        label: labels.label(class_index),
        class_index,
        confidence,
    })
}
