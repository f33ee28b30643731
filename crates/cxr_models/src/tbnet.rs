//! TbNet: convolutional Normal/Tuberculosis chest X-ray classifier.
//!
//! A compact CNN in the spirit of the DenseNet-based screening models:
//! four convolutional blocks with max pooling between them, global average
//! pooling, and a two-layer classification head. The network exposes its
//! layers in execution order and a tap-aware forward pass so the
//! attribution engine can observe its last convolution.

use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{
    AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig,
};
use burn::nn::{BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d, Relu};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

use cxr_core::{CxrClassificationModel, InspectableModel, LayerDescriptor, LayerKind, TapRegistry};

/// Configuration for the TbNet model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TbNetConfig {
    /// Number of input channels (3 for RGB-converted scans).
    pub n_input_channels: usize,
    /// Number of output classes.
    pub n_classes: usize,
    /// Filter counts for the four convolutional blocks.
    pub widths: [usize; 4],
    /// Width of the hidden classification layer.
    pub hidden: usize,
}

impl Default for TbNetConfig {
    fn default() -> Self {
        Self {
            n_input_channels: 3,
            n_classes: 2,
            widths: [32, 64, 128, 256],
            hidden: 256,
        }
    }
}

impl TbNetConfig {
    /// Create a new config for the given number of classes.
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            ..Default::default()
        }
    }

    /// Set the number of input channels.
    #[must_use]
    pub fn with_input_channels(mut self, n_input_channels: usize) -> Self {
        self.n_input_channels = n_input_channels;
        self
    }

    /// Set the filter counts for all four blocks.
    #[must_use]
    pub fn with_widths(mut self, widths: [usize; 4]) -> Self {
        self.widths = widths;
        self
    }

    /// Set the hidden classification layer width.
    #[must_use]
    pub fn with_hidden(mut self, hidden: usize) -> Self {
        self.hidden = hidden;
        self
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> TbNet<B> {
        TbNet::new(self.clone(), device)
    }
}

/// A single convolutional block: Conv2d -> BatchNorm -> ReLU
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    /// Convolutional layer.
    conv: Conv2d<B>,
    /// Batch normalization.
    bn: BatchNorm<B, 2>,
}

impl<B: Backend> ConvBlock<B> {
    /// Create a new convolutional block.
    pub fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .with_bias(false)
            .init(device);

        let bn = BatchNormConfig::new(out_channels).init(device);

        Self { conv, bn }
    }

    /// Forward pass through the block.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = self.conv.forward(x);
        let out = self.normalize(out);
        Relu::new().forward(out)
    }

    /// Batch normalization from the stored running statistics.
    ///
    /// Burn's `BatchNorm::forward` switches to batch statistics and updates
    /// the running values in place whenever autodiff is enabled. The
    /// attribution pass runs on an autodiff backend over a shared model, so
    /// that path would mutate the classifier on every request and let the
    /// traced logits disagree with the reported prediction. The screening
    /// pipeline never trains, so normalization always uses the running
    /// statistics; gradients still flow through the conv output.
    fn normalize(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let channels = x.dims()[1];
        let shape = [1, channels, 1, 1];

        let mean = self.bn.running_mean.value().detach().reshape(shape);
        let var = self.bn.running_var.value().detach().reshape(shape);
        let std = var.add_scalar(self.bn.epsilon).sqrt();

        let out = x.sub(mean).div(std);
        let out = out.mul(self.bn.gamma.val().reshape(shape));
        out.add(self.bn.beta.val().reshape(shape))
    }

    /// Layer descriptors for this block, starting at index `base`.
    fn describe(&self, name: &str, base: usize, out: &mut Vec<LayerDescriptor>) {
        out.push(LayerDescriptor::new(base, format!("{name}.conv"), LayerKind::Conv2d));
        out.push(LayerDescriptor::new(base + 1, format!("{name}.bn"), LayerKind::BatchNorm));
        out.push(LayerDescriptor::new(
            base + 2,
            format!("{name}.relu"),
            LayerKind::Activation,
        ));
    }
}

impl<B: AutodiffBackend> ConvBlock<B> {
    /// Tap-aware forward pass; `base` is the block's first layer index.
    fn forward_traced(&self, x: Tensor<B, 4>, taps: &TapRegistry<B>, base: usize) -> Tensor<B, 4> {
        let out = taps.record(base, self.conv.forward(x));
        let out = taps.record(base + 1, self.normalize(out));
        taps.record(base + 2, Relu::new().forward(out))
    }
}

/// Convolutional Normal/Tuberculosis classifier.
///
/// Architecture:
/// - 4x (Conv2d 3x3 same -> BatchNorm -> ReLU), MaxPool 2x2 between the
///   first three blocks
/// - Global average pooling
/// - Linear(widths\[3\], hidden) -> ReLU -> Linear(hidden, n_classes)
///
/// The original screening head carried a Dropout(0.4) between the linear
/// layers. It is omitted here: dropout holds no parameters (checkpoints
/// are unaffected) and burn applies it whenever autodiff is enabled, which
/// would inject randomness into the gradient-carrying attribution pass.
#[derive(Module, Debug)]
pub struct TbNet<B: Backend> {
    /// First convolutional block.
    block1: ConvBlock<B>,
    /// Second convolutional block.
    block2: ConvBlock<B>,
    /// Third convolutional block.
    block3: ConvBlock<B>,
    /// Fourth convolutional block; its conv is the attribution target.
    block4: ConvBlock<B>,
    /// 2x2 max pooling applied after the first three blocks.
    pool: MaxPool2d,
    /// Global average pooling.
    gap: AdaptiveAvgPool2d,
    /// Hidden classification layer.
    fc1: Linear<B>,
    /// Final classification layer.
    fc2: Linear<B>,
}

// Layer indices in execution order; blocks occupy three slots each.
const BLOCK1: usize = 0;
const POOL1: usize = 3;
const BLOCK2: usize = 4;
const POOL2: usize = 7;
const BLOCK3: usize = 8;
const POOL3: usize = 11;
const BLOCK4: usize = 12;
const GAP: usize = 15;
const FC1: usize = 16;
const HEAD_RELU: usize = 17;
const FC2: usize = 18;

impl<B: Backend> TbNet<B> {
    /// Create a new TbNet model.
    pub fn new(config: TbNetConfig, device: &B::Device) -> Self {
        let [w1, w2, w3, w4] = config.widths;

        Self {
            block1: ConvBlock::new(config.n_input_channels, w1, device),
            block2: ConvBlock::new(w1, w2, device),
            block3: ConvBlock::new(w2, w3, device),
            block4: ConvBlock::new(w3, w4, device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            gap: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc1: LinearConfig::new(w4, config.hidden).init(device),
            fc2: LinearConfig::new(config.hidden, config.n_classes).init(device),
        }
    }

    fn head(&self, features: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch, channels, _, _] = features.dims();
        let out = features.reshape([batch, channels]);
        let out = Relu::new().forward(self.fc1.forward(out));
        self.fc2.forward(out)
    }
}

impl<B: Backend> CxrClassificationModel<B> for TbNet<B> {
    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let out = self.pool.forward(self.block1.forward(x));
        let out = self.pool.forward(self.block2.forward(out));
        let out = self.pool.forward(self.block3.forward(out));
        let out = self.block4.forward(out);
        self.head(self.gap.forward(out))
    }
}

impl<B: AutodiffBackend> InspectableModel<B> for TbNet<B> {
    fn layers(&self) -> Vec<LayerDescriptor> {
        let mut layers = Vec::with_capacity(19);
        self.block1.describe("block1", BLOCK1, &mut layers);
        layers.push(LayerDescriptor::new(POOL1, "pool1", LayerKind::Pool));
        self.block2.describe("block2", BLOCK2, &mut layers);
        layers.push(LayerDescriptor::new(POOL2, "pool2", LayerKind::Pool));
        self.block3.describe("block3", BLOCK3, &mut layers);
        layers.push(LayerDescriptor::new(POOL3, "pool3", LayerKind::Pool));
        self.block4.describe("block4", BLOCK4, &mut layers);
        layers.push(LayerDescriptor::new(GAP, "gap", LayerKind::Pool));
        layers.push(LayerDescriptor::new(FC1, "fc1", LayerKind::Linear));
        layers.push(LayerDescriptor::new(HEAD_RELU, "head.relu", LayerKind::Activation));
        layers.push(LayerDescriptor::new(FC2, "fc2", LayerKind::Linear));
        layers
    }

    fn forward_traced(&self, x: Tensor<B, 4>, taps: &TapRegistry<B>) -> Tensor<B, 2> {
        let out = self.block1.forward_traced(x, taps, BLOCK1);
        let out = taps.record(POOL1, self.pool.forward(out));
        let out = self.block2.forward_traced(out, taps, BLOCK2);
        let out = taps.record(POOL2, self.pool.forward(out));
        let out = self.block3.forward_traced(out, taps, BLOCK3);
        let out = taps.record(POOL3, self.pool.forward(out));
        let out = self.block4.forward_traced(out, taps, BLOCK4);
        let out = taps.record(GAP, self.gap.forward(out));
        self.head(out)
    }
}
