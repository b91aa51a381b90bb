// ============================================================
// Layer 5 — Discriminator Network
// ============================================================
// Classifies HR patches as real (→ 1) or generated (→ 0).
//
//   conv+LReLU ─ stages × (conv s1 + LReLU, conv s2 + LReLU)
//              ─ global average pool ─ linear+LReLU ─ linear ─ sigmoid
//
// Channels double at every stage; each stage halves the spatial
// size. Global pooling lets any patch size through.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        LeakyRelu, LeakyReluConfig, Linear, LinearConfig, PaddingConfig2d, Sigmoid,
    },
    prelude::*,
};

#[derive(Config, Debug)]
pub struct DiscriminatorConfig {
    #[config(default = 3)]
    pub image_channels: usize,
    #[config(default = 32)]
    pub base_channels: usize,
    #[config(default = 5)]
    pub num_stages: usize,
    #[config(default = 1024)]
    pub hidden: usize,
    #[config(default = 0.2)]
    pub negative_slope: f64,
}

impl DiscriminatorConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Discriminator<B> {
        let in_layer = Conv2dConfig::new([self.image_channels, self.base_channels], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .init(device);

        let mut blocks = Vec::with_capacity(self.num_stages * 2);
        let mut channels = self.base_channels;
        for stage in 0..self.num_stages {
            let out = self.base_channels << stage;
            blocks.push(DiscBlock::new([channels, out], 1, self.negative_slope, device));
            blocks.push(DiscBlock::new([out, out], 2, self.negative_slope, device));
            channels = out;
        }

        Discriminator {
            in_layer,
            blocks,
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc_layer: LinearConfig::new(channels, self.hidden).init(device),
            out_layer: LinearConfig::new(self.hidden, 1).init(device),
            lrelu: LeakyReluConfig::new().with_negative_slope(self.negative_slope).init(),
            sig: Sigmoid::new(),
        }
    }
}

#[derive(Module, Debug)]
pub struct DiscBlock<B: Backend> {
    conv:  Conv2d<B>,
    lrelu: LeakyRelu,
}

impl<B: Backend> DiscBlock<B> {
    pub fn new(channels: [usize; 2], stride: usize, negative_slope: f64, device: &B::Device) -> Self {
        let padding = if stride == 1 {
            PaddingConfig2d::Same
        } else {
            PaddingConfig2d::Explicit(1, 1)
        };
        let conv = Conv2dConfig::new(channels, [3, 3])
            .with_stride([stride, stride])
            .with_padding(padding)
            .init(device);
        let lrelu = LeakyReluConfig::new().with_negative_slope(negative_slope).init();
        Self { conv, lrelu }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.lrelu.forward(self.conv.forward(x))
    }
}

#[derive(Module, Debug)]
pub struct Discriminator<B: Backend> {
    in_layer:  Conv2d<B>,
    blocks:    Vec<DiscBlock<B>>,
    pool:      AdaptiveAvgPool2d,
    fc_layer:  Linear<B>,
    out_layer: Linear<B>,
    lrelu:     LeakyRelu,
    sig:       Sigmoid,
}

impl<B: Backend> Discriminator<B> {
    /// [N, 3, H, W] → probabilities [N, 1]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = self.lrelu.forward(self.in_layer.forward(x));
        for block in &self.blocks {
            x = block.forward(x);
        }

        let [n, c, _, _] = x.dims();
        let x = self.pool.forward(x).reshape([n, c]);
        let x = self.lrelu.forward(self.fc_layer.forward(x));
        self.sig.forward(self.out_layer.forward(x))
    }
}
