// ============================================================
// Layer 5 — Generator Network
// ============================================================
// Fully convolutional super-resolution network:
//
//   x ─┬─ conv+ReLU ─ 10 × ResidualBlock ─ s/2 × (nearest ×2, conv+ReLU)
//      │                                   ─ conv+ReLU ─ conv(→3) ─┐
//      └──────────────── bicubic ×s ──────────────────────────── (+) ─ y
//
// The convolutional path only predicts the correction to a plain
// bicubic upsample of the input.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        PaddingConfig2d, Relu,
    },
    prelude::*,
    tensor::{
        module::interpolate,
        ops::{InterpolateMode, InterpolateOptions},
    },
};

#[derive(Config, Debug)]
pub struct GeneratorConfig {
    #[config(default = 3)]
    pub image_channels: usize,
    #[config(default = 64)]
    pub channels: usize,
    #[config(default = 10)]
    pub num_residual_blocks: usize,
    /// Must be a power of two; one ×2 stage per factor of two.
    #[config(default = 4)]
    pub scale_factor: usize,
}

impl GeneratorConfig {
    /// # Panics
    /// Panics if `scale_factor` is not a power of two ≥ 2.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Generator<B> {
        assert!(
            self.scale_factor >= 2 && self.scale_factor.is_power_of_two(),
            "scale factor must be a power of two >= 2, got {}",
            self.scale_factor
        );
        let stages = self.scale_factor.trailing_zeros() as usize;

        Generator {
            entry: conv3x3(self.image_channels, self.channels, device),
            residual_blocks: (0..self.num_residual_blocks)
                .map(|_| ResidualBlock::new(self.channels, device))
                .collect(),
            upsample: (0..stages)
                .map(|_| UpsampleBlock::new(self.channels, device))
                .collect(),
            exit_hidden: conv3x3(self.channels, self.channels, device),
            exit_rgb: conv3x3(self.channels, self.image_channels, device),
            relu: Relu::new(),
            scale_factor: self.scale_factor,
        }
    }
}

pub(crate) fn conv3x3<B: Backend>(input: usize, output: usize, device: &B::Device) -> Conv2d<B> {
    Conv2dConfig::new([input, output], [3, 3])
        .with_padding(PaddingConfig2d::Same)
        .init(device)
}

/// conv → ReLU → conv, plus the block input. No activation after the
/// second convolution.
#[derive(Module, Debug)]
pub struct ResidualBlock<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    relu:  Relu,
}

impl<B: Backend> ResidualBlock<B> {
    pub fn new(channels: usize, device: &B::Device) -> Self {
        Self {
            conv1: conv3x3(channels, channels, device),
            conv2: conv3x3(channels, channels, device),
            relu:  Relu::new(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let y = self.relu.forward(self.conv1.forward(x.clone()));
        x + self.conv2.forward(y)
    }
}

/// Nearest-neighbour ×2 followed by conv → ReLU.
#[derive(Module, Debug)]
pub struct UpsampleBlock<B: Backend> {
    conv: Conv2d<B>,
    relu: Relu,
}

impl<B: Backend> UpsampleBlock<B> {
    pub fn new(channels: usize, device: &B::Device) -> Self {
        Self {
            conv: conv3x3(channels, channels, device),
            relu: Relu::new(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, _, h, w] = x.dims();
        let x = interpolate(x, [h * 2, w * 2], InterpolateOptions::new(InterpolateMode::Nearest));
        self.relu.forward(self.conv.forward(x))
    }
}

/// Bicubic upsample of [N, C, H, W] to [N, C, H·s, W·s], detached.
///
/// The residual baseline, whether computed inside the generator or
/// ahead of time while loading patches.
pub fn bicubic_upsample<B: Backend>(x: Tensor<B, 4>, scale: usize) -> Tensor<B, 4> {
    let [_, _, h, w] = x.dims();
    let size = [h * scale, w * scale];
    interpolate(x.detach(), size, InterpolateOptions::new(InterpolateMode::Bicubic))
}

#[derive(Module, Debug)]
pub struct Generator<B: Backend> {
    entry:           Conv2d<B>,
    residual_blocks: Vec<ResidualBlock<B>>,
    upsample:        Vec<UpsampleBlock<B>>,
    exit_hidden:     Conv2d<B>,
    exit_rgb:        Conv2d<B>,
    relu:            Relu,
    scale_factor:    usize,
}

impl<B: Backend> Generator<B> {
    /// [N, 3, H, W] → [N, 3, H·s, W·s]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.forward_with_baseline(x, None)
    }

    /// Same as `forward`, reusing a precomputed bicubic upsample of `x`
    /// when one is supplied.
    pub fn forward_with_baseline(&self, x: Tensor<B, 4>, baseline: Option<Tensor<B, 4>>) -> Tensor<B, 4> {
        let baseline = match baseline {
            Some(b) => b,
            None => self.bicubic(x.clone()),
        };

        let mut y = self.relu.forward(self.entry.forward(x));
        for block in &self.residual_blocks {
            y = block.forward(y);
        }
        for stage in &self.upsample {
            y = stage.forward(y);
        }
        let y = self.relu.forward(self.exit_hidden.forward(y));
        let y = self.exit_rgb.forward(y);

        y + baseline
    }

    /// Bicubic upsample by the scale factor; never part of the gradient path.
    pub fn bicubic(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        bicubic_upsample(x, self.scale_factor)
    }

    pub fn scale_factor(&self) -> usize {
        self.scale_factor
    }
}
