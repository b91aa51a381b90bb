// ============================================================
// Layer 5 — VGG-19 Feature Extractor
// ============================================================
// Fixed feature network for the perceptual and texture losses.
// Only the convolutional trunk is defined (no classifier head):
//
//   block1: conv1_1 conv1_2                 pool   (64 ch)
//   block2: conv2_1 conv2_2                 pool   (128 ch)
//   block3: conv3_1 conv3_2 conv3_3 conv3_4 pool   (256 ch)
//   block4: conv4_1 … conv4_4               pool   (512 ch)
//   block5: conv5_1 … conv5_4               pool   (512 ch)
//
// Pretrained weights are not trained here: they are loaded from a
// burn record (named MessagePack, full precision) converted offline
// from the ImageNet-trained network, and the module is frozen.
// The record layout follows the field names below, e.g.
// `blocks.2.convs.0.weight` for conv3_1.
//
// Inputs are [0, 1] RGB; ImageNet normalisation happens inside.

use anyhow::{Context, Result};
use burn::{
    nn::{
        conv::Conv2d,
        pool::{MaxPool2d, MaxPool2dConfig},
        Relu,
    },
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
};
use std::path::Path;

use crate::data::normalize::Normalizer;
use crate::ml::generator::conv3x3;

/// Activation taps, ordered by depth in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FeatureLayer {
    Relu1_1,
    Relu2_1,
    Pool2,
    Relu3_1,
    Pool5,
}

impl FeatureLayer {
    /// Tap after the ReLU of the first conv of `block`.
    fn first_relu_of(block: usize) -> Option<Self> {
        match block {
            0 => Some(Self::Relu1_1),
            1 => Some(Self::Relu2_1),
            2 => Some(Self::Relu3_1),
            _ => None,
        }
    }

    /// Tap after the max-pool closing `block`.
    fn pool_of(block: usize) -> Option<Self> {
        match block {
            1 => Some(Self::Pool2),
            4 => Some(Self::Pool5),
            _ => None,
        }
    }
}

/// A fixed network producing intermediate activations.
pub trait FeatureExtractor<B: Backend> {
    /// Activations for `layers`, returned in the same order as requested.
    fn extract(&self, x: Tensor<B, 4>, layers: &[FeatureLayer]) -> Vec<Tensor<B, 4>>;
}

const VGG19_BLOCKS: [(usize, usize); 5] = [(64, 2), (128, 2), (256, 4), (512, 4), (512, 4)];

#[derive(Config, Debug)]
pub struct Vgg19Config {
    #[config(default = 3)]
    pub image_channels: usize,
}

impl Vgg19Config {
    /// Randomly initialised trunk; use `load_pretrained` for real features.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Vgg19<B> {
        let mut input = self.image_channels;
        let blocks = VGG19_BLOCKS
            .iter()
            .map(|&(channels, convs)| {
                let block = VggBlock {
                    convs: (0..convs)
                        .map(|i| conv3x3(if i == 0 { input } else { channels }, channels, device))
                        .collect(),
                };
                input = channels;
                block
            })
            .collect();

        Vgg19 {
            blocks,
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            relu: Relu::new(),
        }
    }

    /// Load converted ImageNet weights and freeze them.
    pub fn load_pretrained<B: Backend>(&self, path: &Path, device: &B::Device) -> Result<Vgg19<B>> {
        let vgg = self
            .init::<B>(device)
            .load_file(path.to_path_buf(), &NamedMpkFileRecorder::<FullPrecisionSettings>::new(), device)
            .with_context(|| format!("Cannot load VGG-19 weights from '{}'", path.display()))?;

        tracing::info!("Loaded VGG-19 weights from '{}'", path.display());
        Ok(vgg.no_grad())
    }
}

#[derive(Module, Debug)]
pub struct VggBlock<B: Backend> {
    convs: Vec<Conv2d<B>>,
}

#[derive(Module, Debug)]
pub struct Vgg19<B: Backend> {
    blocks: Vec<VggBlock<B>>,
    pool:   MaxPool2d,
    relu:   Relu,
}

impl<B: Backend> FeatureExtractor<B> for Vgg19<B> {
    fn extract(&self, x: Tensor<B, 4>, layers: &[FeatureLayer]) -> Vec<Tensor<B, 4>> {
        let Some(&deepest) = layers.iter().max() else {
            return Vec::new();
        };

        let mut taps: Vec<(FeatureLayer, Tensor<B, 4>)> = Vec::with_capacity(layers.len());
        let mut x = Normalizer::IMAGENET.normalize_tensor(x);

        'blocks: for (b, block) in self.blocks.iter().enumerate() {
            for (i, conv) in block.convs.iter().enumerate() {
                x = self.relu.forward(conv.forward(x));
                if i == 0 {
                    if let Some(layer) = FeatureLayer::first_relu_of(b) {
                        if layers.contains(&layer) {
                            taps.push((layer, x.clone()));
                        }
                        if layer == deepest {
                            break 'blocks;
                        }
                    }
                }
            }

            x = self.pool.forward(x);
            if let Some(layer) = FeatureLayer::pool_of(b) {
                if layers.contains(&layer) {
                    taps.push((layer, x.clone()));
                }
                if layer == deepest {
                    break;
                }
            }
        }

        layers
            .iter()
            .filter_map(|layer| {
                taps.iter()
                    .find(|(tap, _)| tap == layer)
                    .map(|(_, t)| t.clone())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray;

    #[test]
    fn test_tap_shapes() {
        let device = Default::default();
        let vgg    = Vgg19Config::new().init::<TestBackend>(&device);
        let x      = Tensor::<TestBackend, 4>::random([1, 3, 32, 32], Distribution::Default, &device);

        let maps = vgg.extract(
            x,
            &[FeatureLayer::Pool5, FeatureLayer::Relu1_1, FeatureLayer::Pool2, FeatureLayer::Relu3_1],
        );
        let dims: Vec<[usize; 4]> = maps.iter().map(|m| m.dims()).collect();
        assert_eq!(
            dims,
            vec![[1, 512, 1, 1], [1, 64, 32, 32], [1, 128, 8, 8], [1, 256, 8, 8]]
        );
    }

    #[test]
    fn test_no_layers_requested() {
        let device = Default::default();
        let vgg    = Vgg19Config::new().init::<TestBackend>(&device);
        let x      = Tensor::<TestBackend, 4>::zeros([1, 3, 8, 8], &device);
        assert!(vgg.extract(x, &[]).is_empty());
    }

    #[test]
    fn test_missing_weights_file_is_an_error() {
        let device = Default::default();
        let result = Vgg19Config::new().load_pretrained::<TestBackend>(Path::new("/no/such/vgg19"), &device);
        assert!(result.is_err());
    }
}
