// ============================================================
// Layer 5 — Loss Terms
// ============================================================
// Everything the generator is optimised against, except the
// discriminator-driven term (see adversarial.rs):
//
//   pixel       MSE(G, T)
//   perceptual  0.2 · MSE(pool2) + 0.02 · MSE(pool5)
//   texture     weighted MSE between gram matrices of relu1_1,
//               relu2_1, relu3_1 computed on p×p tiles
//
// Feature maps of the target are always detached: the target is
// data, not something to optimise.

use anyhow::{ensure, Result};
use burn::{
    nn::loss::{MseLoss, Reduction},
    prelude::*,
};

use crate::data::normalize::Normalizer;
use crate::ml::vgg::{FeatureExtractor, FeatureLayer};

pub const PERCEPTUAL_LAYERS: [(FeatureLayer, f32); 2] =
    [(FeatureLayer::Pool2, 0.2), (FeatureLayer::Pool5, 0.02)];

pub const TEXTURE_LAYERS: [(FeatureLayer, f32); 3] = [
    (FeatureLayer::Relu1_1, 3e-7),
    (FeatureLayer::Relu2_1, 1e-6),
    (FeatureLayer::Relu3_1, 1e-6),
];

pub const DEFAULT_TEXTURE_PATCH: usize = 16;

const BCE_EPS: f32 = 1e-7;

pub fn pixel_loss<B: Backend>(generated: Tensor<B, 4>, target: Tensor<B, 4>) -> Tensor<B, 1> {
    MseLoss::new().forward(generated, target, Reduction::Mean)
}

/// Weighted sum of feature-map MSEs over `layers`.
fn feature_distance<B: Backend, F: FeatureExtractor<B>>(
    features:  &F,
    generated: Tensor<B, 4>,
    target:    Tensor<B, 4>,
    layers:    &[(FeatureLayer, f32)],
    map:       impl Fn(Tensor<B, 4>) -> Tensor<B, 4>,
) -> Tensor<B, 1> {
    let device = generated.device();
    let taps: Vec<FeatureLayer> = layers.iter().map(|(layer, _)| *layer).collect();

    let gen_maps = features.extract(generated, &taps);
    let tgt_maps = features.extract(target.detach(), &taps);

    gen_maps
        .into_iter()
        .zip(tgt_maps)
        .zip(layers.iter())
        .fold(Tensor::zeros([1], &device), |acc, ((g, t), (_, weight))| {
            let term = MseLoss::new().forward(map(g), map(t).detach(), Reduction::Mean);
            acc + term * *weight
        })
}

/// `0.2 · MSE(φ_pool2) + 0.02 · MSE(φ_pool5)` on [0, 1] images.
pub fn perceptual_loss<B: Backend, F: FeatureExtractor<B>>(
    features:  &F,
    generated: Tensor<B, 4>,
    target:    Tensor<B, 4>,
) -> Tensor<B, 1> {
    feature_distance(features, generated, target, &PERCEPTUAL_LAYERS, |t| t)
}

/// Texture loss on [0, 1] images, tiled into `patch × patch` crops.
pub fn texture_loss<B: Backend, F: FeatureExtractor<B>>(
    features:  &F,
    generated: Tensor<B, 4>,
    target:    Tensor<B, 4>,
    patch:     usize,
) -> Tensor<B, 1> {
    let generated = patchify(generated, patch);
    let target    = patchify(target, patch);

    // gram matrices are [N, C, C]; lift to rank 4 for the shared helper
    feature_distance(features, generated, target, &TEXTURE_LAYERS, |t| {
        gram_matrix(t).unsqueeze_dim::<4>(1)
    })
}

/// `F·Fᵀ / (C·H·W)` per image, where F is the [C, H·W] feature matrix.
pub fn gram_matrix<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 3> {
    let [n, c, h, w] = x.dims();
    let f = x.reshape([n, c, h * w]);
    f.clone().matmul(f.swap_dims(1, 2)) / (c * h * w) as f32
}

/// Split [N, C, H, W] into non-overlapping tiles [N·(H/p)·(W/p), C, p, p].
///
/// Tiles of one image are contiguous and in row-major order. Trailing
/// rows/columns that do not fill a whole tile are dropped.
///
/// # Panics
/// Panics if `patch` is zero or larger than either spatial side.
pub fn patchify<B: Backend>(images: Tensor<B, 4>, patch: usize) -> Tensor<B, 4> {
    let [n, c, h, w] = images.dims();
    assert!(patch > 0 && patch <= h && patch <= w, "patch {patch} does not fit {h}x{w}");

    let (gh, gw) = (h / patch, w / patch);
    images
        .slice([0..n, 0..c, 0..gh * patch, 0..gw * patch])
        .reshape([n, c, gh, patch, gw, patch])
        .permute([0, 2, 4, 1, 3, 5])
        .reshape([n * gh * gw, c, patch, patch])
}

/// Mean binary cross-entropy of probabilities against a constant label.
pub fn binary_cross_entropy<B: Backend>(probs: Tensor<B, 2>, label: f32) -> Tensor<B, 1> {
    let p = probs.clamp(BCE_EPS, 1.0 - BCE_EPS);
    let loss = (p.clone().log() * label + (p.neg() + 1.0).log() * (1.0 - label)).neg();
    loss.mean()
}

// ─── Loss Composer ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct LossWeights {
    pub pixel:         f32,
    pub perceptual:    bool,
    pub texture:       bool,
    pub texture_patch: usize,
    pub adversarial:   f32,
}

/// Per-batch loss: the differentiable total plus scalar terms for logging.
pub struct LossBreakdown<B: Backend> {
    pub total:       Tensor<B, 1>,
    pub pixel:       f64,
    pub perceptual:  f64,
    pub texture:     f64,
    pub adversarial: f64,
}

pub struct LossComposer<B: Backend, F: FeatureExtractor<B>> {
    weights:    LossWeights,
    normalizer: Normalizer,
    features:   Option<F>,
    _backend:   std::marker::PhantomData<B>,
}

impl<B: Backend, F: FeatureExtractor<B>> LossComposer<B, F> {
    pub fn new(weights: LossWeights, normalizer: Normalizer, features: Option<F>) -> Result<Self> {
        ensure!(
            features.is_some() || !(weights.perceptual || weights.texture),
            "Perceptual and texture losses need a feature network (--vgg-weights)"
        );
        ensure!(weights.texture_patch > 0, "Texture patch size must be positive");
        Ok(Self { weights, normalizer, features, _backend: std::marker::PhantomData })
    }

    /// Sum the enabled terms. `generated` and `target` are in the
    /// dataset's normalised space; `adversarial` is the generator-side
    /// loss from the discriminator, if any.
    pub fn compose(
        &self,
        generated:   Tensor<B, 4>,
        target:      Tensor<B, 4>,
        adversarial: Option<Tensor<B, 1>>,
    ) -> LossBreakdown<B> {
        let pixel = pixel_loss(generated.clone(), target.clone());
        let pixel_value = scalar(&pixel);
        let mut total = pixel * self.weights.pixel;

        let mut perceptual_value = 0.0;
        let mut texture_value    = 0.0;

        if let Some(features) = &self.features {
            let generated = self.normalizer.denormalize_tensor(generated);
            let target    = self.normalizer.denormalize_tensor(target);

            if self.weights.perceptual {
                let term = perceptual_loss(features, generated.clone(), target.clone());
                perceptual_value = scalar(&term);
                total = total + term;
            }
            if self.weights.texture {
                let term = texture_loss(features, generated, target, self.weights.texture_patch);
                texture_value = scalar(&term);
                total = total + term;
            }
        }

        let mut adversarial_value = 0.0;
        if let Some(term) = adversarial {
            adversarial_value = scalar(&term);
            total = total + term * self.weights.adversarial;
        }

        LossBreakdown {
            total,
            pixel:       pixel_value,
            perceptual:  perceptual_value,
            texture:     texture_value,
            adversarial: adversarial_value,
        }
    }
}

pub(crate) fn scalar<B: Backend>(t: &Tensor<B, 1>) -> f64 {
    t.clone().into_scalar().elem::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::vgg::{Vgg19, Vgg19Config};
    use burn::backend::NdArray;
    use burn::tensor::{Distribution, TensorData};

    type TestBackend = NdArray;

    fn values<const D: usize>(t: Tensor<TestBackend, D>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    fn vgg() -> Vgg19<TestBackend> {
        Vgg19Config::new().init(&Default::default())
    }

    #[test]
    fn test_gram_matrix() {
        let device = Default::default();
        // two channels, one row of two pixels: F = [[1, 2], [3, 4]]
        let x = Tensor::<TestBackend, 4>::from_data(
            TensorData::new(vec![1.0f32, 2.0, 3.0, 4.0], [1, 2, 1, 2]),
            &device,
        );
        let g = gram_matrix(x);
        assert_eq!(g.dims(), [1, 2, 2]);
        assert_eq!(values(g), vec![5.0 / 4.0, 11.0 / 4.0, 11.0 / 4.0, 25.0 / 4.0]);
    }

    #[test]
    fn test_patchify_row_major() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::from_data(
            TensorData::new((0..16).map(|v| v as f32).collect::<Vec<_>>(), [1, 1, 4, 4]),
            &device,
        );

        let tiles = patchify(x, 2);
        assert_eq!(tiles.dims(), [4, 1, 2, 2]);
        assert_eq!(
            values(tiles),
            vec![
                0.0, 1.0, 4.0, 5.0,
                2.0, 3.0, 6.0, 7.0,
                8.0, 9.0, 12.0, 13.0,
                10.0, 11.0, 14.0, 15.0,
            ]
        );
    }

    #[test]
    fn test_patchify_drops_partial_tiles() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::zeros([2, 3, 5, 7], &device);
        assert_eq!(patchify(x, 2).dims(), [2 * 2 * 3, 3, 2, 2]);
    }

    #[test]
    #[should_panic]
    fn test_patchify_rejects_oversized_patch() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::zeros([1, 3, 8, 8], &device);
        let _ = patchify(x, 16);
    }

    #[test]
    fn test_pixel_loss() {
        let device = Default::default();
        let a = Tensor::<TestBackend, 4>::zeros([1, 3, 4, 4], &device);
        let b = Tensor::<TestBackend, 4>::ones([1, 3, 4, 4], &device);
        assert!((scalar(&pixel_loss(a, b)) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_texture_loss_zero_for_identical_images() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::random([1, 3, 32, 32], Distribution::Default, &device);
        let loss = texture_loss(&vgg(), x.clone(), x, DEFAULT_TEXTURE_PATCH);
        assert_eq!(scalar(&loss), 0.0);
    }

    #[test]
    fn test_perceptual_loss_zero_for_identical_images() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::random([1, 3, 32, 32], Distribution::Default, &device);
        let loss = perceptual_loss(&vgg(), x.clone(), x);
        assert_eq!(scalar(&loss), 0.0);
    }

    /// Returns the input scaled by a distinct factor per layer.
    struct ScaledTaps;

    impl ScaledTaps {
        fn factor(layer: FeatureLayer) -> f32 {
            match layer {
                FeatureLayer::Relu1_1 => 1.0,
                FeatureLayer::Relu2_1 => 2.0,
                FeatureLayer::Pool2   => 3.0,
                FeatureLayer::Relu3_1 => 4.0,
                FeatureLayer::Pool5   => 5.0,
            }
        }
    }

    impl FeatureExtractor<TestBackend> for ScaledTaps {
        fn extract(&self, x: Tensor<TestBackend, 4>, layers: &[FeatureLayer]) -> Vec<Tensor<TestBackend, 4>> {
            layers.iter().map(|l| x.clone() * Self::factor(*l)).collect()
        }
    }

    #[test]
    fn test_perceptual_weights_hit_pool2_and_pool5() {
        let device = Default::default();
        let generated = Tensor::<TestBackend, 4>::zeros([1, 3, 4, 4], &device);
        let target    = Tensor::<TestBackend, 4>::ones([1, 3, 4, 4], &device);

        // MSE per tap is factor², so 0.2 * 3² + 0.02 * 5²
        let loss = scalar(&perceptual_loss(&ScaledTaps, generated, target));
        assert!((loss - 2.3).abs() < 1e-5, "got {loss}");
    }

    #[test]
    fn test_texture_weights_hit_relu_layers() {
        let device = Default::default();
        let generated = Tensor::<TestBackend, 4>::zeros([1, 3, 4, 4], &device);
        let target    = Tensor::<TestBackend, 4>::ones([1, 3, 4, 4], &device);

        // one 4x4 tile; gram of k·1 is k²/3 everywhere, so MSE is k⁴/9
        let expected = (3e-7 * 1.0 + 1e-6 * 16.0 + 1e-6 * 256.0) / 9.0;
        let loss = scalar(&texture_loss(&ScaledTaps, generated, target, 4));
        assert!(((loss - expected) / expected).abs() < 1e-4, "got {loss}, expected {expected}");
    }

    #[test]
    fn test_composer_adds_weighted_feature_terms() {
        let device = Default::default();
        let weights = LossWeights {
            pixel: 1.0, perceptual: true, texture: true,
            texture_patch: 4, adversarial: 1.0,
        };
        let composer = LossComposer::<TestBackend, ScaledTaps>::new(weights, Normalizer::UNIT, Some(ScaledTaps))
            .unwrap();

        let a = Tensor::<TestBackend, 4>::zeros([1, 3, 4, 4], &device);
        let b = Tensor::<TestBackend, 4>::ones([1, 3, 4, 4], &device);
        let out = composer.compose(a, b, None);

        assert!((out.perceptual - 2.3).abs() < 1e-5);
        assert!(out.texture > 0.0);
        let total = scalar(&out.total);
        assert!((total - (out.pixel + out.perceptual + out.texture)).abs() < 1e-5);
    }

    #[test]
    fn test_binary_cross_entropy() {
        let device = Default::default();
        let p = Tensor::<TestBackend, 2>::full([4, 1], 0.5, &device);
        let loss = scalar(&binary_cross_entropy(p, 1.0));
        assert!((loss - std::f64::consts::LN_2).abs() < 1e-5);
    }

    #[test]
    fn test_composer_requires_features_for_perceptual() {
        let weights = LossWeights {
            pixel: 1.0, perceptual: true, texture: false,
            texture_patch: DEFAULT_TEXTURE_PATCH, adversarial: 1.0,
        };
        let composer = LossComposer::<TestBackend, Vgg19<TestBackend>>::new(weights, Normalizer::UNIT, None);
        assert!(composer.is_err());
    }

    #[test]
    fn test_composer_pixel_only() {
        let device = Default::default();
        let weights = LossWeights {
            pixel: 2.0, perceptual: false, texture: false,
            texture_patch: DEFAULT_TEXTURE_PATCH, adversarial: 1.0,
        };
        let composer = LossComposer::<TestBackend, Vgg19<TestBackend>>::new(weights, Normalizer::UNIT, None)
            .unwrap();

        let a = Tensor::<TestBackend, 4>::zeros([1, 3, 4, 4], &device);
        let b = Tensor::<TestBackend, 4>::ones([1, 3, 4, 4], &device);
        let adv = Tensor::<TestBackend, 1>::from_floats([0.5], &device);
        let out = composer.compose(a, b, Some(adv));

        assert!((out.pixel - 1.0).abs() < 1e-6);
        assert!((out.adversarial - 0.5).abs() < 1e-6);
        assert!((scalar(&out.total) - 2.5).abs() < 1e-6);
        assert_eq!(out.perceptual, 0.0);
    }
}
