// ============================================================
// Layer 5 — Adversarial Loss
// ============================================================
// Owns the discriminator and its optimiser. One call to `step`
// per training batch:
//
//   1. update D on (real HR patches, detached generator output)
//   2. return the generator-side loss, still attached to G's graph
//
// Two objectives are supported:
//
//   Bce           noisy labels: real ~ U[0.9, 1.0], fake ~ U[0.0, 0.1];
//                 G is scored by the updated D against the real label
//   LeastSquares  labels 1 / 0, D outputs and labels shuffled with one
//                 permutation, MSE; G is scored by D before its update
//
// When the texture loss is active both D and G losses are doubled.

use burn::{
    nn::loss::{MseLoss, Reduction},
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::{backend::AutodiffBackend, Int},
};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::ml::discriminator::Discriminator;
use crate::ml::losses::{binary_cross_entropy, scalar};

/// Adversarial objective selected for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AdversarialMode {
    #[default]
    Off,
    Bce,
    LeastSquares,
}

impl AdversarialMode {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Off)
    }
}

/// Scalars reported by one discriminator update.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdversarialStats {
    pub loss_d:       f64,
    /// mean D(x) on real patches
    pub d_real:       f64,
    /// mean D(G(z)) before the update
    pub d_fake:       f64,
    /// mean D(G(z)) after the update (Bce only)
    pub d_fake_after: Option<f64>,
}

pub struct AdversarialOutput<B: Backend> {
    pub loss_g: Tensor<B, 1>,
    pub stats:  AdversarialStats,
}

pub struct AdversarialTrainer<B: AutodiffBackend, O: Optimizer<Discriminator<B>, B>> {
    discriminator: Discriminator<B>,
    optim:         O,
    lr:            f64,
    mode:          AdversarialMode,
    loss_scale:    f32,
    rng:           StdRng,
}

impl<B: AutodiffBackend, O: Optimizer<Discriminator<B>, B>> AdversarialTrainer<B, O> {
    pub fn new(
        discriminator:    Discriminator<B>,
        optim:            O,
        lr:               f64,
        mode:             AdversarialMode,
        texture_weighted: bool,
        seed:             u64,
    ) -> Self {
        Self {
            discriminator,
            optim,
            lr,
            mode,
            loss_scale: if texture_weighted { 2.0 } else { 1.0 },
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn discriminator(&self) -> &Discriminator<B> {
        &self.discriminator
    }

    /// Update D once, then return G's adversarial loss. Returns `None`
    /// when the mode is `Off`.
    pub fn step(&mut self, generated: Tensor<B, 4>, target: Tensor<B, 4>) -> Option<AdversarialOutput<B>> {
        match self.mode {
            AdversarialMode::Off          => None,
            AdversarialMode::Bce          => Some(self.step_bce(generated, target)),
            AdversarialMode::LeastSquares => Some(self.step_least_squares(generated, target)),
        }
    }

    fn step_bce(&mut self, generated: Tensor<B, 4>, target: Tensor<B, 4>) -> AdversarialOutput<B> {
        let (real_label, fake_label) = noisy_labels(&mut self.rng);

        let d_real = self.discriminator.forward(target.detach());
        let d_real_mean = scalar(&d_real.clone().mean());
        let loss_real = binary_cross_entropy(d_real, real_label) * self.loss_scale;

        let d_fake = self.discriminator.forward(generated.clone().detach());
        let d_fake_mean = scalar(&d_fake.clone().mean());
        let loss_fake = binary_cross_entropy(d_fake, fake_label) * self.loss_scale;

        let loss_d = loss_real + loss_fake;
        let loss_d_value = scalar(&loss_d);
        self.update_discriminator(loss_d);

        let d_after = self.discriminator.forward(generated);
        let d_after_mean = scalar(&d_after.clone().mean());
        let loss_g = binary_cross_entropy(d_after, real_label) * self.loss_scale;

        AdversarialOutput {
            loss_g,
            stats: AdversarialStats {
                loss_d:       loss_d_value,
                d_real:       d_real_mean,
                d_fake:       d_fake_mean,
                d_fake_after: Some(d_after_mean),
            },
        }
    }

    fn step_least_squares(&mut self, generated: Tensor<B, 4>, target: Tensor<B, 4>) -> AdversarialOutput<B> {
        let device = generated.device();
        let n = generated.dims()[0];

        let d_gen = self.discriminator.forward(generated.clone());
        let d_fake_mean = scalar(&d_gen.clone().mean());
        let loss_g = MseLoss::new().forward(d_gen.clone(), d_gen.ones_like(), Reduction::Mean)
            * self.loss_scale;

        let d_real = self.discriminator.forward(target.detach());
        let d_real_mean = scalar(&d_real.clone().mean());
        let d_fake = self.discriminator.forward(generated.detach());

        let outputs = Tensor::cat(vec![d_real, d_fake], 0).reshape([2 * n]);
        let labels: Vec<f32> = (0..2 * n).map(|i| if i < n { 1.0 } else { 0.0 }).collect();
        let (outputs, labels) = shuffle_together(outputs, labels, &mut self.rng, &device);

        let loss_d = MseLoss::new().forward(outputs, labels, Reduction::Mean) * self.loss_scale;
        let loss_d_value = scalar(&loss_d);
        self.update_discriminator(loss_d);

        AdversarialOutput {
            loss_g,
            stats: AdversarialStats {
                loss_d:       loss_d_value,
                d_real:       d_real_mean,
                d_fake:       d_fake_mean,
                d_fake_after: None,
            },
        }
    }

    fn update_discriminator(&mut self, loss: Tensor<B, 1>) {
        let grads = GradientsParams::from_grads(loss.backward(), &self.discriminator);
        self.discriminator = self.optim.step(self.lr, self.discriminator.clone(), grads);
    }
}

/// Real label in [0.9, 1.0], fake label in [0.0, 0.1].
fn noisy_labels<R: Rng + ?Sized>(rng: &mut R) -> (f32, f32) {
    (rng.gen_range(0.9..=1.0), rng.gen_range(0.0..=0.1))
}

/// Apply one random permutation to both the outputs and their labels.
fn shuffle_together<B: Backend, R: Rng + ?Sized>(
    outputs: Tensor<B, 1>,
    labels:  Vec<f32>,
    rng:     &mut R,
    device:  &B::Device,
) -> (Tensor<B, 1>, Tensor<B, 1>) {
    let len = labels.len();
    let mut perm: Vec<usize> = (0..len).collect();
    perm.shuffle(rng);

    let shuffled_labels: Vec<f32> = perm.iter().map(|&i| labels[i]).collect();
    let index = Tensor::<B, 1, Int>::from_data(
        TensorData::new(perm.iter().map(|&i| i as i64).collect::<Vec<_>>(), [len]),
        device,
    );

    (
        outputs.select(0, index),
        Tensor::from_data(TensorData::new(shuffled_labels, [len]), device),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::discriminator::DiscriminatorConfig;
    use burn::backend::{Autodiff, NdArray};
    use burn::optim::AdamConfig;
    use burn::tensor::Distribution;

    type TestBackend = Autodiff<NdArray>;

    fn tiny_discriminator() -> Discriminator<TestBackend> {
        DiscriminatorConfig::new()
            .with_base_channels(4)
            .with_num_stages(2)
            .with_hidden(8)
            .init(&Default::default())
    }

    fn patches() -> (Tensor<TestBackend, 4>, Tensor<TestBackend, 4>) {
        let device = Default::default();
        let generated = Tensor::random([2, 3, 16, 16], Distribution::Default, &device).require_grad();
        let target    = Tensor::random([2, 3, 16, 16], Distribution::Default, &device);
        (generated, target)
    }

    fn trainer(mode: AdversarialMode, texture_weighted: bool, disc: Discriminator<TestBackend>)
        -> AdversarialTrainer<TestBackend, impl Optimizer<Discriminator<TestBackend>, TestBackend>>
    {
        let optim = AdamConfig::new().init::<TestBackend, Discriminator<TestBackend>>();
        AdversarialTrainer::new(disc, optim, 1e-4, mode, texture_weighted, 7)
    }

    #[test]
    fn test_off_mode_yields_nothing() {
        let (generated, target) = patches();
        let mut adv = trainer(AdversarialMode::Off, false, tiny_discriminator());
        assert!(adv.step(generated, target).is_none());
    }

    #[test]
    fn test_bce_step_reports_three_probabilities() {
        let (generated, target) = patches();
        let mut adv = trainer(AdversarialMode::Bce, false, tiny_discriminator());
        let out = adv.step(generated.clone(), target).unwrap();

        assert!(out.stats.loss_d.is_finite());
        assert!(out.stats.d_real > 0.0 && out.stats.d_real < 1.0);
        assert!(out.stats.d_fake > 0.0 && out.stats.d_fake < 1.0);
        let after = out.stats.d_fake_after.unwrap();
        assert!(after > 0.0 && after < 1.0);

        let grads = out.loss_g.backward();
        assert!(generated.grad(&grads).is_some());
    }

    #[test]
    fn test_least_squares_step_reaches_generator() {
        let (generated, target) = patches();
        let mut adv = trainer(AdversarialMode::LeastSquares, false, tiny_discriminator());
        let out = adv.step(generated.clone(), target).unwrap();

        assert!(out.stats.loss_d.is_finite());
        assert!(out.stats.d_fake_after.is_none());

        let grads = out.loss_g.backward();
        assert!(generated.grad(&grads).is_some());
    }

    #[test]
    fn test_texture_weighting_doubles_least_squares_generator_loss() {
        let (generated, target) = patches();
        let disc = tiny_discriminator();

        let plain = trainer(AdversarialMode::LeastSquares, false, disc.clone())
            .step(generated.clone(), target.clone())
            .unwrap();
        let doubled = trainer(AdversarialMode::LeastSquares, true, disc)
            .step(generated, target)
            .unwrap();

        let (a, b) = (scalar(&plain.loss_g), scalar(&doubled.loss_g));
        assert!((b - 2.0 * a).abs() < 1e-6 * a.abs().max(1.0));
    }

    #[test]
    fn test_texture_weighting_doubles_bce_losses() {
        let (generated, target) = patches();
        let disc = tiny_discriminator();

        let plain = trainer(AdversarialMode::Bce, false, disc.clone())
            .step(generated.clone(), target.clone())
            .unwrap();
        let doubled = trainer(AdversarialMode::Bce, true, disc)
            .step(generated, target)
            .unwrap();

        // same seed, same labels, same D before the update
        let (a, b) = (plain.stats.loss_d, doubled.stats.loss_d);
        assert!((b - 2.0 * a).abs() < 1e-6 * a.abs().max(1.0));

        // Adam steps barely depend on gradient scale, so both updated Ds
        // agree up to the epsilon term
        let (a, b) = (scalar(&plain.loss_g), scalar(&doubled.loss_g));
        assert!((b - 2.0 * a).abs() < 1e-2 * a.abs(), "{b} vs 2 x {a}");
    }

    #[test]
    fn test_noisy_labels_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..1000 {
            let (real, fake) = noisy_labels(&mut rng);
            assert!((0.9..=1.0).contains(&real), "real label {real}");
            assert!((0.0..=0.1).contains(&fake), "fake label {fake}");
        }
    }

    #[test]
    fn test_shuffle_keeps_outputs_with_labels() {
        let device = Default::default();
        let outputs = Tensor::<NdArray, 1>::from_floats([10.0, 11.0, 12.0, 20.0, 21.0, 22.0], &device);
        let labels  = vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0];
        let mut rng = StdRng::seed_from_u64(3);

        let (outputs, labels) = shuffle_together(outputs, labels, &mut rng, &device);
        let outputs: Vec<f32> = outputs.into_data().to_vec().unwrap();
        let labels:  Vec<f32> = labels.into_data().to_vec().unwrap();

        let mut sorted = outputs.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(sorted, vec![10.0, 11.0, 12.0, 20.0, 21.0, 22.0]);

        for (o, l) in outputs.iter().zip(&labels) {
            assert_eq!(*l, if *o < 15.0 { 1.0 } else { 0.0 });
        }
    }
}
