use ndarray::{Array2, ArrayView2};

use super::AdversarialLoss;

fn mean(scores: ArrayView2<f32>) -> f32 {
    scores.mean().unwrap_or_default()
}

fn mean_prime(scores: ArrayView2<f32>, sign: f32) -> Array2<f32> {
    let n = scores.len().max(1) as f32;
    Array2::from_elem(scores.raw_dim(), sign / n)
}

fn critic_loss(real: ArrayView2<f32>, fake: ArrayView2<f32>) -> f32 {
    mean(fake) - mean(real)
}

fn critic_loss_prime(real: ArrayView2<f32>, fake: ArrayView2<f32>) -> (Array2<f32>, Array2<f32>) {
    (mean_prime(real, -1.), mean_prime(fake, 1.))
}

/// Wasserstein objective: the critic widens the gap between the mean scores of real and fake
/// samples, the generator raises the mean score of its fakes.
///
/// Without clipping nothing bounds the critic's Lipschitz constant.
#[derive(Debug, Default, Clone, Copy)]
pub struct Wasserstein {
    clip: Option<f32>,
}

impl Wasserstein {
    pub fn new(clip: Option<f32>) -> Self {
        Self { clip }
    }
}

impl AdversarialLoss for Wasserstein {
    fn name(&self) -> &'static str {
        "wgan"
    }

    fn critic_loss(&self, real: ArrayView2<f32>, fake: ArrayView2<f32>) -> f32 {
        critic_loss(real, fake)
    }

    fn critic_loss_prime(
        &self,
        real: ArrayView2<f32>,
        fake: ArrayView2<f32>,
    ) -> (Array2<f32>, Array2<f32>) {
        critic_loss_prime(real, fake)
    }

    fn generator_loss(&self, fake: ArrayView2<f32>) -> f32 {
        -mean(fake)
    }

    fn generator_loss_prime(&self, fake: ArrayView2<f32>) -> Array2<f32> {
        mean_prime(fake, -1.)
    }

    fn weight_clip(&self) -> Option<f32> {
        self.clip
    }
}

/// Wasserstein objective with a gradient penalty keeping the critic close to 1-Lipschitz.
#[derive(Debug, Clone, Copy)]
pub struct WassersteinGp {
    lambda: f32,
}

impl WassersteinGp {
    pub fn new(lambda: f32) -> Self {
        Self { lambda }
    }
}

impl Default for WassersteinGp {
    fn default() -> Self {
        Self::new(10.)
    }
}

impl AdversarialLoss for WassersteinGp {
    fn name(&self) -> &'static str {
        "wgan-gp"
    }

    fn critic_loss(&self, real: ArrayView2<f32>, fake: ArrayView2<f32>) -> f32 {
        critic_loss(real, fake)
    }

    fn critic_loss_prime(
        &self,
        real: ArrayView2<f32>,
        fake: ArrayView2<f32>,
    ) -> (Array2<f32>, Array2<f32>) {
        critic_loss_prime(real, fake)
    }

    fn generator_loss(&self, fake: ArrayView2<f32>) -> f32 {
        -mean(fake)
    }

    fn generator_loss_prime(&self, fake: ArrayView2<f32>) -> Array2<f32> {
        mean_prime(fake, -1.)
    }

    fn gradient_penalty(&self) -> Option<f32> {
        Some(self.lambda)
    }
}
