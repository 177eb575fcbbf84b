use ndarray::{Array2, ArrayView2};

/// The objective of an adversarial game between a critic and a generator.
///
/// Scores are the critic's raw outputs, one row per sample. Each loss comes with its derivative
/// with respect to the scores it was computed from.
pub trait AdversarialLoss {
    /// A short name used in logs and file names.
    fn name(&self) -> &'static str;

    fn critic_loss(&self, real: ArrayView2<f32>, fake: ArrayView2<f32>) -> f32;

    /// Returns the derivatives of `critic_loss` with respect to the real and the fake scores.
    fn critic_loss_prime(
        &self,
        real: ArrayView2<f32>,
        fake: ArrayView2<f32>,
    ) -> (Array2<f32>, Array2<f32>);

    fn generator_loss(&self, fake: ArrayView2<f32>) -> f32;

    fn generator_loss_prime(&self, fake: ArrayView2<f32>) -> Array2<f32>;

    /// The gradient penalty coefficient added to the critic loss, if any.
    fn gradient_penalty(&self) -> Option<f32> {
        None
    }

    /// The bound the critic's parameters are clipped to after each update, if any.
    fn weight_clip(&self) -> Option<f32> {
        None
    }
}

impl<T: AdversarialLoss + ?Sized> AdversarialLoss for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn critic_loss(&self, real: ArrayView2<f32>, fake: ArrayView2<f32>) -> f32 {
        (**self).critic_loss(real, fake)
    }

    fn critic_loss_prime(
        &self,
        real: ArrayView2<f32>,
        fake: ArrayView2<f32>,
    ) -> (Array2<f32>, Array2<f32>) {
        (**self).critic_loss_prime(real, fake)
    }

    fn generator_loss(&self, fake: ArrayView2<f32>) -> f32 {
        (**self).generator_loss(fake)
    }

    fn generator_loss_prime(&self, fake: ArrayView2<f32>) -> Array2<f32> {
        (**self).generator_loss_prime(fake)
    }

    fn gradient_penalty(&self) -> Option<f32> {
        (**self).gradient_penalty()
    }

    fn weight_clip(&self) -> Option<f32> {
        (**self).weight_clip()
    }
}
