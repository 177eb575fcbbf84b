use ndarray::{Array2, ArrayView2};

use super::AdversarialLoss;

/// Least squares objective: the critic regresses real samples to 1 and fakes to 0, the generator
/// pushes the score of its fakes towards 1.
#[derive(Debug, Default, Clone, Copy)]
pub struct LeastSquares;

impl LeastSquares {
    pub fn new() -> Self {
        Self
    }
}

fn half_mse(scores: ArrayView2<f32>, target: f32) -> f32 {
    0.5 * scores
        .mapv(|s| (s - target).powi(2))
        .mean()
        .unwrap_or_default()
}

fn half_mse_prime(scores: ArrayView2<f32>, target: f32) -> Array2<f32> {
    let n = scores.len().max(1) as f32;
    scores.mapv(|s| (s - target) / n)
}

impl AdversarialLoss for LeastSquares {
    fn name(&self) -> &'static str {
        "lsgan"
    }

    fn critic_loss(&self, real: ArrayView2<f32>, fake: ArrayView2<f32>) -> f32 {
        half_mse(real, 1.) + half_mse(fake, 0.)
    }

    fn critic_loss_prime(
        &self,
        real: ArrayView2<f32>,
        fake: ArrayView2<f32>,
    ) -> (Array2<f32>, Array2<f32>) {
        (half_mse_prime(real, 1.), half_mse_prime(fake, 0.))
    }

    fn generator_loss(&self, fake: ArrayView2<f32>) -> f32 {
        half_mse(fake, 1.)
    }

    fn generator_loss_prime(&self, fake: ArrayView2<f32>) -> Array2<f32> {
        half_mse_prime(fake, 1.)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn critic_loss_is_never_negative() {
        let cases = [
            (array![[1.0], [1.0]], array![[0.0], [0.0]]),
            (array![[-3.0], [0.5]], array![[2.0], [-7.0]]),
            (array![[1e-4], [1e4]], array![[-1e4], [0.3]]),
        ];

        for (real, fake) in cases {
            assert!(LeastSquares.critic_loss(real.view(), fake.view()) >= 0.0);
        }
    }

    #[test]
    fn losses_at_known_points() {
        let real = array![[1.0], [3.0]];
        let fake = array![[0.0], [2.0]];

        // ½·mean(0, 4) + ½·mean(0, 4)
        assert_eq!(LeastSquares.critic_loss(real.view(), fake.view()), 2.0);
        // ½·mean(1, 1)
        assert_eq!(LeastSquares.generator_loss(fake.view()), 0.5);

        let (d_real, d_fake) = LeastSquares.critic_loss_prime(real.view(), fake.view());
        assert_eq!(d_real, array![[0.0], [1.0]]);
        assert_eq!(d_fake, array![[0.0], [1.0]]);
        assert_eq!(
            LeastSquares.generator_loss_prime(fake.view()),
            array![[-0.5], [0.5]]
        );
    }
}
