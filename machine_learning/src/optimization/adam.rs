use super::Optimizer;
use crate::{MlErr, Result};

/// Adaptive moment estimation.
///
/// Keeps running averages of the gradient (`v`) and of its square (`s`) and corrects their
/// initialization bias on every step.
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    beta1_t: f32,
    beta2_t: f32,
    v: Box<[f32]>,
    s: Box<[f32]>,
    epsilon: f32,
}

impl Adam {
    /// Creates a new `Adam` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters this instance should hold moments for.
    /// * `learning_rate` - The step size.
    /// * `beta1` - Decay rate of the first moment.
    /// * `beta2` - Decay rate of the second moment.
    /// * `epsilon` - Added to the denominator for numerical stability.
    pub fn new(len: usize, learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            beta1_t: 1.,
            beta2_t: 1.,
            v: vec![0.; len].into_boxed_slice(),
            s: vec![0.; len].into_boxed_slice(),
            epsilon,
        }
    }
}

impl Optimizer for Adam {
    fn update_weights(&mut self, grad: &[f32], weights: &mut [f32]) -> Result<()> {
        for (what, got) in [("adam gradient", grad.len()), ("adam weights", weights.len())] {
            if got != self.v.len() {
                return Err(MlErr::SizeMismatch {
                    what,
                    got,
                    expected: self.v.len(),
                });
            }
        }

        let Self {
            learning_rate: lr,
            beta1: b1,
            beta2: b2,
            epsilon: eps,
            ..
        } = *self;

        self.beta1_t *= b1;
        self.beta2_t *= b2;

        let bc1 = 1. - self.beta1_t;
        let bc2 = 1. - self.beta2_t;

        weights
            .iter_mut()
            .zip(grad)
            .zip(self.v.iter_mut())
            .zip(self.s.iter_mut())
            .for_each(|(((w, g), v), s)| {
                *v = b1 * *v + (1. - b1) * g;
                *s = b2 * *s + (1. - b2) * g.powi(2);

                let v_hat = *v / bc1;
                let s_hat = *s / bc2;
                *w -= lr * v_hat / (s_hat.sqrt() + eps);
            });

        Ok(())
    }
}
