use crate::Result;

/// Defines the strategy for updating model parameters based on calculated gradients.
pub trait Optimizer {
    /// Updates the provided slice of weights using the accumulated gradients.
    ///
    /// # Arguments
    /// * `grad` - The accumulated gradients corresponding to the `weights` slice.
    /// * `weights` - A mutable slice of the current parameter values.
    ///
    /// # Returns
    /// `SizeMismatch` if the slices don't have the length the optimizer was built for.
    fn update_weights(&mut self, grad: &[f32], weights: &mut [f32]) -> Result<()>;
}

impl<T: Optimizer + ?Sized> Optimizer for Box<T> {
    fn update_weights(&mut self, grad: &[f32], weights: &mut [f32]) -> Result<()> {
        (**self).update_weights(grad, weights)
    }
}
