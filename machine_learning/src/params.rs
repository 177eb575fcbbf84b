use std::mem;

use crate::{Result, optimization::Optimizer};

/// Owns the parameters of a model and the gradient accumulated for them.
///
/// Both buffers are flat and have the same length. The layers of a model take consecutive
/// slices of them, either in order through a `FrontIter`/`FrontIterMut` or in reverse through a
/// `BackIterMut`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamStore {
    params: Vec<f32>,
    grad: Vec<f32>,
}

impl ParamStore {
    /// Creates a new `ParamStore` with a zeroed gradient.
    ///
    /// # Arguments
    /// * `params` - The initial parameters.
    ///
    /// # Returns
    /// A new `ParamStore` instance.
    pub fn new(params: Vec<f32>) -> Self {
        let grad = vec![0.; params.len()];
        Self { params, grad }
    }

    /// Returns the amount of parameters held.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    pub fn grad(&self) -> &[f32] {
        &self.grad
    }

    /// Resets the accumulated gradient.
    pub fn zero_grad(&mut self) {
        self.grad.fill(0.);
    }

    /// Applies the accumulated gradient onto the parameters.
    ///
    /// # Arguments
    /// * `optimizer` - The optimization algorithm used for the update.
    pub fn optimize<O: Optimizer + ?Sized>(&mut self, optimizer: &mut O) -> Result<()> {
        optimizer.update_weights(&self.grad, &mut self.params)
    }

    /// Clamps every parameter to `[-limit, limit]`.
    pub fn clamp(&mut self, limit: f32) {
        let limit = limit.abs();

        for w in self.params.iter_mut() {
            *w = w.clamp(-limit, limit);
        }
    }

    /// Creates a new read only iterator over the parameters, front to back.
    pub fn front(&self) -> FrontIter<'_> {
        FrontIter {
            params: &self.params,
        }
    }

    /// Creates a new iterator over the parameters and their gradient, front to back.
    pub fn front_mut(&mut self) -> FrontIterMut<'_> {
        FrontIterMut {
            params: &self.params,
            grad: &mut self.grad,
        }
    }

    /// Creates a new iterator over the parameters and their gradient, back to front.
    pub fn back_mut(&mut self) -> BackIterMut<'_> {
        BackIterMut {
            params: &self.params,
            grad: &mut self.grad,
        }
    }
}

/// The parameter iterator.
pub struct FrontIter<'ps> {
    params: &'ps [f32],
}

impl<'ps> FrontIter<'ps> {
    /// Takes the next `n` parameters.
    ///
    /// # Returns
    /// A slice of parameters or `None` if there are less than `n` parameters left.
    pub fn take(&mut self, n: usize) -> Option<&'ps [f32]> {
        if n > self.params.len() {
            return None;
        }

        let (head, tail) = self.params.split_at(n);
        self.params = tail;
        Some(head)
    }
}

/// The parameter and gradient iterator.
pub struct FrontIterMut<'ps> {
    params: &'ps [f32],
    grad: &'ps mut [f32],
}

impl<'ps> FrontIterMut<'ps> {
    /// Takes the next `n` parameters alongside their gradient.
    ///
    /// # Returns
    /// A tuple of slices or `None` if there are less than `n` parameters left.
    pub fn take(&mut self, n: usize) -> Option<(&'ps [f32], &'ps mut [f32])> {
        if n > self.params.len() {
            return None;
        }

        let (params, params_tail) = self.params.split_at(n);
        let (grad, grad_tail) = mem::take(&mut self.grad).split_at_mut(n);
        self.params = params_tail;
        self.grad = grad_tail;
        Some((params, grad))
    }
}

/// The reversed parameter and gradient iterator.
pub struct BackIterMut<'ps> {
    params: &'ps [f32],
    grad: &'ps mut [f32],
}

impl<'ps> BackIterMut<'ps> {
    /// Takes the last `n` parameters alongside their gradient.
    ///
    /// # Returns
    /// A tuple of slices or `None` if there are less than `n` parameters left.
    pub fn take(&mut self, n: usize) -> Option<(&'ps [f32], &'ps mut [f32])> {
        let len = self.params.len();
        if n > len {
            return None;
        }

        let (params_head, params) = self.params.split_at(len - n);
        let (grad_head, grad) = mem::take(&mut self.grad).split_at_mut(len - n);
        self.params = params_head;
        self.grad = grad_head;
        Some((params, grad))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::Adam;

    #[test]
    fn front_iterator() {
        let store = ParamStore::new(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let mut front = store.front();

        assert_eq!(front.take(1).unwrap(), [1.0]);
        assert_eq!(front.take(2).unwrap(), [2.0, 3.0]);
        assert!(front.take(3).is_none());
        assert_eq!(front.take(2).unwrap(), [4.0, 5.0]);
        assert!(front.take(0).unwrap().is_empty());
    }

    #[test]
    fn back_iterator() {
        let mut store = ParamStore::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        let mut back = store.back_mut();

        assert_eq!(back.take(1).unwrap().0, [8.0]);
        assert_eq!(back.take(2).unwrap().0, [6.0, 7.0]);
        assert_eq!(back.take(4).unwrap().0, [2.0, 3.0, 4.0, 5.0]);
        assert_eq!(back.take(1).unwrap().0, [1.0]);
        assert!(back.take(1).is_none());
    }

    #[test]
    fn front_then_back_write_the_same_gradient() {
        let mut store = ParamStore::new(vec![1.0, 2.0, 3.0, 4.0]);

        {
            let mut front = store.front_mut();
            let (_, grad) = front.take(3).unwrap();
            grad.fill(1.0);
        }
        {
            let mut back = store.back_mut();
            let (params, grad) = back.take(2).unwrap();
            assert_eq!(params, [3.0, 4.0]);
            grad.iter_mut().for_each(|g| *g += 1.0);
        }

        assert_eq!(store.grad(), [1.0, 1.0, 2.0, 1.0]);
        store.zero_grad();
        assert_eq!(store.grad(), [0.0; 4]);
    }

    #[test]
    fn optimize_and_clamp() {
        let mut store = ParamStore::new(vec![1.0, -1.0]);
        store.front_mut().take(2).unwrap().1.copy_from_slice(&[10.0, -10.0]);

        store.optimize(&mut Adam::new(2, 0.5, 0.9, 0.999, 1e-8)).unwrap();
        let [a, b] = store.params() else { unreachable!() };
        assert!((a - 0.5).abs() < 1e-5);
        assert!((b + 0.5).abs() < 1e-5);

        store.clamp(0.01);
        assert_eq!(store.params(), [0.01, -0.01]);

        let err = store.optimize(&mut Adam::new(3, 0.5, 0.9, 0.999, 1e-8));
        assert!(err.is_err());
        assert_eq!(store.params(), [0.01, -0.01]);
    }
}
