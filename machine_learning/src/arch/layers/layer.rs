use ndarray::{Array2, ArrayView2};

use super::Dense;
use crate::{Result, arch::activations::ActFn};

#[derive(Clone, Debug)]
pub enum Layer {
    Dense(Dense),
}
use Layer::*;

impl Layer {
    pub fn dense(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self::Dense(Dense::new(dim, act_fn))
    }

    pub fn size(&self) -> usize {
        match self {
            Dense(l) => l.size(),
        }
    }

    /// Returns the input and output widths of this layer.
    pub fn dim(&self) -> (usize, usize) {
        match self {
            Dense(l) => l.dim(),
        }
    }

    /// The amount of inputs feeding each output, used for initialization.
    pub fn fan_in(&self) -> usize {
        self.dim().0
    }

    pub fn is_piecewise_linear(&self) -> bool {
        match self {
            Dense(l) => l.act_fn().is_none_or(|act_fn| act_fn.is_piecewise_linear()),
        }
    }

    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        match self {
            Dense(l) => l.forward(params, x),
        }
    }

    pub fn infer(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        match self {
            Dense(l) => l.infer(params, x),
        }
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        match self {
            Dense(l) => l.backward(params, grad, d),
        }
    }

    pub fn input_grad(
        &self,
        params: &[f32],
        delta: ArrayView2<f32>,
    ) -> Result<(Array2<f32>, Array2<f32>)> {
        match self {
            Dense(l) => l.input_grad(params, delta),
        }
    }

    pub fn input_grad_backward(
        &self,
        params: &[f32],
        grad: &mut [f32],
        c: ArrayView2<f32>,
        q: ArrayView2<f32>,
    ) -> Result<Array2<f32>> {
        match self {
            Dense(l) => l.input_grad_backward(params, grad, c, q),
        }
    }
}
