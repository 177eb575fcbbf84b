use machine_learning::{
    MlErr, ParamStore,
    arch::{Sequential, activations::ActFn, layers::Layer},
};
use ndarray::{Array1, Array2, Array4, ArrayView1, ArrayView4, Axis};
use rand::Rng;

use super::{IMAGE_PIXELS, flatten, unflatten};
use crate::Result;

const HIDDEN: [usize; 2] = [512, 256];
const LEAK: f32 = 0.2;

/// Scores images with a single unbounded real number.
///
/// Three dense layers `784 → 512 → 256 → 1`, LeakyReLU(0.2) after each hidden layer and no
/// output activation, so it serves both as a soft label and as a Wasserstein critic.
#[derive(Debug, Clone)]
pub struct Discriminator {
    model: Sequential,
    store: ParamStore,
}

impl Discriminator {
    /// Creates a new `Discriminator` with freshly initialized parameters.
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let model = architecture();
        let params = model.init_params(rng);

        Self {
            model,
            store: ParamStore::new(params),
        }
    }

    /// Creates a new `Discriminator` with the given parameters.
    pub fn from_params(params: Vec<f32>) -> Result<Self> {
        let model = architecture();

        if params.len() != model.size() {
            return Err(MlErr::SizeMismatch {
                what: "discriminator parameters",
                got: params.len(),
                expected: model.size(),
            }
            .into());
        }

        Ok(Self {
            model,
            store: ParamStore::new(params),
        })
    }

    /// Returns the amount of parameters of the architecture.
    pub fn num_params() -> usize {
        architecture().size()
    }

    pub fn store(&self) -> &ParamStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ParamStore {
        &mut self.store
    }

    /// Scores a batch keeping what's needed for `backward`.
    ///
    /// # Returns
    /// One score per image.
    pub fn forward(&mut self, images: ArrayView4<f32>) -> Result<Array1<f32>> {
        let x = flatten(images)?;
        let scores = self.model.forward(&self.store, x.view())?;
        Ok(squeeze(scores))
    }

    /// Scores a batch without touching the cached forward pass.
    pub fn score(&self, images: ArrayView4<f32>) -> Result<Array1<f32>> {
        let x = flatten(images)?;
        let scores = self.model.infer(self.store.params(), x.view())?;
        Ok(squeeze(scores))
    }

    /// Accumulates the parameter gradient given the derivative of a loss with respect to the
    /// scores of the last `forward`.
    ///
    /// # Returns
    /// The derivative of the loss with respect to the scored images.
    pub fn backward(&mut self, d_scores: ArrayView1<f32>) -> Result<Array4<f32>> {
        let d = d_scores.to_owned().insert_axis(Axis(1));
        let d_x = self.model.backward(&mut self.store, d)?;
        unflatten(d_x.view())
    }

    /// Computes `lambda · mean((‖∇ D(x)‖₂ - 1)²)` over the given images and accumulates its
    /// parameter gradient.
    ///
    /// Overwrites the cached forward pass.
    pub fn gradient_penalty(&mut self, images: ArrayView4<f32>, lambda: f32) -> Result<f32> {
        let x = flatten(images)?;
        let penalty = self.model.gradient_penalty(&mut self.store, x.view(), lambda)?;
        Ok(penalty)
    }

    /// Clamps every parameter to `[-c, c]`.
    pub fn clip_weights(&mut self, c: f32) {
        self.store.clamp(c);
    }
}

fn squeeze(scores: Array2<f32>) -> Array1<f32> {
    scores.index_axis_move(Axis(1), 0)
}

fn architecture() -> Sequential {
    let [h1, h2] = HIDDEN;

    Sequential::new([
        Layer::dense((IMAGE_PIXELS, h1), Some(ActFn::leaky_relu(LEAK))),
        Layer::dense((h1, h2), Some(ActFn::leaky_relu(LEAK))),
        Layer::dense((h2, 1), None),
    ])
}
