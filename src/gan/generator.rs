use machine_learning::{
    ParamStore,
    arch::{Sequential, activations::ActFn, layers::Layer},
};
use ndarray::{Array2, Array4, ArrayView2, ArrayView4};
use ndarray_rand::RandomExt;
use rand::Rng;
use rand_distr::StandardNormal;

use super::{IMAGE_PIXELS, flatten, unflatten};
use crate::Result;

const HIDDEN: [usize; 3] = [128, 256, 512];

/// Maps latent vectors to `(N, 1, 28, 28)` images in `[-1, 1]`.
///
/// Four dense layers `latent → 128 → 256 → 512 → 784`, ReLU in between and `tanh` on the output.
#[derive(Debug, Clone)]
pub struct Generator {
    latent_dim: usize,
    model: Sequential,
    store: ParamStore,
}

impl Generator {
    /// Creates a new `Generator` with freshly initialized parameters.
    ///
    /// # Arguments
    /// * `latent_dim` - The size of the latent vectors.
    /// * `rng` - The source of the initial parameters.
    pub fn new<R: Rng + ?Sized>(latent_dim: usize, rng: &mut R) -> Self {
        let model = architecture(latent_dim);
        let params = model.init_params(rng);

        Self {
            latent_dim,
            model,
            store: ParamStore::new(params),
        }
    }

    pub fn latent_dim(&self) -> usize {
        self.latent_dim
    }

    pub fn store(&self) -> &ParamStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ParamStore {
        &mut self.store
    }

    /// Draws `n` latent vectors with every component from `N(0, 1)`.
    pub fn sample_latent<R: Rng>(&self, n: usize, rng: &mut R) -> Array2<f32> {
        Array2::random_using((n, self.latent_dim), StandardNormal, rng)
    }

    /// Generates images keeping what's needed for `backward`.
    pub fn forward(&mut self, z: ArrayView2<f32>) -> Result<Array4<f32>> {
        let rows = self.model.forward(&self.store, z)?;
        unflatten(rows.view())
    }

    /// Generates images without touching the cached forward pass.
    pub fn generate(&self, z: ArrayView2<f32>) -> Result<Array4<f32>> {
        let rows = self.model.infer(self.store.params(), z)?;
        unflatten(rows.view())
    }

    /// Draws `n` latent vectors and generates their images.
    pub fn sample<R: Rng>(&self, n: usize, rng: &mut R) -> Result<Array4<f32>> {
        let z = self.sample_latent(n, rng);
        self.generate(z.view())
    }

    /// Accumulates the parameter gradient given the derivative of a loss with respect to the
    /// images of the last `forward`.
    pub fn backward(&mut self, d_images: ArrayView4<f32>) -> Result<()> {
        let d = flatten(d_images)?;
        self.model.backward(&mut self.store, d)?;
        Ok(())
    }
}

fn architecture(latent_dim: usize) -> Sequential {
    let [h1, h2, h3] = HIDDEN;

    Sequential::new([
        Layer::dense((latent_dim, h1), Some(ActFn::relu())),
        Layer::dense((h1, h2), Some(ActFn::relu())),
        Layer::dense((h2, h3), Some(ActFn::relu())),
        Layer::dense((h3, IMAGE_PIXELS), Some(ActFn::tanh())),
    ])
}
