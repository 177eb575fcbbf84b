use ndarray::{Array2, ArrayView2, Axis};
use rand::Rng;

use super::layers::Layer;
use crate::{MlErr, Result, init::ParamGen, params::ParamStore};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
#[derive(Clone, Debug)]
pub struct Sequential {
    layers: Vec<Layer>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Layer>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    /// Returns the amount of parameters in the model.
    pub fn size(&self) -> usize {
        self.layers.iter().map(|layer| layer.size()).sum()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// The width of the model's input.
    pub fn input_width(&self) -> usize {
        self.layers.first().map_or(0, |layer| layer.dim().0)
    }

    /// The width of the model's output.
    pub fn output_width(&self) -> usize {
        self.layers.last().map_or(0, |layer| layer.dim().1)
    }

    /// Generates a fresh set of parameters, weights and biases of every layer uniform in
    /// `±1/sqrt(fan_in)`.
    pub fn init_params<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f32> {
        let mut params = vec![0.; self.size()];
        let mut rest = params.as_mut_slice();

        for layer in &self.layers {
            let (head, tail) = rest.split_at_mut(layer.size());
            let fan_in = layer.fan_in();
            ParamGen::LecunUniform { fan_in }.fill(rng, head);
            rest = tail;
        }

        params
    }

    /// Makes a forward pass through the network keeping what's needed to go backwards.
    ///
    /// # Arguments
    /// * `store` - The model's parameters.
    /// * `x` - The input data.
    ///
    /// # Returns
    /// The prediction for the given input or an error if occurred.
    pub fn forward(&mut self, store: &ParamStore, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_store(store)?;

        let nlayers = self.layers.len();
        let mut front = store.front();
        let mut x = x.to_owned();

        for (i, layer) in self.layers.iter_mut().enumerate() {
            let params = front.take(layer.size()).ok_or(MlErr::SizeMismatch {
                what: "layers",
                got: i,
                expected: nlayers,
            })?;

            x = layer.forward(params, x.view()).map_err(|e| e.at_layer(i))?;
        }

        Ok(x)
    }

    /// Makes a forward pass through the first `depth` layers without touching any layer state.
    pub fn infer_until(
        &self,
        params: &[f32],
        x: ArrayView2<f32>,
        depth: usize,
    ) -> Result<Array2<f32>> {
        if params.len() != self.size() {
            return Err(MlErr::SizeMismatch {
                what: "parameters",
                got: params.len(),
                expected: self.size(),
            });
        }

        let mut rest = params;
        let mut x = x.to_owned();

        for (i, layer) in self.layers.iter().take(depth).enumerate() {
            let (head, tail) = rest.split_at(layer.size());
            x = layer.infer(head, x.view()).map_err(|e| e.at_layer(i))?;
            rest = tail;
        }

        Ok(x)
    }

    /// Makes a full forward pass without touching any layer state.
    pub fn infer(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.infer_until(params, x, self.layers.len())
    }

    /// Backpropagates `d`, the derivative of the loss with respect to the model's output, through
    /// the last forward pass. The parameter gradient is accumulated onto `store`.
    ///
    /// # Returns
    /// The derivative of the loss with respect to the model's input.
    pub fn backward(&mut self, store: &mut ParamStore, d: Array2<f32>) -> Result<Array2<f32>> {
        self.check_store(store)?;

        let nlayers = self.layers.len();
        let mut back = store.back_mut();
        let mut d = d;

        for (i, layer) in self.layers.iter_mut().enumerate().rev() {
            let (params, grad) = back.take(layer.size()).ok_or(MlErr::SizeMismatch {
                what: "layers",
                got: i,
                expected: nlayers,
            })?;

            d = layer.backward(params, grad, d).map_err(|e| e.at_layer(i))?;
        }

        Ok(d)
    }

    /// Penalizes the deviation from 1 of the norm of the model's input gradient.
    ///
    /// Computes `P = lambda · mean((‖∇ₓ f(x)‖₂ - 1)²)` over the rows of `x` for a model with a
    /// single output, and accumulates `∂P/∂params` onto `store`. Requires every activation to be
    /// piecewise linear, the biases then have no effect on the input gradient.
    ///
    /// # Arguments
    /// * `store` - The model's parameters.
    /// * `x` - The points at which the gradient is penalized, one per row.
    /// * `lambda` - The penalty coefficient.
    ///
    /// # Returns
    /// The penalty's value.
    pub fn gradient_penalty(
        &mut self,
        store: &mut ParamStore,
        x: ArrayView2<f32>,
        lambda: f32,
    ) -> Result<f32> {
        if x.nrows() == 0 {
            return Err(MlErr::EmptyBatch);
        }

        if self.output_width() != 1 {
            return Err(MlErr::SizeMismatch {
                what: "penalized model output",
                got: self.output_width(),
                expected: 1,
            });
        }

        if let Some(i) = self.layers.iter().position(|l| !l.is_piecewise_linear()) {
            return Err(MlErr::NotPiecewiseLinear { layer: i });
        }

        self.forward(store, x)?;

        let layer_params = self.layer_params(store.params());
        let nlayers = self.layers.len();
        let mut qs = Vec::with_capacity(nlayers);
        let mut delta = Array2::ones((x.nrows(), 1));

        for (i, (layer, params)) in self.layers.iter().zip(&layer_params).enumerate().rev() {
            let (q, delta_in) = layer
                .input_grad(params, delta.view())
                .map_err(|e| e.at_layer(i))?;
            qs.push(q);
            delta = delta_in;
        }
        qs.reverse();

        let n = x.nrows() as f32;
        let norms = delta.map_axis(Axis(1), |row| row.iter().map(|g| g * g).sum::<f32>().sqrt());
        let penalty = lambda * norms.mapv(|norm| (norm - 1.).powi(2)).sum() / n;

        // ∂P/∂g = 2λ/n · (‖g‖ - 1) · g/‖g‖, taken as zero where the gradient vanishes.
        let coefs = norms.mapv(|norm| {
            if norm > 0. {
                2. * lambda * (norm - 1.) / (n * norm)
            } else {
                0.
            }
        });
        let mut c = delta;
        for (mut row, coef) in c.axis_iter_mut(Axis(0)).zip(coefs.iter()) {
            row *= *coef;
        }

        let mut front = store.front_mut();
        for (i, (layer, q)) in self.layers.iter().zip(&qs).enumerate() {
            let (params, grad) = front.take(layer.size()).ok_or(MlErr::SizeMismatch {
                what: "layers",
                got: i,
                expected: nlayers,
            })?;

            c = layer
                .input_grad_backward(params, grad, c.view(), q.view())
                .map_err(|e| e.at_layer(i))?;
        }

        Ok(penalty)
    }

    fn layer_params<'a>(&self, params: &'a [f32]) -> Vec<&'a [f32]> {
        let mut rest = params;

        self.layers
            .iter()
            .map(|layer| {
                let (head, tail) = rest.split_at(layer.size());
                rest = tail;
                head
            })
            .collect()
    }

    fn check_store(&self, store: &ParamStore) -> Result<()> {
        if store.len() != self.size() {
            return Err(MlErr::SizeMismatch {
                what: "parameters",
                got: store.len(),
                expected: self.size(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::arch::activations::ActFn;

    fn critic() -> (Sequential, ParamStore) {
        let model = Sequential::new([
            Layer::dense((2, 3), Some(ActFn::leaky_relu(0.2))),
            Layer::dense((3, 1), None),
        ]);
        let params = vec![
            0.9, -0.4, 0.3, // w1 row 0
            0.2, 0.7, -0.8, // w1 row 1
            0.1, -0.2, 0.05, // b1
            1.1, -0.6, 0.8, // w2
            0.3, // b2
        ];

        (model, ParamStore::new(params))
    }

    fn penalty_at(model: &mut Sequential, params: Vec<f32>, x: ArrayView2<f32>) -> f32 {
        let mut store = ParamStore::new(params);
        model.gradient_penalty(&mut store, x, 10.).unwrap()
    }

    #[test]
    fn forward_and_infer_agree() {
        let (mut model, store) = critic();
        let x = array![[1.0, 2.0], [-0.5, 0.25]];

        let forward = model.forward(&store, x.view()).unwrap();
        let infer = model.infer(store.params(), x.view()).unwrap();

        assert_eq!(forward, infer);
        assert_eq!(forward.dim(), (2, 1));
    }

    #[test]
    fn forward_rejects_a_store_of_the_wrong_size() {
        let (mut model, _) = critic();
        let store = ParamStore::new(vec![0.; 3]);

        let err = model.forward(&store, array![[1.0, 2.0]].view()).unwrap_err();
        assert!(matches!(err, MlErr::SizeMismatch { what: "parameters", .. }));
    }

    #[test]
    fn backward_matches_finite_differences() {
        let (mut model, mut store) = critic();
        let x = array![[1.0, 2.0], [-0.5, 0.25], [0.3, -1.2]];

        // loss = Σ out
        let out = model.forward(&store, x.view()).unwrap();
        model.backward(&mut store, Array2::ones(out.raw_dim())).unwrap();

        let h = 1e-2;
        for k in 0..store.len() {
            let mut plus = store.params().to_vec();
            plus[k] += h;
            let mut minus = store.params().to_vec();
            minus[k] -= h;

            let f_plus = model.infer(&plus, x.view()).unwrap().sum();
            let f_minus = model.infer(&minus, x.view()).unwrap().sum();
            let numeric = (f_plus - f_minus) / (2. * h);

            assert!(
                (numeric - store.grad()[k]).abs() < 1e-3,
                "param {k}: numeric {numeric} analytic {}",
                store.grad()[k]
            );
        }
    }

    #[test]
    fn backward_returns_the_input_gradient() {
        let (mut model, mut store) = critic();
        let x = array![[1.0, 2.0]];

        model.forward(&store, x.view()).unwrap();
        let d_x = model.backward(&mut store, array![[1.0]]).unwrap();

        let h = 1e-2;
        for j in 0..2 {
            let mut plus = x.clone();
            plus[[0, j]] += h;
            let mut minus = x.clone();
            minus[[0, j]] -= h;

            let numeric = (model.infer(store.params(), plus.view()).unwrap()[[0, 0]]
                - model.infer(store.params(), minus.view()).unwrap()[[0, 0]])
                / (2. * h);
            assert!((numeric - d_x[[0, j]]).abs() < 1e-3);
        }
    }

    #[test]
    fn gradient_penalty_matches_finite_differences() {
        let (mut model, mut store) = critic();
        let x = array![[1.0, 2.0], [-0.5, 0.25], [0.3, -1.2]];

        model.gradient_penalty(&mut store, x.view(), 10.).unwrap();

        let h = 1e-2;
        for k in 0..store.len() {
            let mut plus = store.params().to_vec();
            plus[k] += h;
            let mut minus = store.params().to_vec();
            minus[k] -= h;

            let numeric = (penalty_at(&mut model, plus, x.view())
                - penalty_at(&mut model, minus, x.view()))
                / (2. * h);
            let analytic = store.grad()[k];

            assert!(
                (numeric - analytic).abs() < 2e-2 * (1. + analytic.abs()),
                "param {k}: numeric {numeric} analytic {}",
                store.grad()[k]
            );
        }
    }

    #[test]
    fn gradient_penalty_vanishes_at_unit_gradient_norm() {
        let mut model = Sequential::new([
            Layer::dense((2, 2), Some(ActFn::leaky_relu(0.2))),
            Layer::dense((2, 1), None),
        ]);
        // ∇ₓ = w1 · (slopes ⊙ w2) = (1, 0) while the first unit stays active.
        let mut store = ParamStore::new(vec![0.5, 0.0, 0.0, 0.5, 1.0, 1.0, 2.0, 0.0, -3.0]);
        let x = array![[1.0, -3.0], [0.0, 7.5], [-1.0, 2.0]];

        let penalty = model.gradient_penalty(&mut store, x.view(), 10.).unwrap();

        assert_eq!(penalty, 0.0);
        assert!(store.grad().iter().all(|g| *g == 0.0));
    }

    #[test]
    fn gradient_penalty_of_a_linear_critic() {
        let mut model = Sequential::new([Layer::dense((2, 1), None)]);
        let mut store = ParamStore::new(vec![3.0, 4.0, 0.0]);
        let x = array![[1.0, 1.0], [2.0, -1.0]];

        // ‖∇‖ = 5 everywhere: P = 10 · 16, ∂P/∂w = 10 · 2 · 4 · w / 5
        let penalty = model.gradient_penalty(&mut store, x.view(), 10.).unwrap();

        assert!((penalty - 160.0).abs() < 1e-4);
        assert!((store.grad()[0] - 48.0).abs() < 1e-4);
        assert!((store.grad()[1] - 64.0).abs() < 1e-4);
        assert_eq!(store.grad()[2], 0.0);
    }

    #[test]
    fn gradient_penalty_requires_piecewise_linear_layers() {
        let mut model = Sequential::new([
            Layer::dense((2, 2), Some(ActFn::tanh())),
            Layer::dense((2, 1), None),
        ]);
        let mut store = ParamStore::new(vec![0.1; model.size()]);

        let err = model
            .gradient_penalty(&mut store, array![[1.0, 1.0]].view(), 10.)
            .unwrap_err();
        assert_eq!(err, MlErr::NotPiecewiseLinear { layer: 0 });
    }

    #[test]
    fn init_params_fills_every_layer() {
        let (model, _) = critic();
        let mut rng = StdRng::seed_from_u64(3);

        let params = model.init_params(&mut rng);

        assert_eq!(params.len(), model.size());
        assert!(params[..9].iter().all(|w| w.abs() <= 1. / 2f32.sqrt()));
        assert!(params[9..].iter().all(|w| w.abs() <= 1. / 3f32.sqrt()));
    }
}
