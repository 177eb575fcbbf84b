use ndarray::{linalg, prelude::*};

use crate::{MlErr, Result, arch::activations::ActFn};

/// A fully connected layer: `a = act_fn(x · w + b)`.
///
/// The parameters are not owned by the layer, they are viewed from the slice given on each call
/// as the `(in, out)` weight matrix in row major order followed by the `out` biases.
#[derive(Clone, Debug)]
pub struct Dense {
    dim: (usize, usize),
    act_fn: Option<ActFn>,
    size: usize,

    // Forward metadata
    x: Array2<f32>,
    z: Array2<f32>,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Arguments
    /// * `dim` - The input and output dimensions.
    /// * `act_fn` - The activation applied to the affine output, if any.
    pub fn new(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self {
            dim,
            size: (dim.0 + 1) * dim.1,
            act_fn,
            x: Array2::zeros((0, dim.0)),
            z: Array2::zeros((0, dim.1)),
        }
    }

    /// Returns the amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    pub fn act_fn(&self) -> Option<&ActFn> {
        self.act_fn.as_ref()
    }

    /// Makes a forward pass keeping the input and the pre-activation for `backward`.
    ///
    /// # Arguments
    /// * `params` - This layer's parameters.
    /// * `x` - The input, one sample per row.
    ///
    /// # Returns
    /// The activations of the layer.
    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let z = self.affine(params, x)?;
        let a = self.activate(&z);

        self.x = x.to_owned();
        self.z = z;
        Ok(a)
    }

    /// Makes a forward pass without keeping anything around.
    pub fn infer(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let z = self.affine(params, x)?;
        Ok(self.activate(&z))
    }

    /// Backpropagates `d`, the derivative of the loss with respect to this layer's output.
    ///
    /// The parameter gradient is **accumulated** onto `grad`.
    ///
    /// # Returns
    /// The derivative of the loss with respect to this layer's input.
    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        mut d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        self.check_cached_rows(d.nrows())?;

        if let Some(act_fn) = &self.act_fn {
            d.zip_mut_with(&self.z, |d, &z| *d *= act_fn.df(z));
        }

        let (mut dw, mut db) = self.view_grad(grad)?;
        linalg::general_mat_mul(1.0, &self.x.t(), &d, 1.0, &mut dw);
        db.scaled_add(1.0, &d.sum_axis(Axis(0)));

        let (w, _) = self.view_params(params)?;
        Ok(d.dot(&w.t()))
    }

    /// The derivative of the activation at each cached pre-activation, ones when there is no
    /// activation.
    pub fn slopes(&self) -> Array2<f32> {
        match &self.act_fn {
            Some(act_fn) => self.z.mapv(|z| act_fn.df(z)),
            None => Array2::ones(self.z.raw_dim()),
        }
    }

    /// Goes backwards through the cached forward pass of a scalar output, carrying `delta`, the
    /// derivative of the model's output with respect to this layer's output.
    ///
    /// # Returns
    /// A tuple of `q = delta ⊙ slopes` and the derivative with respect to this layer's input.
    pub fn input_grad(
        &self,
        params: &[f32],
        delta: ArrayView2<f32>,
    ) -> Result<(Array2<f32>, Array2<f32>)> {
        self.check_cached_rows(delta.nrows())?;

        let q = &delta * &self.slopes();
        let (w, _) = self.view_params(params)?;
        let delta_in = q.dot(&w.t());
        Ok((q, delta_in))
    }

    /// Accumulates the gradient of a function of the model's input gradient with respect to this
    /// layer's weights.
    ///
    /// The input gradient goes through this layer as `delta_in = q · wᵀ`, so given
    /// `c = ∂P/∂delta_in` the weights get `cᵀ · q` and `(c · w) ⊙ slopes` is carried forward to
    /// the next layer. The slopes are treated as constants, which only holds for piecewise linear
    /// activations, and the biases receive nothing.
    ///
    /// # Arguments
    /// * `params` - This layer's parameters.
    /// * `grad` - This layer's gradient slice.
    /// * `c` - The derivative with respect to this layer's input gradient.
    /// * `q` - As returned by `input_grad`.
    ///
    /// # Returns
    /// The derivative with respect to this layer's output gradient.
    pub fn input_grad_backward(
        &self,
        params: &[f32],
        grad: &mut [f32],
        c: ArrayView2<f32>,
        q: ArrayView2<f32>,
    ) -> Result<Array2<f32>> {
        let (mut dw, _) = self.view_grad(grad)?;
        linalg::general_mat_mul(1.0, &c.t(), &q, 1.0, &mut dw);

        let (w, _) = self.view_params(params)?;
        let c_out = c.dot(&w) * &self.slopes();
        Ok(c_out)
    }

    fn affine(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.dim.0 {
            return Err(MlErr::SizeMismatch {
                what: "dense layer input",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        let (w, b) = self.view_params(params)?;
        Ok(x.dot(&w) + &b)
    }

    fn activate(&self, z: &Array2<f32>) -> Array2<f32> {
        match &self.act_fn {
            Some(act_fn) => z.mapv(|z| act_fn.f(z)),
            None => z.clone(),
        }
    }

    fn check_cached_rows(&self, rows: usize) -> Result<()> {
        if self.z.nrows() == 0 && rows > 0 {
            return Err(MlErr::MissingForward { layer: 0 });
        }

        if self.z.nrows() != rows {
            return Err(MlErr::SizeMismatch {
                what: "dense layer batch",
                got: rows,
                expected: self.z.nrows(),
            });
        }

        Ok(())
    }

    /// Gives a view of the raw gradient slice as the delta weights and delta biases of this layer.
    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        self.check_len("dense layer gradient", grad.len())?;

        let w_size = self.size - self.dim.1;
        let (dw_raw, db_raw) = grad.split_at_mut(w_size);
        let dw = ArrayViewMut2::from_shape(self.dim, dw_raw).map_err(|_| self.mismatch(w_size))?;
        let db = ArrayViewMut1::from_shape(self.dim.1, db_raw).map_err(|_| self.mismatch(w_size))?;
        Ok((dw, db))
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        self.check_len("dense layer parameters", params.len())?;

        let w_size = self.size - self.dim.1;
        let (w_raw, b_raw) = params.split_at(w_size);
        let weights = ArrayView2::from_shape(self.dim, w_raw).map_err(|_| self.mismatch(w_size))?;
        let biases = ArrayView1::from_shape(self.dim.1, b_raw).map_err(|_| self.mismatch(w_size))?;
        Ok((weights, biases))
    }

    fn check_len(&self, what: &'static str, len: usize) -> Result<()> {
        if len != self.size {
            return Err(MlErr::SizeMismatch {
                what,
                got: len,
                expected: self.size,
            });
        }

        Ok(())
    }

    fn mismatch(&self, got: usize) -> MlErr {
        MlErr::SizeMismatch {
            what: "dense layer weights",
            got,
            expected: self.dim.0 * self.dim.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    // w = [[1, 2], [3, 4], [5, 6]], b = [0.5, -0.5]
    const PARAMS: [f32; 8] = [1., 2., 3., 4., 5., 6., 0.5, -0.5];

    #[test]
    fn forward_computes_the_affine_map() {
        let mut dense = Dense::new((3, 2), None);
        let x = array![[1., 0., -1.], [0., 1., 0.]];

        let a = dense.forward(&PARAMS, x.view()).unwrap();

        assert_eq!(a, array![[-3.5, -4.5], [3.5, 3.5]]);
    }

    #[test]
    fn forward_applies_the_activation() {
        let mut dense = Dense::new((3, 2), Some(ActFn::leaky_relu(0.5)));
        let x = array![[1., 0., -1.]];

        let a = dense.forward(&PARAMS, x.view()).unwrap();

        assert_eq!(a, array![[-1.75, -2.25]]);
        assert_eq!(dense.slopes(), array![[0.5, 0.5]]);
    }

    #[test]
    fn forward_rejects_wrong_input_width() {
        let mut dense = Dense::new((3, 2), None);
        let x = array![[1., 0.]];

        let err = dense.forward(&PARAMS, x.view()).unwrap_err();
        assert!(matches!(err, MlErr::SizeMismatch { got: 2, expected: 3, .. }));
    }

    #[test]
    fn backward_before_forward_fails() {
        let mut dense = Dense::new((3, 2), None);
        let mut grad = [0.; 8];

        let err = dense
            .backward(&PARAMS, &mut grad, array![[1., 1.]])
            .unwrap_err();
        assert!(matches!(err, MlErr::MissingForward { .. }));
    }

    #[test]
    fn backward_accumulates_gradients() {
        let mut dense = Dense::new((3, 2), None);
        let x = array![[1., 0., -1.], [0., 1., 0.]];
        let mut grad = [0.; 8];

        dense.forward(&PARAMS, x.view()).unwrap();
        let d_x = dense
            .backward(&PARAMS, &mut grad, array![[1., 0.], [0., 1.]])
            .unwrap();

        // dw = xᵀ · d, db = Σ d, dx = d · wᵀ
        assert_eq!(grad, [1., 0., 0., 1., -1., 0., 1., 1.]);
        assert_eq!(d_x, array![[1., 3., 5.], [2., 4., 6.]]);

        dense.forward(&PARAMS, x.view()).unwrap();
        dense
            .backward(&PARAMS, &mut grad, array![[1., 0.], [0., 1.]])
            .unwrap();
        assert_eq!(grad, [2., 0., 0., 2., -2., 0., 2., 2.]);
    }

    #[test]
    fn infer_leaves_the_cache_alone() {
        let dense = Dense::new((3, 2), Some(ActFn::tanh()));
        let x = array![[0., 0., 0.]];

        let a = dense.infer(&PARAMS, x.view()).unwrap();

        assert!((a[[0, 0]] - 0.5f32.tanh()).abs() < 1e-6);
        assert_eq!(dense.z.nrows(), 0);
    }
}
