use machine_learning::MlErr;
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use ndarray::{ArrayView2, ArrayView4};

use super::{FeatureExtractor, prepare};
use crate::{GanErr, Result};

/// Computes the Fréchet distance between the Gaussians fitted to two feature sets, one sample
/// per row: `‖μ_r - μ_f‖² + tr(Σ_r + Σ_f - 2·(Σ_r Σ_f)^½)`.
///
/// The covariances are unbiased. `tr((Σ_r Σ_f)^½)` is taken as `tr((Σ_r^½ Σ_f Σ_r^½)^½)`, which
/// only needs symmetric square roots and is real.
pub fn frechet_distance(real: ArrayView2<f32>, fake: ArrayView2<f32>) -> Result<f64> {
    if real.ncols() != fake.ncols() {
        return Err(MlErr::SizeMismatch {
            what: "feature width",
            got: fake.ncols(),
            expected: real.ncols(),
        }
        .into());
    }

    let (mu_r, sigma_r) = gaussian(real)?;
    let (mu_f, sigma_f) = gaussian(fake)?;

    let diff = mu_r - mu_f;
    let sqrt_r = sqrt_psd(sigma_r.clone());
    let inner = &sqrt_r * &sigma_f * &sqrt_r;
    let inner = (&inner + inner.transpose()) * 0.5;
    let tr_covmean: f64 = SymmetricEigen::new(inner)
        .eigenvalues
        .iter()
        .map(|l| l.max(0.).sqrt())
        .sum();

    Ok(diff.dot(&diff) + sigma_r.trace() + sigma_f.trace() - 2. * tr_covmean)
}

/// Extracts the features of both image sets and computes their Fréchet distance.
///
/// Both sets are prepared like the classifier's training images.
pub fn fid<E: FeatureExtractor + ?Sized>(
    extractor: &E,
    real: ArrayView4<f32>,
    fake: ArrayView4<f32>,
) -> Result<f64> {
    let size = extractor.input_size();
    let real = extractor.features(prepare(real, size).view())?;
    let fake = extractor.features(prepare(fake, size).view())?;
    frechet_distance(real.view(), fake.view())
}

fn gaussian(x: ArrayView2<f32>) -> Result<(DVector<f64>, DMatrix<f64>)> {
    let (n, d) = x.dim();

    if n < 2 {
        return Err(GanErr::InvalidConfig(format!(
            "a covariance needs at least 2 samples, got {n}"
        )));
    }

    let x = DMatrix::from_fn(n, d, |i, j| f64::from(x[[i, j]]));
    let mu = x.row_mean().transpose();
    let centered = DMatrix::from_fn(n, d, |i, j| x[(i, j)] - mu[j]);
    let sigma = centered.transpose() * &centered / (n - 1) as f64;

    Ok((mu, sigma))
}

/// The square root of a positive semi definite matrix, negative round off clamped to 0.
fn sqrt_psd(m: DMatrix<f64>) -> DMatrix<f64> {
    let eigen = SymmetricEigen::new(m);
    let roots = eigen.eigenvalues.map(|l| l.max(0.).sqrt());
    let v = &eigen.eigenvectors;
    v * DMatrix::from_diagonal(&roots) * v.transpose()
}

#[cfg(test)]
mod tests {
    use ndarray::{Array2, array};

    use super::*;

    fn features() -> Array2<f32> {
        array![[1., 2., 0.], [3., -1., 1.], [0., 0., 2.], [2., 5., -1.], [-1., 1., 1.]]
    }

    #[test]
    fn identical_sets_are_at_distance_zero() {
        let x = features();

        let d = frechet_distance(x.view(), x.view()).unwrap();

        assert!(d.abs() < 1e-6, "{d}");
    }

    #[test]
    fn shifting_the_mean_adds_its_squared_norm() {
        let x = features();
        let shifted = &x + &array![[3., 4., 0.]];

        let d = frechet_distance(x.view(), shifted.view()).unwrap();

        assert!((d - 25.).abs() < 1e-6, "{d}");
    }

    #[test]
    fn one_dimensional_gaussians() {
        // var 1 vs var 4: (1 - 2)² = 1
        let real = array![[-1.], [1.]].mapv(|v: f32| v / 2f32.sqrt());
        let fake = array![[-2.], [2.]].mapv(|v: f32| v / 2f32.sqrt());

        let d = frechet_distance(real.view(), fake.view()).unwrap();

        assert!((d - 1.).abs() < 1e-5, "{d}");
    }

    #[test]
    fn too_few_samples_or_mismatched_widths_fail() {
        let one = array![[1f32, 2.]];
        let two = array![[1f32, 2.], [3., 4.]];
        let narrow = array![[1f32], [2.]];

        assert!(frechet_distance(one.view(), two.view()).is_err());
        assert!(frechet_distance(two.view(), narrow.view()).is_err());
    }
}
