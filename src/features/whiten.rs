//! Feature whitening
//!
//! Whitening decorrelates and rescales feature dimensions so that Euclidean
//! distances between rows are not dominated by a few loud coefficients.
//! A [`Whitener`] is fitted once over the whole corpus and then applied to
//! every track, so all tracks share one feature space.

use super::linalg::{covariance, symmetric_eigen};
use super::FeatureMatrix;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Eigenvalues at or below this are treated as empty directions
const EIGEN_FLOOR: f64 = 1e-10;

/// Deviations at or below this leave the column unscaled
const STD_FLOOR: f64 = 1e-12;

/// How the whitening transform is estimated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhiteningMethod {
    /// Zero-phase component analysis: center, then multiply by `C^{-1/2}`
    #[default]
    Zca,
    /// Column 0 standardized alone, remaining columns standardized jointly
    Timbre,
}

/// A fitted affine transform `x -> (x - mean) * transform`
#[derive(Debug, Clone)]
pub struct Whitener {
    mean: Array1<f64>,
    transform: Array2<f64>,
}

impl Whitener {
    /// Transform that leaves `dims`-column matrices unchanged
    pub fn identity(dims: usize) -> Self {
        Self {
            mean: Array1::zeros(dims),
            transform: Array2::eye(dims),
        }
    }

    /// Estimate the transform from all rows of `matrices`
    ///
    /// Falls back to the identity when fewer than two rows are available or
    /// the matrices disagree on their column count.
    pub fn fit(method: WhiteningMethod, matrices: &[&FeatureMatrix]) -> Self {
        let dims = matrices.first().map(|m| m.ncols()).unwrap_or(0);
        if matrices.iter().any(|m| m.ncols() != dims) {
            return Self::identity(dims);
        }
        let rows: usize = matrices.iter().map(|m| m.nrows()).sum();
        if rows < 2 || dims == 0 {
            return Self::identity(dims);
        }

        match method {
            WhiteningMethod::Zca => Self::fit_zca(matrices, dims, rows),
            WhiteningMethod::Timbre => Self::fit_timbre(matrices, dims, rows),
        }
    }

    fn fit_zca(matrices: &[&FeatureMatrix], dims: usize, rows: usize) -> Self {
        let mut mean = Array1::<f64>::zeros(dims);
        for m in matrices {
            mean += &m.sum_axis(Axis(0));
        }
        mean /= rows as f64;

        let views: Vec<_> = matrices.iter().map(|m| m.view()).collect();
        let cov = covariance(&views, &mean);
        let (values, vectors) = symmetric_eigen(&cov);

        let scales = values.mapv(|v| if v > EIGEN_FLOOR { 1.0 / v.sqrt() } else { 0.0 });
        let transform = vectors.dot(&Array2::from_diag(&scales)).dot(&vectors.t());

        Self { mean, transform }
    }

    fn fit_timbre(matrices: &[&FeatureMatrix], dims: usize, rows: usize) -> Self {
        let first: Vec<f64> = matrices.iter().flat_map(|m| m.column(0).to_vec()).collect();
        let rest: Vec<f64> = matrices
            .iter()
            .flat_map(|m| m.slice(ndarray::s![.., 1..]).iter().copied().collect::<Vec<_>>())
            .collect();
        debug_assert_eq!(first.len(), rows);

        let (mean0, std0) = mean_std(&first);
        let (mean_rest, std_rest) = mean_std(&rest);

        let mut mean = Array1::from_elem(dims, mean_rest);
        mean[0] = mean0;
        let mut scales = Array1::from_elem(dims, inverse_or_one(std_rest));
        scales[0] = inverse_or_one(std0);

        Self {
            mean,
            transform: Array2::from_diag(&scales),
        }
    }

    /// Apply the transform to a matrix with the fitted column count
    pub fn apply(&self, matrix: &FeatureMatrix) -> FeatureMatrix {
        if matrix.ncols() != self.mean.len() {
            return matrix.clone();
        }
        (matrix - &self.mean).dot(&self.transform)
    }
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, var.sqrt())
}

fn inverse_or_one(std: f64) -> f64 {
    if std > STD_FLOOR {
        1.0 / std
    } else {
        1.0
    }
}

/// Whiten a matrix against its own statistics (ZCA)
///
/// The output has the same shape. Matrices with fewer than two rows are
/// returned unchanged.
pub fn whiten(matrix: &FeatureMatrix) -> FeatureMatrix {
    whiten_with(WhiteningMethod::default(), matrix)
}

/// Whiten a matrix against its own statistics with the given method
pub fn whiten_with(method: WhiteningMethod, matrix: &FeatureMatrix) -> FeatureMatrix {
    if matrix.nrows() < 2 {
        return matrix.clone();
    }
    Whitener::fit(method, &[matrix]).apply(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample_matrix() -> FeatureMatrix {
        array![
            [10.0, 1.0, 2.0],
            [12.0, 2.0, 1.5],
            [9.0, 0.5, 3.0],
            [15.0, 3.0, 0.5],
            [11.0, 1.5, 2.5],
            [13.0, 2.5, 1.0],
        ]
    }

    fn max_abs_diff(a: &FeatureMatrix, b: &FeatureMatrix) -> f64 {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, f64::max)
    }

    #[test]
    fn test_whiten_preserves_shape() {
        let m = sample_matrix();
        assert_eq!(whiten(&m).dim(), m.dim());
        assert_eq!(whiten_with(WhiteningMethod::Timbre, &m).dim(), m.dim());
    }

    #[test]
    fn test_zca_output_has_identity_covariance() {
        let white = whiten(&sample_matrix());
        let mean = white.mean_axis(Axis(0)).unwrap();
        for m in mean.iter() {
            assert!(m.abs() < 1e-9);
        }
        let cov = covariance(&[white.view()], &mean);
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((cov[[i, j]] - expected).abs() < 1e-6, "cov[{i},{j}] = {}", cov[[i, j]]);
            }
        }
    }

    #[test]
    fn test_whiten_is_idempotent() {
        for method in [WhiteningMethod::Zca, WhiteningMethod::Timbre] {
            let once = whiten_with(method, &sample_matrix());
            let twice = whiten_with(method, &once);
            assert!(max_abs_diff(&once, &twice) < 1e-6, "{:?} is not idempotent", method);
        }
    }

    #[test]
    fn test_whiten_handles_constant_column() {
        let m = array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0]];
        let white = whiten(&m);
        assert!(white.iter().all(|v| v.is_finite()));
        assert!(white.column(1).iter().all(|v| v.abs() < 1e-9));
        let again = whiten(&white);
        assert!(max_abs_diff(&white, &again) < 1e-6);
    }

    #[test]
    fn test_single_row_unchanged() {
        let m = array![[1.0, 2.0, 3.0]];
        assert_eq!(whiten(&m), m);
    }

    #[test]
    fn test_corpus_fit_applies_shared_transform() {
        let a = array![[0.0, 0.0], [2.0, 2.0]];
        let b = array![[4.0, 4.0], [6.0, 6.0]];
        let whitener = Whitener::fit(WhiteningMethod::Timbre, &[&a, &b]);
        let wa = whitener.apply(&a);
        let wb = whitener.apply(&b);
        // b sits above a in the shared space
        assert!(wb[[0, 0]] > wa[[1, 0]]);
    }
}
