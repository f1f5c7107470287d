//! Small dense linear algebra helpers for feature whitening
//!
//! Feature matrices live in ndarray; the eigen-decomposition is delegated
//! to nalgebra.

use nalgebra::DMatrix;
use ndarray::{Array1, Array2, ArrayView2, Axis};

/// Eigen-decomposition of a symmetric matrix
///
/// Returns `(eigenvalues, eigenvectors)` where column `i` of the second
/// matrix is the eigenvector of eigenvalue `i`. Eigenvalues are not sorted.
pub fn symmetric_eigen(matrix: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let n = matrix.nrows();
    let eigen = DMatrix::from_fn(n, n, |i, j| matrix[[i, j]]).symmetric_eigen();

    let values = Array1::from_iter(eigen.eigenvalues.iter().copied());
    let vectors = Array2::from_shape_fn((n, n), |(i, j)| eigen.eigenvectors[(i, j)]);
    (values, vectors)
}

/// Population covariance of the columns of `rows`, around `mean`
pub fn covariance(rows: &[ArrayView2<'_, f64>], mean: &Array1<f64>) -> Array2<f64> {
    let dims = mean.len();
    let mut cov = Array2::<f64>::zeros((dims, dims));
    let mut count = 0usize;

    for block in rows {
        for row in block.axis_iter(Axis(0)) {
            let centered = &row - mean;
            for i in 0..dims {
                for j in i..dims {
                    cov[[i, j]] += centered[i] * centered[j];
                }
            }
            count += 1;
        }
    }

    if count > 0 {
        cov.mapv_inplace(|x| x / count as f64);
    }
    for i in 0..dims {
        for j in 0..i {
            cov[[i, j]] = cov[[j, i]];
        }
    }
    cov
}
