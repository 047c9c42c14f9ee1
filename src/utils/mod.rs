use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;

use crate::callbacks::{DistanceCallback, FeatureVectorCallback, KernelCallback};

/// Fills a symmetric `n × n` matrix from a pairwise function, evaluating only
/// the upper triangle.
pub(crate) fn symmetric_matrix<F>(n: usize, f: F) -> Array2<f64>
where
    F: Fn(usize, usize) -> f64 + Sync,
{
    let rows: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|i| (i..n).map(|j| f(i, j)).collect())
        .collect();

    let mut matrix = Array2::zeros((n, n));
    for (i, row) in rows.into_iter().enumerate() {
        for (offset, value) in row.into_iter().enumerate() {
            let j = i + offset;
            matrix[[i, j]] = value;
            matrix[[j, i]] = value;
        }
    }
    matrix
}

pub(crate) fn kernel_matrix(n: usize, kernel: &dyn KernelCallback) -> Array2<f64> {
    symmetric_matrix(n, |i, j| kernel.kernel(i, j))
}

pub(crate) fn distance_matrix(n: usize, distance: &dyn DistanceCallback) -> Array2<f64> {
    symmetric_matrix(n, |i, j| if i == j { 0.0 } else { distance.distance(i, j) })
}

/// Gathers every feature vector into a `n × dimension` matrix.
pub(crate) fn feature_matrix(n: usize, features: &dyn FeatureVectorCallback) -> Array2<f64> {
    let mut matrix = Array2::zeros((n, features.dimension()));
    matrix
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(i, row)| features.vector(i, row));
    matrix
}

/// Subtracts the column means from every row and returns them.
pub(crate) fn center_columns(matrix: &mut Array2<f64>) -> Array1<f64> {
    let mean = matrix
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(matrix.ncols()));
    matrix
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .for_each(|mut row| {
            row -= &mean;
        });
    mean
}

/// Double centering `H M H` with `H = I - 11ᵀ/n`.
pub(crate) fn double_center(matrix: &mut Array2<f64>) {
    let n = matrix.nrows();
    if n == 0 {
        return;
    }
    let row_means = matrix.mean_axis(Axis(1)).unwrap_or_else(|| Array1::zeros(n));
    let col_means = matrix.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(n));
    let grand_mean = row_means.mean().unwrap_or(0.0);

    matrix.indexed_iter_mut().for_each(|((i, j), value)| {
        *value += grand_mean - row_means[i] - col_means[j];
    });
}

/// `Xᵀ M X`.
pub(crate) fn sandwich(x: &Array2<f64>, m: &Array2<f64>) -> Array2<f64> {
    x.t().dot(&m.dot(x))
}
