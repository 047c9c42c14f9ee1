use anyhow::ensure;
use log::warn;
use ndarray::{Array1, Array2, Axis};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use super::{Context, Fitted, SpectralArguments};
use crate::eigen::{EigenProblem, Spectrum};
use crate::error::Result;
use crate::utils::{distance_matrix, double_center};

const LANDMARK_SEED: u64 = 42;

/// Classical scaling of a matrix of squared distances: the leading
/// eigenvectors of `-½ H D² H`, each scaled by the square root of its
/// eigenvalue.
pub(super) fn classical_scaling(
    ctx: &Context<'_>,
    mut squared: Array2<f64>,
    target: usize,
) -> Result<Fitted> {
    double_center(&mut squared);
    squared.mapv_inplace(|v| -0.5 * v);

    let eigen = ctx.eigen(EigenProblem::Standard(squared.view()), target, Spectrum::Largest)?;
    let mut embedding = eigen.vectors;
    for (mut column, &lambda) in embedding.axis_iter_mut(Axis(1)).zip(eigen.values.iter()) {
        if lambda < 0.0 {
            warn!(
                "Negative eigenvalue {:.3e} in classical scaling, the distances are not Euclidean",
                lambda
            );
        }
        let scale = lambda.max(0.0).sqrt();
        column.mapv_inplace(|v| v * scale);
    }
    Ok(Fitted::new(embedding, eigen.values))
}

/// Sorted landmark indices drawn without replacement. At least `target + 1`
/// landmarks are taken so the landmark configuration can span the target
/// space.
pub(super) fn landmarks(n: usize, ratio: f64, target: usize) -> Vec<usize> {
    let wanted = (n as f64 * ratio).ceil() as usize;
    let count = wanted.max(target + 1).min(n);
    let mut rng = ChaCha8Rng::seed_from_u64(LANDMARK_SEED);
    let mut chosen = rand::seq::index::sample(&mut rng, n, count).into_vec();
    chosen.sort_unstable();
    chosen
}

/// Landmark scaling: classical scaling of the landmarks, then every point is
/// placed by distance-based triangulation against them.
///
/// `to_landmarks` holds one row per landmark with its distances to all points.
fn triangulate(
    to_landmarks: &Array2<f64>,
    landmarks: &[usize],
    eigenvectors: &Array2<f64>,
    eigenvalues: &Array1<f64>,
) -> anyhow::Result<Array2<f64>> {
    let target = eigenvalues.len();
    for (j, &lambda) in eigenvalues.iter().enumerate() {
        ensure!(
            lambda > f64::EPSILON,
            "Landmark configuration has no positive eigenvalue in direction {} ({:.3e})",
            j,
            lambda
        );
    }

    let squared = to_landmarks.mapv(|d| d * d);
    let between = squared.select(Axis(1), landmarks);
    let mean = between
        .mean_axis(Axis(1))
        .unwrap_or_else(|| Array1::zeros(landmarks.len()));

    // pseudo-inverse transpose of the landmark coordinates
    let mut pseudo = eigenvectors.t().to_owned();
    for (mut row, &lambda) in pseudo.axis_iter_mut(Axis(0)).zip(eigenvalues.iter()) {
        row.mapv_inplace(|v| v / lambda.sqrt());
    }

    let n = squared.ncols();
    let mut embedding = Array2::zeros((n, target));
    embedding
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(a, mut row)| {
            let offsets = &squared.column(a) - &mean;
            row.assign(&(pseudo.dot(&offsets) * -0.5));
        });
    Ok(embedding)
}

/// Runs landmark scaling given the distances from every landmark to every
/// point.
pub(super) fn landmark_scaling(
    ctx: &Context<'_>,
    to_landmarks: Array2<f64>,
    landmarks: &[usize],
    target: usize,
) -> Result<Fitted> {
    let mut between = to_landmarks.select(Axis(1), landmarks).mapv(|d| d * d);
    double_center(&mut between);
    between.mapv_inplace(|v| -0.5 * v);

    let eigen = ctx.eigen(EigenProblem::Standard(between.view()), target, Spectrum::Largest)?;
    let embedding = triangulate(&to_landmarks, landmarks, &eigen.vectors, &eigen.values)
        .map_err(|e| ctx.embedding_failure(e))?;
    Ok(Fitted::new(embedding, eigen.values))
}

pub(super) fn multidimensional_scaling(
    ctx: &Context<'_>,
    spectral: SpectralArguments,
) -> Result<Fitted> {
    let distances = distance_matrix(ctx.n_points(), ctx.distance()?);
    classical_scaling(ctx, distances.mapv(|d| d * d), spectral.target_dimension)
}

pub(super) fn landmark_multidimensional_scaling(
    ctx: &Context<'_>,
    spectral: SpectralArguments,
    ratio: f64,
) -> Result<Fitted> {
    let n = ctx.n_points();
    let distance = ctx.distance()?;
    let chosen = landmarks(n, ratio, spectral.target_dimension);

    let mut to_landmarks = Array2::zeros((chosen.len(), n));
    to_landmarks
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(chosen.par_iter())
        .for_each(|(mut row, &landmark)| {
            for (j, value) in row.iter_mut().enumerate() {
                *value = if j == landmark { 0.0 } else { distance.distance(landmark, j) };
            }
        });

    landmark_scaling(ctx, to_landmarks, &chosen, spectral.target_dimension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eigen::{DenseSolver, EigenSolver};
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_landmarks_are_sorted_unique_and_reproducible() {
        let first = landmarks(50, 0.2, 2);
        assert_eq!(first.len(), 10);
        assert!(first.windows(2).all(|w| w[0] < w[1]));
        assert!(first.iter().all(|&i| i < 50));
        assert_eq!(first, landmarks(50, 0.2, 2));

        // never fewer than target + 1
        assert_eq!(landmarks(50, 0.01, 3).len(), 4);
        assert_eq!(landmarks(5, 1.0, 2).len(), 5);
    }

    #[test]
    fn test_triangulation_places_landmarks_at_their_coordinates() {
        // points on a plane, every point a landmark
        let points = Array2::from_shape_fn((6, 2), |(i, j)| ((i * (j + 2)) % 7) as f64);
        let n = points.nrows();
        let to_landmarks = Array2::from_shape_fn((n, n), |(a, b)| {
            let diff = &points.row(a) - &points.row(b);
            diff.dot(&diff).sqrt()
        });
        let all: Vec<usize> = (0..n).collect();

        let mut b = to_landmarks.mapv(|d| d * d);
        double_center(&mut b);
        b.mapv_inplace(|v| -0.5 * v);
        let eigen = DenseSolver
            .solve(&EigenProblem::Standard(b.view()), 2, Spectrum::Largest)
            .unwrap();

        let embedding = triangulate(&to_landmarks, &all, &eigen.vectors, &eigen.values).unwrap();
        for j in 0..2 {
            let scale = eigen.values[j].sqrt();
            for a in 0..n {
                let expected = eigen.vectors[[a, j]] * scale;
                assert_abs_diff_eq!(embedding[[a, j]], expected, epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn test_triangulation_rejects_degenerate_landmarks() {
        let to_landmarks = Array2::<f64>::zeros((3, 5));
        let vectors = Array2::<f64>::zeros((3, 1));
        let values = Array1::from(vec![0.0]);
        assert!(triangulate(&to_landmarks, &[0, 1, 2], &vectors, &values).is_err());
    }
}
