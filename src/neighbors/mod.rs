//! # Neighbor Search
//!
//! k-nearest-neighbor back-ends used by local methods. A finder receives the
//! point count, the neighbor count and a [`NeighborMetric`] built from the
//! caller's callbacks, and returns for every point the indices of its `k`
//! nearest other points ordered from closest to farthest. Ties are broken by
//! the smaller index so that every exact back-end returns the same lists.

use std::cmp::Ordering;

use anyhow::{bail, ensure};
use rayon::prelude::*;

use crate::callbacks::{DistanceCallback, KernelCallback};

mod vptree;

pub use vptree::VpTree;

/// Neighbors of one point, closest first. Never contains the point itself.
pub type LocalNeighbors = Vec<usize>;
pub type Neighbors = Vec<LocalNeighbors>;

/// Dissimilarity used to rank neighbors.
#[derive(Clone, Copy)]
pub enum NeighborMetric<'a> {
    Distance(&'a dyn DistanceCallback),
    /// Distance induced by a kernel in its feature space,
    /// `sqrt(k(a, a) + k(b, b) - 2 k(a, b))`.
    Kernel(&'a dyn KernelCallback),
}

impl NeighborMetric<'_> {
    pub fn distance(&self, a: usize, b: usize) -> f64 {
        match self {
            NeighborMetric::Distance(distance) => distance.distance(a, b),
            NeighborMetric::Kernel(kernel) => {
                let squared = kernel.kernel(a, a) + kernel.kernel(b, b) - 2.0 * kernel.kernel(a, b);
                squared.max(0.0).sqrt()
            }
        }
    }
}

pub trait NeighborFinder: Send + Sync {
    fn find_neighbors(
        &self,
        n_points: usize,
        k: usize,
        metric: &NeighborMetric<'_>,
    ) -> anyhow::Result<Neighbors>;
}

/// Candidate neighbor ordered by distance, then index.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate {
    pub distance: f64,
    pub index: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.index.cmp(&other.index))
    }
}

pub(crate) fn check_request(n_points: usize, k: usize) -> anyhow::Result<()> {
    ensure!(k > 0, "Number of neighbors must be positive");
    ensure!(
        k < n_points,
        "Cannot find {} neighbors among {} points",
        k,
        n_points
    );
    Ok(())
}

/// Compares every pair of points.
#[derive(Debug, Clone, Copy, Default)]
pub struct BruteForce;

impl NeighborFinder for BruteForce {
    fn find_neighbors(
        &self,
        n_points: usize,
        k: usize,
        metric: &NeighborMetric<'_>,
    ) -> anyhow::Result<Neighbors> {
        check_request(n_points, k)?;

        (0..n_points)
            .into_par_iter()
            .map(|i| -> anyhow::Result<LocalNeighbors> {
                let mut candidates = Vec::with_capacity(n_points - 1);
                for j in (0..n_points).filter(|&j| j != i) {
                    let distance = metric.distance(i, j);
                    if distance.is_nan() {
                        bail!("Distance between points {} and {} is NaN", i, j);
                    }
                    candidates.push(Candidate { distance, index: j });
                }
                if k < candidates.len() {
                    candidates.select_nth_unstable(k - 1);
                    candidates.truncate(k);
                }
                candidates.sort_unstable();
                Ok(candidates.into_iter().map(|c| c.index).collect())
            })
            .collect()
    }
}
