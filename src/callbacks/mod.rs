//! # Callbacks
//!
//! Data is only reachable through callbacks over point indices `0..n`. A
//! method declares which of the three capabilities it needs (kernel, distance,
//! feature vectors) and the caller supplies at least those in a [`Callbacks`]
//! bundle.
//!
//! Ready-made implementations over a dense `samples × features` matrix are
//! provided for the common cases.

use std::fmt;

use ndarray::{ArrayView1, ArrayView2, ArrayViewMut1};

/// A callback kind a method may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    Kernel,
    Distance,
    Features,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Kernel => "kernel",
            Capability::Distance => "distance",
            Capability::Features => "feature vector access",
        };
        f.write_str(name)
    }
}

/// Mercer kernel between two points.
pub trait KernelCallback: Send + Sync {
    fn kernel(&self, a: usize, b: usize) -> f64;
}

/// Distance between two points.
pub trait DistanceCallback: Send + Sync {
    fn distance(&self, a: usize, b: usize) -> f64;
}

/// Dense feature vector of a point.
pub trait FeatureVectorCallback: Send + Sync {
    /// Length of every feature vector.
    fn dimension(&self) -> usize;

    /// Writes the features of `index` into `out`, which has length
    /// [`dimension`](Self::dimension).
    fn vector(&self, index: usize, out: ArrayViewMut1<f64>);
}

/// The callbacks a caller supplies for one run, together with the number of
/// points they range over.
#[derive(Clone, Copy)]
pub struct Callbacks<'a> {
    n_points: usize,
    kernel: Option<&'a dyn KernelCallback>,
    distance: Option<&'a dyn DistanceCallback>,
    features: Option<&'a dyn FeatureVectorCallback>,
}

impl<'a> Callbacks<'a> {
    pub fn new(n_points: usize) -> Self {
        Callbacks {
            n_points,
            kernel: None,
            distance: None,
            features: None,
        }
    }

    pub fn with_kernel(mut self, kernel: &'a dyn KernelCallback) -> Self {
        self.kernel = Some(kernel);
        self
    }

    pub fn with_distance(mut self, distance: &'a dyn DistanceCallback) -> Self {
        self.distance = Some(distance);
        self
    }

    pub fn with_features(mut self, features: &'a dyn FeatureVectorCallback) -> Self {
        self.features = Some(features);
        self
    }

    pub fn n_points(&self) -> usize {
        self.n_points
    }

    pub fn kernel(&self) -> Option<&'a dyn KernelCallback> {
        self.kernel
    }

    pub fn distance(&self) -> Option<&'a dyn DistanceCallback> {
        self.distance
    }

    pub fn features(&self) -> Option<&'a dyn FeatureVectorCallback> {
        self.features
    }

    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::Kernel => self.kernel.is_some(),
            Capability::Distance => self.distance.is_some(),
            Capability::Features => self.features.is_some(),
        }
    }

    pub fn capabilities(&self) -> Vec<Capability> {
        [Capability::Kernel, Capability::Distance, Capability::Features]
            .into_iter()
            .filter(|c| self.has(*c))
            .collect()
    }

    /// Capabilities from `required` that this bundle lacks, in order.
    pub fn missing(&self, required: &[Capability]) -> Vec<Capability> {
        required.iter().copied().filter(|c| !self.has(*c)).collect()
    }
}

impl fmt::Debug for Callbacks<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("n_points", &self.n_points)
            .field("capabilities", &self.capabilities())
            .finish()
    }
}

/// Adapts a closure into a [`KernelCallback`].
pub struct KernelFn<F>(pub F);

impl<F> KernelCallback for KernelFn<F>
where
    F: Fn(usize, usize) -> f64 + Send + Sync,
{
    fn kernel(&self, a: usize, b: usize) -> f64 {
        (self.0)(a, b)
    }
}

pub fn kernel_fn<F>(f: F) -> KernelFn<F>
where
    F: Fn(usize, usize) -> f64 + Send + Sync,
{
    KernelFn(f)
}

/// Adapts a closure into a [`DistanceCallback`].
pub struct DistanceFn<F>(pub F);

impl<F> DistanceCallback for DistanceFn<F>
where
    F: Fn(usize, usize) -> f64 + Send + Sync,
{
    fn distance(&self, a: usize, b: usize) -> f64 {
        (self.0)(a, b)
    }
}

pub fn distance_fn<F>(f: F) -> DistanceFn<F>
where
    F: Fn(usize, usize) -> f64 + Send + Sync,
{
    DistanceFn(f)
}

/// Rows of a `samples × features` matrix as feature vectors.
#[derive(Debug, Clone, Copy)]
pub struct FeatureMatrix<'a> {
    data: ArrayView2<'a, f64>,
}

impl<'a> FeatureMatrix<'a> {
    pub fn new(data: ArrayView2<'a, f64>) -> Self {
        Self { data }
    }

    pub fn n_samples(&self) -> usize {
        self.data.nrows()
    }
}

impl FeatureVectorCallback for FeatureMatrix<'_> {
    fn dimension(&self) -> usize {
        self.data.ncols()
    }

    fn vector(&self, index: usize, mut out: ArrayViewMut1<f64>) {
        out.assign(&self.data.row(index));
    }
}

/// Dot product of two rows.
#[derive(Debug, Clone, Copy)]
pub struct LinearKernel<'a> {
    data: ArrayView2<'a, f64>,
}

impl<'a> LinearKernel<'a> {
    pub fn new(data: ArrayView2<'a, f64>) -> Self {
        Self { data }
    }
}

impl KernelCallback for LinearKernel<'_> {
    fn kernel(&self, a: usize, b: usize) -> f64 {
        self.data.row(a).dot(&self.data.row(b))
    }
}

/// `exp(-||a - b||^2 / width)` between two rows.
#[derive(Debug, Clone, Copy)]
pub struct GaussianKernel<'a> {
    data: ArrayView2<'a, f64>,
    width: f64,
}

impl<'a> GaussianKernel<'a> {
    pub fn new(data: ArrayView2<'a, f64>, width: f64) -> Self {
        Self { data, width }
    }
}

impl KernelCallback for GaussianKernel<'_> {
    fn kernel(&self, a: usize, b: usize) -> f64 {
        let squared = squared_euclidean(self.data.row(a), self.data.row(b));
        (-squared / self.width).exp()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EuclideanDistance<'a> {
    data: ArrayView2<'a, f64>,
}

impl<'a> EuclideanDistance<'a> {
    pub fn new(data: ArrayView2<'a, f64>) -> Self {
        Self { data }
    }
}

impl DistanceCallback for EuclideanDistance<'_> {
    fn distance(&self, a: usize, b: usize) -> f64 {
        squared_euclidean(self.data.row(a), self.data.row(b)).sqrt()
    }
}

/// A square matrix of precomputed pairwise values, usable as either a kernel
/// or a distance.
#[derive(Debug, Clone, Copy)]
pub struct PrecomputedMatrix<'a> {
    values: ArrayView2<'a, f64>,
}

impl<'a> PrecomputedMatrix<'a> {
    pub fn new(values: ArrayView2<'a, f64>) -> anyhow::Result<Self> {
        if values.nrows() != values.ncols() {
            anyhow::bail!(
                "Precomputed matrix must be square, got {} x {}",
                values.nrows(),
                values.ncols()
            );
        }
        Ok(Self { values })
    }
}

impl KernelCallback for PrecomputedMatrix<'_> {
    fn kernel(&self, a: usize, b: usize) -> f64 {
        self.values[[a, b]]
    }
}

impl DistanceCallback for PrecomputedMatrix<'_> {
    fn distance(&self, a: usize, b: usize) -> f64 {
        self.values[[a, b]]
    }
}

fn squared_euclidean(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    let mut squared_dist = 0.0;
    for i in 0..a.len() {
        let diff = a[i] - b[i];
        squared_dist += diff * diff;
    }
    squared_dist
}
