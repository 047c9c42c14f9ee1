//! # Projection
//!
//! Out-of-sample mapping for fitted linear methods. A [`ProjectingFunction`]
//! holds a shared handle to immutable fitted state, so it stays valid for as
//! long as the caller keeps it, independently of the run that produced it.

use std::fmt;
use std::sync::Arc;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;

use crate::error::{EmbedError, Result};

/// Fitted state able to map one feature vector into the embedding space.
pub trait ProjectingImplementation: Send + Sync {
    /// Length of the feature vectors the model was fitted on.
    fn input_dimension(&self) -> usize;

    fn output_dimension(&self) -> usize;

    /// Maps `vector`, whose length is [`input_dimension`](Self::input_dimension).
    fn project(&self, vector: ArrayView1<f64>) -> Array1<f64>;
}

/// `y = Pᵀ (x - mean)`.
#[derive(Debug, Clone)]
pub struct MatrixProjection {
    mean: Array1<f64>,
    /// `input_dimension × output_dimension`.
    matrix: Array2<f64>,
}

impl MatrixProjection {
    pub fn new(mean: Array1<f64>, matrix: Array2<f64>) -> anyhow::Result<Self> {
        anyhow::ensure!(
            mean.len() == matrix.nrows(),
            "Mean has {} entries but the projection matrix has {} rows",
            mean.len(),
            matrix.nrows()
        );
        Ok(Self { mean, matrix })
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    /// Projects every row of `x`.
    pub(crate) fn project_rows(&self, x: ArrayView2<f64>) -> Array2<f64> {
        let mut centered = x.to_owned();
        centered
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .for_each(|mut row| {
                row -= &self.mean;
            });
        centered.dot(&self.matrix)
    }
}

impl ProjectingImplementation for MatrixProjection {
    fn input_dimension(&self) -> usize {
        self.matrix.nrows()
    }

    fn output_dimension(&self) -> usize {
        self.matrix.ncols()
    }

    fn project(&self, vector: ArrayView1<f64>) -> Array1<f64> {
        let centered = &vector - &self.mean;
        self.matrix.t().dot(&centered)
    }
}

/// Callable handle applying a fitted transform to unseen points.
#[derive(Clone)]
pub struct ProjectingFunction {
    implementation: Arc<dyn ProjectingImplementation>,
}

impl ProjectingFunction {
    pub fn new(implementation: Arc<dyn ProjectingImplementation>) -> Self {
        Self { implementation }
    }

    pub fn input_dimension(&self) -> usize {
        self.implementation.input_dimension()
    }

    pub fn output_dimension(&self) -> usize {
        self.implementation.output_dimension()
    }

    pub fn apply(&self, vector: ArrayView1<f64>) -> Result<Array1<f64>> {
        let expected = self.implementation.input_dimension();
        if vector.len() != expected {
            return Err(EmbedError::DimensionMismatch {
                expected,
                got: vector.len(),
            });
        }
        Ok(self.implementation.project(vector))
    }

    /// Applies the projection to every row of `x`.
    pub fn apply_batch(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let expected = self.implementation.input_dimension();
        if x.ncols() != expected {
            return Err(EmbedError::DimensionMismatch {
                expected,
                got: x.ncols(),
            });
        }
        let rows: Vec<Array1<f64>> = x
            .axis_iter(Axis(0))
            .into_par_iter()
            .map(|row| self.implementation.project(row))
            .collect();

        let mut result = Array2::zeros((x.nrows(), self.implementation.output_dimension()));
        for (mut target, row) in result.axis_iter_mut(Axis(0)).zip(rows.iter()) {
            target.assign(row);
        }
        Ok(result)
    }
}

impl fmt::Debug for ProjectingFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectingFunction")
            .field("input_dimension", &self.input_dimension())
            .field("output_dimension", &self.output_dimension())
            .finish()
    }
}
