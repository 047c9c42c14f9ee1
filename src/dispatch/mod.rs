//! # Dispatch
//!
//! Entry point of the crate. [`Dispatcher::embed`] validates a method, its
//! parameters and the supplied callbacks against the method's descriptor,
//! then runs neighbor search, eigendecomposition and the embedding routine.
//!
//! Every validation step finishes before any collaborator is invoked, so a
//! rejected request never triggers a neighbor search or a decomposition.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info};
use ndarray::{Array1, Array2};

use crate::callbacks::{Callbacks, Capability};
use crate::eigen::{DenseSolver, EigenSolver, LanczosSolver, RandomizedSolver};
use crate::error::{EmbedError, Result, Stage};
use crate::methods::{lookup, EigenMethod, NeighborsMethod, ReductionMethod};
use crate::neighbors::{BruteForce, NeighborFinder, NeighborMetric, VpTree};
use crate::parameters::{ParameterKey, ParametersMap};
use crate::projection::ProjectingFunction;
use crate::routines::{Context, Routine};

/// Coordinates of every point in the target space, one row per point, and
/// the eigenvalues belonging to the embedding directions (empty for methods
/// without an eigenproblem).
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    pub embedding: Array2<f64>,
    pub eigenvalues: Array1<f64>,
}

/// What a successful run returns. The projection is present for methods that
/// learn an explicit linear map.
#[derive(Debug, Clone)]
pub struct EmbeddingOutput {
    pub result: EmbeddingResult,
    pub projection: Option<ProjectingFunction>,
}

/// Holds the neighbor finders and eigensolvers that back the
/// [`NeighborsMethod`] and [`EigenMethod`] selectors.
pub struct Dispatcher {
    neighbor_finders: HashMap<NeighborsMethod, Arc<dyn NeighborFinder>>,
    eigen_solvers: HashMap<EigenMethod, Arc<dyn EigenSolver>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        let mut neighbor_finders: HashMap<NeighborsMethod, Arc<dyn NeighborFinder>> =
            HashMap::new();
        neighbor_finders.insert(NeighborsMethod::BruteForce, Arc::new(BruteForce));
        neighbor_finders.insert(NeighborsMethod::VpTree, Arc::new(VpTree));

        let mut eigen_solvers: HashMap<EigenMethod, Arc<dyn EigenSolver>> = HashMap::new();
        eigen_solvers.insert(EigenMethod::Lanczos, Arc::new(LanczosSolver::default()));
        eigen_solvers.insert(EigenMethod::Randomized, Arc::new(RandomizedSolver::default()));
        eigen_solvers.insert(EigenMethod::Dense, Arc::new(DenseSolver));

        Self {
            neighbor_finders,
            eigen_solvers,
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut finders: Vec<_> = self.neighbor_finders.keys().collect();
        finders.sort();
        let mut solvers: Vec<_> = self.eigen_solvers.keys().collect();
        solvers.sort();
        f.debug_struct("Dispatcher")
            .field("neighbor_finders", &finders)
            .field("eigen_solvers", &solvers)
            .finish()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the back-end selected by `method`.
    pub fn with_neighbor_finder<F>(mut self, method: NeighborsMethod, finder: F) -> Self
    where
        F: NeighborFinder + 'static,
    {
        self.neighbor_finders.insert(method, Arc::new(finder));
        self
    }

    /// Replaces the back-end selected by `method`. The replacement decides on
    /// its own whether it accepts generalized problems.
    pub fn with_eigen_solver<S>(mut self, method: EigenMethod, solver: S) -> Self
    where
        S: EigenSolver + 'static,
    {
        self.eigen_solvers.insert(method, Arc::new(solver));
        self
    }

    fn eigen_solver(&self, method: EigenMethod) -> Result<&dyn EigenSolver> {
        self.eigen_solvers
            .get(&method)
            .map(|solver| solver.as_ref())
            .ok_or_else(|| EmbedError::UnknownMethod(method.to_string()))
    }

    fn neighbor_finder(&self, method: NeighborsMethod) -> Result<&dyn NeighborFinder> {
        self.neighbor_finders
            .get(&method)
            .map(|finder| finder.as_ref())
            .ok_or_else(|| EmbedError::UnknownMethod(method.to_string()))
    }

    /// Embeds the points reachable through `callbacks` with `method`.
    pub fn embed(
        &self,
        method: ReductionMethod,
        params: &ParametersMap,
        callbacks: &Callbacks<'_>,
    ) -> Result<EmbeddingOutput> {
        let started = Instant::now();
        let n_points = callbacks.n_points();
        let descriptor = lookup(method)?;

        // parameters: presence, types, consistency, then typed extraction
        if let Some(&key) = descriptor.required.iter().find(|key| !params.has(**key)) {
            return Err(EmbedError::MissingParameter(key));
        }
        params.check_types()?;
        if let Some(stated) = params.get_optional::<ReductionMethod>(ParameterKey::Method)? {
            if stated != method {
                return Err(EmbedError::invalid(
                    ParameterKey::Method,
                    format!("map names {} but {} was requested", stated, method),
                ));
            }
        }
        let routine = Routine::prepare(method, params)?;

        let missing = callbacks.missing(descriptor.capabilities);
        if !missing.is_empty() {
            return Err(EmbedError::MissingCapability { method, missing });
        }
        if let (Some(dimension), Some(features)) = (
            params.get_optional::<usize>(ParameterKey::CurrentDimension)?,
            callbacks.features(),
        ) {
            if dimension != features.dimension() {
                return Err(EmbedError::invalid(
                    ParameterKey::CurrentDimension,
                    format!(
                        "{} does not match the feature dimension {}",
                        dimension,
                        features.dimension()
                    ),
                ));
            }
        }
        routine.check_values(callbacks)?;

        let solver = match routine.eigen_method() {
            Some(eigen_method) => {
                let solver = self.eigen_solver(eigen_method)?;
                if descriptor.is_generalized() && !solver.supports_generalized() {
                    return Err(EmbedError::UnsupportedCombination {
                        method,
                        solver: eigen_method,
                    });
                }
                Some(solver)
            }
            None => None,
        };
        let finder = match routine.local() {
            Some(local) => Some((local, self.neighbor_finder(local.method)?)),
            None => None,
        };

        info!(
            "Embedding {} points with {} into {} dimensions",
            n_points,
            method,
            routine.target_dimension()
        );

        let neighbors = match finder {
            Some((local, finder)) => {
                let metric = if descriptor.requires(Capability::Kernel) {
                    callbacks.kernel().map(NeighborMetric::Kernel)
                } else {
                    callbacks.distance().map(NeighborMetric::Distance)
                };
                let metric = metric.ok_or_else(|| EmbedError::MissingCapability {
                    method,
                    missing: vec![Capability::Distance],
                })?;

                let search_started = Instant::now();
                let neighbors = finder
                    .find_neighbors(n_points, local.k, &metric)
                    .map_err(|source| EmbedError::CollaboratorFailure {
                        stage: Stage::NeighborSearch,
                        method,
                        source,
                    })?;
                debug!(
                    "Found {} neighbors of {} points with {} in {:?}",
                    local.k,
                    n_points,
                    local.method,
                    search_started.elapsed()
                );
                Some(neighbors)
            }
            None => None,
        };

        let ctx = Context {
            method,
            callbacks: *callbacks,
            solver,
            neighbors,
        };
        let fitted = routine.run(&ctx)?;

        info!("Embedding with {} finished in {:?}", method, started.elapsed());
        Ok(EmbeddingOutput {
            result: fitted.result,
            projection: fitted.projection,
        })
    }
}

/// Runs `method` with the default back-ends.
pub fn embed(
    method: ReductionMethod,
    params: &ParametersMap,
    callbacks: &Callbacks<'_>,
) -> Result<EmbeddingOutput> {
    Dispatcher::default().embed(method, params, callbacks)
}
