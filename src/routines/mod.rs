//! # Routines
//!
//! One embedding routine per reduction method. The dispatcher turns a
//! validated [`ParametersMap`] into a strongly typed [`Routine`], runs the
//! neighbor search it asks for, and then calls [`Routine::run`] with a
//! [`Context`] carrying the callbacks, the selected eigensolver and the
//! neighbors.

use std::time::Instant;

use anyhow::anyhow;
use log::debug;
use ndarray::{Array1, Array2};

use crate::callbacks::{
    Callbacks, Capability, DistanceCallback, FeatureVectorCallback, KernelCallback,
};
use crate::dispatch::EmbeddingResult;
use crate::eigen::{EigenDecomposition, EigenProblem, EigenSolver, Spectrum};
use crate::error::{EmbedError, Result, Stage};
use crate::methods::{EigenMethod, NeighborsMethod, ReductionMethod};
use crate::neighbors::Neighbors;
use crate::parameters::{ParameterKey, ParametersMap};
use crate::projection::ProjectingFunction;

mod diffusion;
mod hessian;
mod isomap;
mod laplacian;
mod locally_linear;
mod mds;
mod pca;
mod spe;
mod tangent_space;

use ParameterKey as K;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct LocalArguments {
    pub k: usize,
    pub method: NeighborsMethod,
}

impl LocalArguments {
    fn from_parameters(params: &ParametersMap) -> Result<Self> {
        Ok(Self {
            k: params.get(K::NumberOfNeighbors)?,
            method: params.get(K::NeighborsMethod)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SpectralArguments {
    pub target_dimension: usize,
    pub eigen_method: EigenMethod,
}

impl SpectralArguments {
    fn from_parameters(params: &ParametersMap) -> Result<Self> {
        Ok(Self {
            target_dimension: params.get(K::TargetDimension)?,
            eigen_method: params.get(K::EigenEmbeddingMethod)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SpeArguments {
    pub target_dimension: usize,
    pub global: bool,
    pub tolerance: f64,
    pub updates: usize,
    pub max_iteration: usize,
    /// Present for the local strategy only.
    pub local: Option<LocalArguments>,
}

/// Typed argument bundle of one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Routine {
    KernelLocallyLinear {
        spectral: SpectralArguments,
        local: LocalArguments,
        shift: f64,
    },
    NeighborhoodPreserving {
        spectral: SpectralArguments,
        local: LocalArguments,
        shift: f64,
    },
    KernelLocalTangentSpace {
        spectral: SpectralArguments,
        local: LocalArguments,
        shift: f64,
    },
    LinearLocalTangentSpace {
        spectral: SpectralArguments,
        local: LocalArguments,
        shift: f64,
    },
    HessianLocallyLinear {
        spectral: SpectralArguments,
        local: LocalArguments,
        shift: f64,
    },
    LaplacianEigenmaps {
        spectral: SpectralArguments,
        local: LocalArguments,
        width: f64,
    },
    LocalityPreserving {
        spectral: SpectralArguments,
        local: LocalArguments,
        width: f64,
    },
    DiffusionMap {
        spectral: SpectralArguments,
        timesteps: usize,
        width: f64,
    },
    Isomap {
        spectral: SpectralArguments,
        local: LocalArguments,
    },
    LandmarkIsomap {
        spectral: SpectralArguments,
        local: LocalArguments,
        ratio: f64,
    },
    Mds {
        spectral: SpectralArguments,
    },
    LandmarkMds {
        spectral: SpectralArguments,
        ratio: f64,
    },
    Spe(SpeArguments),
    KernelPca {
        spectral: SpectralArguments,
    },
    Pca {
        target_dimension: usize,
        /// Dense decomposition of the covariance when not set.
        eigen_method: Option<EigenMethod>,
    },
}

impl Routine {
    /// Reads every value the method needs from `params`.
    pub fn prepare(method: ReductionMethod, params: &ParametersMap) -> Result<Self> {
        use ReductionMethod as M;

        let routine = match method {
            M::KernelLocallyLinearEmbedding => Routine::KernelLocallyLinear {
                spectral: SpectralArguments::from_parameters(params)?,
                local: LocalArguments::from_parameters(params)?,
                shift: params.get(K::Eigenshift)?,
            },
            M::NeighborhoodPreservingEmbedding => Routine::NeighborhoodPreserving {
                spectral: SpectralArguments::from_parameters(params)?,
                local: LocalArguments::from_parameters(params)?,
                shift: params.get(K::Eigenshift)?,
            },
            M::KernelLocalTangentSpaceAlignment => Routine::KernelLocalTangentSpace {
                spectral: SpectralArguments::from_parameters(params)?,
                local: LocalArguments::from_parameters(params)?,
                shift: params.get(K::Eigenshift)?,
            },
            M::LinearLocalTangentSpaceAlignment => Routine::LinearLocalTangentSpace {
                spectral: SpectralArguments::from_parameters(params)?,
                local: LocalArguments::from_parameters(params)?,
                shift: params.get(K::Eigenshift)?,
            },
            M::HessianLocallyLinearEmbedding => Routine::HessianLocallyLinear {
                spectral: SpectralArguments::from_parameters(params)?,
                local: LocalArguments::from_parameters(params)?,
                shift: params.get(K::Eigenshift)?,
            },
            M::LaplacianEigenmaps => Routine::LaplacianEigenmaps {
                spectral: SpectralArguments::from_parameters(params)?,
                local: LocalArguments::from_parameters(params)?,
                width: params.get(K::GaussianKernelWidth)?,
            },
            M::LocalityPreservingProjections => Routine::LocalityPreserving {
                spectral: SpectralArguments::from_parameters(params)?,
                local: LocalArguments::from_parameters(params)?,
                width: params.get(K::GaussianKernelWidth)?,
            },
            M::DiffusionMap => Routine::DiffusionMap {
                spectral: SpectralArguments::from_parameters(params)?,
                timesteps: params.get(K::DiffusionMapTimesteps)?,
                width: params.get(K::GaussianKernelWidth)?,
            },
            M::Isomap => Routine::Isomap {
                spectral: SpectralArguments::from_parameters(params)?,
                local: LocalArguments::from_parameters(params)?,
            },
            M::LandmarkIsomap => Routine::LandmarkIsomap {
                spectral: SpectralArguments::from_parameters(params)?,
                local: LocalArguments::from_parameters(params)?,
                ratio: params.get(K::LandmarkRatio)?,
            },
            M::MultidimensionalScaling => Routine::Mds {
                spectral: SpectralArguments::from_parameters(params)?,
            },
            M::LandmarkMultidimensionalScaling => Routine::LandmarkMds {
                spectral: SpectralArguments::from_parameters(params)?,
                ratio: params.get(K::LandmarkRatio)?,
            },
            M::StochasticProximityEmbedding => {
                let global: bool = params.get(K::SpeGlobalStrategy)?;
                Routine::Spe(SpeArguments {
                    target_dimension: params.get(K::TargetDimension)?,
                    global,
                    tolerance: params.get(K::SpeTolerance)?,
                    updates: params.get(K::SpeNumUpdates)?,
                    max_iteration: params.get(K::MaxIteration)?,
                    local: if global {
                        None
                    } else {
                        Some(LocalArguments::from_parameters(params)?)
                    },
                })
            }
            M::KernelPca => Routine::KernelPca {
                spectral: SpectralArguments::from_parameters(params)?,
            },
            M::Pca => Routine::Pca {
                target_dimension: params.get(K::TargetDimension)?,
                eigen_method: params.get_optional(K::EigenEmbeddingMethod)?,
            },
        };
        Ok(routine)
    }

    pub fn target_dimension(&self) -> usize {
        match self {
            Routine::KernelLocallyLinear { spectral, .. }
            | Routine::NeighborhoodPreserving { spectral, .. }
            | Routine::KernelLocalTangentSpace { spectral, .. }
            | Routine::LinearLocalTangentSpace { spectral, .. }
            | Routine::HessianLocallyLinear { spectral, .. }
            | Routine::LaplacianEigenmaps { spectral, .. }
            | Routine::LocalityPreserving { spectral, .. }
            | Routine::DiffusionMap { spectral, .. }
            | Routine::Isomap { spectral, .. }
            | Routine::LandmarkIsomap { spectral, .. }
            | Routine::Mds { spectral }
            | Routine::LandmarkMds { spectral, .. }
            | Routine::KernelPca { spectral } => spectral.target_dimension,
            Routine::Spe(args) => args.target_dimension,
            Routine::Pca {
                target_dimension, ..
            } => *target_dimension,
        }
    }

    /// Neighbor search this run needs, if any.
    pub fn local(&self) -> Option<LocalArguments> {
        match self {
            Routine::KernelLocallyLinear { local, .. }
            | Routine::NeighborhoodPreserving { local, .. }
            | Routine::KernelLocalTangentSpace { local, .. }
            | Routine::LinearLocalTangentSpace { local, .. }
            | Routine::HessianLocallyLinear { local, .. }
            | Routine::LaplacianEigenmaps { local, .. }
            | Routine::LocalityPreserving { local, .. }
            | Routine::Isomap { local, .. }
            | Routine::LandmarkIsomap { local, .. } => Some(*local),
            Routine::Spe(args) => args.local,
            Routine::DiffusionMap { .. }
            | Routine::Mds { .. }
            | Routine::LandmarkMds { .. }
            | Routine::KernelPca { .. }
            | Routine::Pca { .. } => None,
        }
    }

    /// Eigensolver this run needs from the dispatcher's table, if any.
    pub fn eigen_method(&self) -> Option<EigenMethod> {
        match self {
            Routine::KernelLocallyLinear { spectral, .. }
            | Routine::NeighborhoodPreserving { spectral, .. }
            | Routine::KernelLocalTangentSpace { spectral, .. }
            | Routine::LinearLocalTangentSpace { spectral, .. }
            | Routine::HessianLocallyLinear { spectral, .. }
            | Routine::LaplacianEigenmaps { spectral, .. }
            | Routine::LocalityPreserving { spectral, .. }
            | Routine::DiffusionMap { spectral, .. }
            | Routine::Isomap { spectral, .. }
            | Routine::LandmarkIsomap { spectral, .. }
            | Routine::Mds { spectral }
            | Routine::LandmarkMds { spectral, .. }
            | Routine::KernelPca { spectral } => Some(spectral.eigen_method),
            Routine::Spe(_) => None,
            Routine::Pca { eigen_method, .. } => *eigen_method,
        }
    }

    /// Range checks on the extracted values. Runs before any collaborator.
    pub fn check_values(&self, callbacks: &Callbacks<'_>) -> Result<()> {
        let n = callbacks.n_points();
        let target = self.target_dimension();

        if target == 0 {
            return Err(EmbedError::invalid(K::TargetDimension, "must be at least 1"));
        }
        if !matches!(self, Routine::Pca { .. }) && target >= n {
            return Err(EmbedError::invalid(
                K::TargetDimension,
                format!("{} is not below the number of points {}", target, n),
            ));
        }
        if let Some(features) = callbacks.features() {
            let dimension = features.dimension();
            let linear = matches!(
                self,
                Routine::Pca { .. }
                    | Routine::NeighborhoodPreserving { .. }
                    | Routine::LinearLocalTangentSpace { .. }
                    | Routine::LocalityPreserving { .. }
            );
            if linear && target > dimension {
                return Err(EmbedError::invalid(
                    K::TargetDimension,
                    format!("{} exceeds the feature dimension {}", target, dimension),
                ));
            }
        }

        if let Some(local) = self.local() {
            if local.k == 0 || local.k >= n.saturating_sub(1) {
                return Err(EmbedError::invalid(
                    K::NumberOfNeighbors,
                    format!(
                        "{} must lie in [1, {}) for {} points",
                        local.k,
                        n.saturating_sub(1),
                        n
                    ),
                ));
            }
        }

        match self {
            Routine::KernelLocallyLinear { local, shift, .. }
            | Routine::NeighborhoodPreserving { local, shift, .. }
            | Routine::KernelLocalTangentSpace { local, shift, .. }
            | Routine::LinearLocalTangentSpace { local, shift, .. } => {
                check_shift(*shift)?;
                if local.k < target {
                    return Err(EmbedError::invalid(
                        K::NumberOfNeighbors,
                        format!("{} is below the target dimension {}", local.k, target),
                    ));
                }
            }
            Routine::HessianLocallyLinear { local, shift, .. } => {
                check_shift(*shift)?;
                let needed = 1 + target + target * (target + 1) / 2;
                if local.k < needed {
                    return Err(EmbedError::invalid(
                        K::NumberOfNeighbors,
                        format!(
                            "{} is below the {} needed for a {}-dimensional Hessian",
                            local.k, needed, target
                        ),
                    ));
                }
            }
            Routine::LaplacianEigenmaps { width, .. }
            | Routine::LocalityPreserving { width, .. }
            | Routine::DiffusionMap { width, .. } => check_width(*width)?,
            Routine::LandmarkIsomap { ratio, .. } | Routine::LandmarkMds { ratio, .. } => {
                if !(*ratio > 0.0 && *ratio <= 1.0) {
                    return Err(EmbedError::invalid(
                        K::LandmarkRatio,
                        format!("{} is outside (0, 1]", ratio),
                    ));
                }
            }
            Routine::Spe(args) => {
                if !(args.tolerance > 0.0) {
                    return Err(EmbedError::invalid(K::SpeTolerance, "must be positive"));
                }
                if args.updates == 0 {
                    return Err(EmbedError::invalid(K::SpeNumUpdates, "must be at least 1"));
                }
                if args.max_iteration == 0 {
                    return Err(EmbedError::invalid(K::MaxIteration, "must be at least 1"));
                }
            }
            Routine::Isomap { .. }
            | Routine::Mds { .. }
            | Routine::KernelPca { .. }
            | Routine::Pca { .. } => {}
        }

        Ok(())
    }

    pub fn run(&self, ctx: &Context<'_>) -> Result<Fitted> {
        match *self {
            Routine::KernelLocallyLinear { spectral, shift, .. } => {
                locally_linear::kernel_locally_linear(ctx, spectral, shift)
            }
            Routine::NeighborhoodPreserving { spectral, shift, .. } => {
                locally_linear::neighborhood_preserving(ctx, spectral, shift)
            }
            Routine::KernelLocalTangentSpace { spectral, shift, .. } => {
                tangent_space::kernel_tangent_space(ctx, spectral, shift)
            }
            Routine::LinearLocalTangentSpace { spectral, shift, .. } => {
                tangent_space::linear_tangent_space(ctx, spectral, shift)
            }
            Routine::HessianLocallyLinear { spectral, shift, .. } => {
                hessian::hessian_locally_linear(ctx, spectral, shift)
            }
            Routine::LaplacianEigenmaps { spectral, width, .. } => {
                laplacian::laplacian_eigenmaps(ctx, spectral, width)
            }
            Routine::LocalityPreserving { spectral, width, .. } => {
                laplacian::locality_preserving(ctx, spectral, width)
            }
            Routine::DiffusionMap {
                spectral,
                timesteps,
                width,
            } => diffusion::diffusion_map(ctx, spectral, timesteps, width),
            Routine::Isomap { spectral, .. } => isomap::isomap(ctx, spectral),
            Routine::LandmarkIsomap { spectral, ratio, .. } => {
                isomap::landmark_isomap(ctx, spectral, ratio)
            }
            Routine::Mds { spectral } => mds::multidimensional_scaling(ctx, spectral),
            Routine::LandmarkMds { spectral, ratio } => {
                mds::landmark_multidimensional_scaling(ctx, spectral, ratio)
            }
            Routine::Spe(args) => spe::stochastic_proximity(ctx, args),
            Routine::KernelPca { spectral } => pca::kernel_pca(ctx, spectral),
            Routine::Pca {
                target_dimension, ..
            } => pca::principal_components(ctx, target_dimension),
        }
    }
}

fn check_shift(shift: f64) -> Result<()> {
    if shift >= 0.0 && shift.is_finite() {
        Ok(())
    } else {
        Err(EmbedError::invalid(
            K::Eigenshift,
            format!("{} is not a finite non-negative number", shift),
        ))
    }
}

fn check_width(width: f64) -> Result<()> {
    if width > 0.0 && width.is_finite() {
        Ok(())
    } else {
        Err(EmbedError::invalid(
            K::GaussianKernelWidth,
            format!("{} is not a finite positive number", width),
        ))
    }
}

/// What a routine hands back to the dispatcher.
pub(crate) struct Fitted {
    pub result: EmbeddingResult,
    pub projection: Option<ProjectingFunction>,
}

impl Fitted {
    fn new(embedding: Array2<f64>, eigenvalues: Array1<f64>) -> Self {
        Fitted {
            result: EmbeddingResult {
                embedding,
                eigenvalues,
            },
            projection: None,
        }
    }

    fn with_projection(mut self, projection: ProjectingFunction) -> Self {
        self.projection = Some(projection);
        self
    }
}

/// Everything a routine may touch during its run.
pub(crate) struct Context<'a> {
    pub method: ReductionMethod,
    pub callbacks: Callbacks<'a>,
    pub solver: Option<&'a dyn EigenSolver>,
    pub neighbors: Option<Neighbors>,
}

impl<'a> Context<'a> {
    pub fn n_points(&self) -> usize {
        self.callbacks.n_points()
    }

    fn missing(&self, capability: Capability) -> EmbedError {
        EmbedError::MissingCapability {
            method: self.method,
            missing: vec![capability],
        }
    }

    pub fn kernel(&self) -> Result<&'a dyn KernelCallback> {
        self.callbacks
            .kernel()
            .ok_or_else(|| self.missing(Capability::Kernel))
    }

    pub fn distance(&self) -> Result<&'a dyn DistanceCallback> {
        self.callbacks
            .distance()
            .ok_or_else(|| self.missing(Capability::Distance))
    }

    pub fn features(&self) -> Result<&'a dyn FeatureVectorCallback> {
        self.callbacks
            .features()
            .ok_or_else(|| self.missing(Capability::Features))
    }

    pub fn neighbors(&self) -> Result<&Neighbors> {
        self.neighbors
            .as_ref()
            .ok_or_else(|| {
                self.failure(Stage::NeighborSearch, anyhow!("neighbors were not computed"))
            })
    }

    pub fn failure(&self, stage: Stage, source: anyhow::Error) -> EmbedError {
        EmbedError::CollaboratorFailure {
            stage,
            method: self.method,
            source,
        }
    }

    /// Wraps a failure of the routine's own computations.
    pub fn embedding_failure(&self, source: anyhow::Error) -> EmbedError {
        self.failure(Stage::Embedding, source)
    }

    /// Solves with the eigensolver the dispatcher selected.
    pub fn eigen(
        &self,
        problem: EigenProblem<'_>,
        target: usize,
        spectrum: Spectrum,
    ) -> Result<EigenDecomposition> {
        let solver = self.solver.ok_or_else(|| {
            self.failure(Stage::Eigendecomposition, anyhow!("no eigensolver was selected"))
        })?;
        self.eigen_with(solver, problem, target, spectrum)
    }

    pub fn eigen_with(
        &self,
        solver: &dyn EigenSolver,
        problem: EigenProblem<'_>,
        target: usize,
        spectrum: Spectrum,
    ) -> Result<EigenDecomposition> {
        let started = Instant::now();
        let dimension = problem.dimension();
        let result = solver
            .solve(&problem, target, spectrum)
            .map_err(|e| self.failure(Stage::Eigendecomposition, e))?;
        debug!(
            "Eigendecomposition of a {} x {} {} problem took {:?}",
            dimension,
            dimension,
            if problem.is_generalized() { "generalized" } else { "standard" },
            started.elapsed()
        );
        Ok(result)
    }
}

/// Shared tail of the linear methods (NPE, LLTSA, LPP): solves
/// `Xᵀ A X p = λ Xᵀ B X p` on centered features and returns the embedding
/// together with the projection onto the found directions.
fn linear_projection(
    ctx: &Context<'_>,
    spectral: SpectralArguments,
    features: &Array2<f64>,
    lhs_inner: &Array2<f64>,
    rhs_inner: Option<&Array2<f64>>,
) -> Result<Fitted> {
    use crate::projection::MatrixProjection;
    use crate::utils::{center_columns, sandwich};
    use std::sync::Arc;

    let mut centered = features.clone();
    let mean = center_columns(&mut centered);

    let lhs = sandwich(&centered, lhs_inner);
    let rhs = match rhs_inner {
        Some(inner) => sandwich(&centered, inner),
        None => centered.t().dot(&centered),
    };

    let eigen = ctx.eigen(
        EigenProblem::Generalized {
            lhs: lhs.view(),
            rhs: rhs.view(),
        },
        spectral.target_dimension,
        Spectrum::Smallest { skip: 0 },
    )?;

    let projection =
        MatrixProjection::new(mean, eigen.vectors).map_err(|e| ctx.embedding_failure(e))?;
    let embedding = projection.project_rows(features.view());
    Ok(Fitted::new(embedding, eigen.values)
        .with_projection(ProjectingFunction::new(Arc::new(projection))))
}

#[cfg(test)]
mod tests {
    use super::*;

    use ReductionMethod as M;

    fn local_params() -> ParametersMap {
        ParametersMap::new()
            .with(K::NumberOfNeighbors, 8usize)
            .with(K::TargetDimension, 2usize)
            .with(K::EigenEmbeddingMethod, EigenMethod::Dense)
            .with(K::NeighborsMethod, NeighborsMethod::BruteForce)
            .with(K::Eigenshift, 1e-3f64)
    }

    #[test]
    fn test_prepare_reads_typed_values() {
        let routine = Routine::prepare(M::KernelLocallyLinearEmbedding, &local_params()).unwrap();
        assert_eq!(routine.target_dimension(), 2);
        assert_eq!(routine.eigen_method(), Some(EigenMethod::Dense));
        assert_eq!(
            routine.local(),
            Some(LocalArguments {
                k: 8,
                method: NeighborsMethod::BruteForce
            })
        );
    }

    #[test]
    fn test_spe_local_strategy_needs_neighbors() {
        let params = ParametersMap::new()
            .with(K::TargetDimension, 2usize)
            .with(K::SpeGlobalStrategy, false)
            .with(K::SpeTolerance, 1e-5f64)
            .with(K::SpeNumUpdates, 50usize)
            .with(K::MaxIteration, 20usize);
        match Routine::prepare(M::StochasticProximityEmbedding, &params) {
            Err(EmbedError::MissingParameter(key)) => assert_eq!(key, K::NumberOfNeighbors),
            other => panic!("unexpected result: {:?}", other),
        }

        let global = params.clone().with(K::SpeGlobalStrategy, true);
        let routine = Routine::prepare(M::StochasticProximityEmbedding, &global).unwrap();
        assert_eq!(routine.local(), None);
        assert_eq!(routine.eigen_method(), None);
    }

    #[test]
    fn test_pca_solver_is_optional() {
        let params = ParametersMap::new().with(K::TargetDimension, 3usize);
        let routine = Routine::prepare(M::Pca, &params).unwrap();
        assert_eq!(routine.eigen_method(), None);

        let params = params.with(K::EigenEmbeddingMethod, EigenMethod::Lanczos);
        let routine = Routine::prepare(M::Pca, &params).unwrap();
        assert_eq!(routine.eigen_method(), Some(EigenMethod::Lanczos));
    }

    #[test]
    fn test_value_checks() {
        let kernel = crate::callbacks::kernel_fn(|_, _| 0.0);
        let callbacks = Callbacks::new(10).with_kernel(&kernel);

        let routine = Routine::prepare(M::KernelLocallyLinearEmbedding, &local_params()).unwrap();
        // k = 8 < 10 - 1
        assert!(routine.check_values(&callbacks).is_ok());

        let too_many = local_params().with(K::NumberOfNeighbors, 9usize);
        let routine = Routine::prepare(M::KernelLocallyLinearEmbedding, &too_many).unwrap();
        match routine.check_values(&callbacks) {
            Err(EmbedError::InvalidParameterValue { key, .. }) => {
                assert_eq!(key, K::NumberOfNeighbors)
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let unbounded = local_params().with(K::NumberOfNeighbors, usize::MAX);
        let routine = Routine::prepare(M::KernelLocallyLinearEmbedding, &unbounded).unwrap();
        assert!(matches!(
            routine.check_values(&callbacks),
            Err(EmbedError::InvalidParameterValue {
                key: K::NumberOfNeighbors,
                ..
            })
        ));

        let negative_shift = local_params().with(K::Eigenshift, -1.0f64);
        let routine = Routine::prepare(M::KernelLocallyLinearEmbedding, &negative_shift).unwrap();
        assert!(routine.check_values(&callbacks).is_err());

        let hessian = Routine::prepare(M::HessianLocallyLinearEmbedding, &local_params()).unwrap();
        // needs 1 + 2 + 3 = 6 neighbors, has 8
        assert!(hessian.check_values(&callbacks).is_ok());
        let hessian = Routine::prepare(
            M::HessianLocallyLinearEmbedding,
            &local_params().with(K::NumberOfNeighbors, 5usize),
        )
        .unwrap();
        assert!(hessian.check_values(&callbacks).is_err());
    }

    #[test]
    fn test_landmark_ratio_bounds() {
        let distance = crate::callbacks::distance_fn(|_, _| 1.0);
        let callbacks = Callbacks::new(20).with_distance(&distance);
        let base = ParametersMap::new()
            .with(K::TargetDimension, 2usize)
            .with(K::EigenEmbeddingMethod, EigenMethod::Dense);

        let ratios = [
            (0.0, false),
            (0.25, true),
            (1.0, true),
            (1.5, false),
            (f64::NAN, false),
        ];
        for (ratio, ok) in ratios {
            let params = base.clone().with(K::LandmarkRatio, ratio);
            let routine = Routine::prepare(M::LandmarkMultidimensionalScaling, &params).unwrap();
            assert_eq!(routine.check_values(&callbacks).is_ok(), ok, "ratio {}", ratio);
        }
    }
}
