//! # Method Registry
//!
//! Static descriptors for every reduction method, plus the two auxiliary
//! strategy enumerations (neighbor search and eigen embedding).
//!
//! A descriptor lists the parameter keys a method cannot run without, the
//! callback capabilities it calls, whether it needs a neighborhood graph, and
//! which kind of eigenproblem it hands to the eigensolver. Validation in the
//! dispatcher is driven entirely by these records.

use std::fmt;
use std::str::FromStr;

use crate::callbacks::Capability;
use crate::error::EmbedError;
use crate::parameters::ParameterKey;

/// Dimension reduction method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReductionMethod {
    /// Locally Linear Embedding driven by a Mercer kernel. A linear kernel
    /// gives standard LLE.
    KernelLocallyLinearEmbedding,
    /// Linear approximation of LLE, yields an explicit projection.
    NeighborhoodPreservingEmbedding,
    /// Local Tangent Space Alignment driven by a Mercer kernel.
    KernelLocalTangentSpaceAlignment,
    /// Linear approximation of LTSA, yields an explicit projection.
    LinearLocalTangentSpaceAlignment,
    HessianLocallyLinearEmbedding,
    LaplacianEigenmaps,
    /// Linear approximation of Laplacian Eigenmaps, yields an explicit projection.
    LocalityPreservingProjections,
    DiffusionMap,
    Isomap,
    LandmarkIsomap,
    MultidimensionalScaling,
    LandmarkMultidimensionalScaling,
    StochasticProximityEmbedding,
    KernelPca,
    Pca,
}

/// Neighbors computation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NeighborsMethod {
    /// Exact search comparing every pair, O(N^2 log k).
    BruteForce,
    /// Vantage-point tree over the supplied metric.
    VpTree,
}

/// Eigendecomposition back-end used for spectral embeddings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EigenMethod {
    /// Restarted Lanczos iteration. Handles standard and generalized problems.
    Lanczos,
    /// Randomized range finder. Standard problems only.
    Randomized,
    /// Full self-adjoint decomposition, computes every eigenpair. Standard
    /// problems only.
    Dense,
}

/// Which eigenproblem a method builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eigenproblem {
    None,
    Standard,
    Generalized,
}

#[derive(Debug, Clone, Copy)]
pub struct MethodDescriptor {
    pub method: ReductionMethod,
    pub name: &'static str,
    pub required: &'static [ParameterKey],
    pub capabilities: &'static [Capability],
    /// Needs a k-nearest-neighbor graph.
    pub local: bool,
    pub eigenproblem: Eigenproblem,
    /// Whether a fitted model can map unseen feature vectors.
    pub projecting: bool,
}

impl MethodDescriptor {
    pub fn is_generalized(&self) -> bool {
        self.eigenproblem == Eigenproblem::Generalized
    }

    pub fn requires(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NeighborsDescriptor {
    pub method: NeighborsMethod,
    pub name: &'static str,
    pub exact: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct EigenDescriptor {
    pub method: EigenMethod,
    pub name: &'static str,
    pub supports_generalized: bool,
}

use ParameterKey as K;

const LOCAL_SPECTRAL: &[ParameterKey] = &[
    K::NumberOfNeighbors,
    K::TargetDimension,
    K::EigenEmbeddingMethod,
    K::NeighborsMethod,
];

const LOCAL_SHIFTED: &[ParameterKey] = &[
    K::NumberOfNeighbors,
    K::TargetDimension,
    K::EigenEmbeddingMethod,
    K::NeighborsMethod,
    K::Eigenshift,
];

const LOCAL_HEAT: &[ParameterKey] = &[
    K::NumberOfNeighbors,
    K::TargetDimension,
    K::EigenEmbeddingMethod,
    K::NeighborsMethod,
    K::GaussianKernelWidth,
];

const KERNEL: &[Capability] = &[Capability::Kernel];
const KERNEL_FEATURES: &[Capability] = &[Capability::Kernel, Capability::Features];
const DISTANCE: &[Capability] = &[Capability::Distance];
const DISTANCE_FEATURES: &[Capability] = &[Capability::Distance, Capability::Features];
const FEATURES: &[Capability] = &[Capability::Features];

static METHODS: [MethodDescriptor; 15] = [
    MethodDescriptor {
        method: ReductionMethod::KernelLocallyLinearEmbedding,
        name: "kernel-locally-linear-embedding",
        required: LOCAL_SHIFTED,
        capabilities: KERNEL,
        local: true,
        eigenproblem: Eigenproblem::Standard,
        projecting: false,
    },
    MethodDescriptor {
        method: ReductionMethod::NeighborhoodPreservingEmbedding,
        name: "neighborhood-preserving-embedding",
        required: LOCAL_SHIFTED,
        capabilities: KERNEL_FEATURES,
        local: true,
        eigenproblem: Eigenproblem::Generalized,
        projecting: true,
    },
    MethodDescriptor {
        method: ReductionMethod::KernelLocalTangentSpaceAlignment,
        name: "kernel-local-tangent-space-alignment",
        required: LOCAL_SHIFTED,
        capabilities: KERNEL,
        local: true,
        eigenproblem: Eigenproblem::Standard,
        projecting: false,
    },
    MethodDescriptor {
        method: ReductionMethod::LinearLocalTangentSpaceAlignment,
        name: "linear-local-tangent-space-alignment",
        required: LOCAL_SHIFTED,
        capabilities: KERNEL_FEATURES,
        local: true,
        eigenproblem: Eigenproblem::Generalized,
        projecting: true,
    },
    MethodDescriptor {
        method: ReductionMethod::HessianLocallyLinearEmbedding,
        name: "hessian-locally-linear-embedding",
        required: LOCAL_SHIFTED,
        capabilities: KERNEL,
        local: true,
        eigenproblem: Eigenproblem::Standard,
        projecting: false,
    },
    MethodDescriptor {
        method: ReductionMethod::LaplacianEigenmaps,
        name: "laplacian-eigenmaps",
        required: LOCAL_HEAT,
        capabilities: DISTANCE,
        local: true,
        eigenproblem: Eigenproblem::Generalized,
        projecting: false,
    },
    MethodDescriptor {
        method: ReductionMethod::LocalityPreservingProjections,
        name: "locality-preserving-projections",
        required: LOCAL_HEAT,
        capabilities: DISTANCE_FEATURES,
        local: true,
        eigenproblem: Eigenproblem::Generalized,
        projecting: true,
    },
    MethodDescriptor {
        method: ReductionMethod::DiffusionMap,
        name: "diffusion-map",
        required: &[
            K::TargetDimension,
            K::EigenEmbeddingMethod,
            K::DiffusionMapTimesteps,
            K::GaussianKernelWidth,
        ],
        capabilities: DISTANCE,
        local: false,
        eigenproblem: Eigenproblem::Standard,
        projecting: false,
    },
    MethodDescriptor {
        method: ReductionMethod::Isomap,
        name: "isomap",
        required: LOCAL_SPECTRAL,
        capabilities: DISTANCE,
        local: true,
        eigenproblem: Eigenproblem::Standard,
        projecting: false,
    },
    MethodDescriptor {
        method: ReductionMethod::LandmarkIsomap,
        name: "landmark-isomap",
        required: &[
            K::NumberOfNeighbors,
            K::TargetDimension,
            K::EigenEmbeddingMethod,
            K::NeighborsMethod,
            K::LandmarkRatio,
        ],
        capabilities: DISTANCE,
        local: true,
        eigenproblem: Eigenproblem::Standard,
        projecting: false,
    },
    MethodDescriptor {
        method: ReductionMethod::MultidimensionalScaling,
        name: "multidimensional-scaling",
        required: &[K::TargetDimension, K::EigenEmbeddingMethod],
        capabilities: DISTANCE,
        local: false,
        eigenproblem: Eigenproblem::Standard,
        projecting: false,
    },
    MethodDescriptor {
        method: ReductionMethod::LandmarkMultidimensionalScaling,
        name: "landmark-multidimensional-scaling",
        required: &[K::TargetDimension, K::EigenEmbeddingMethod, K::LandmarkRatio],
        capabilities: DISTANCE,
        local: false,
        eigenproblem: Eigenproblem::Standard,
        projecting: false,
    },
    MethodDescriptor {
        method: ReductionMethod::StochasticProximityEmbedding,
        name: "stochastic-proximity-embedding",
        required: &[
            K::TargetDimension,
            K::SpeGlobalStrategy,
            K::SpeTolerance,
            K::SpeNumUpdates,
            K::MaxIteration,
        ],
        capabilities: DISTANCE,
        local: false,
        eigenproblem: Eigenproblem::None,
        projecting: false,
    },
    MethodDescriptor {
        method: ReductionMethod::KernelPca,
        name: "kernel-pca",
        required: &[K::TargetDimension, K::EigenEmbeddingMethod],
        capabilities: KERNEL,
        local: false,
        eigenproblem: Eigenproblem::Standard,
        projecting: false,
    },
    MethodDescriptor {
        method: ReductionMethod::Pca,
        name: "pca",
        required: &[K::TargetDimension],
        capabilities: FEATURES,
        local: false,
        eigenproblem: Eigenproblem::Standard,
        projecting: true,
    },
];

static NEIGHBORS: [NeighborsDescriptor; 2] = [
    NeighborsDescriptor {
        method: NeighborsMethod::BruteForce,
        name: "brute-force",
        exact: true,
    },
    NeighborsDescriptor {
        method: NeighborsMethod::VpTree,
        name: "vp-tree",
        exact: true,
    },
];

static EIGEN: [EigenDescriptor; 3] = [
    EigenDescriptor {
        method: EigenMethod::Lanczos,
        name: "lanczos",
        supports_generalized: true,
    },
    EigenDescriptor {
        method: EigenMethod::Randomized,
        name: "randomized",
        supports_generalized: false,
    },
    EigenDescriptor {
        method: EigenMethod::Dense,
        name: "dense",
        supports_generalized: false,
    },
];

/// Looks up the descriptor of a reduction method.
pub fn lookup(method: ReductionMethod) -> Result<&'static MethodDescriptor, EmbedError> {
    METHODS
        .iter()
        .find(|d| d.method == method)
        .ok_or_else(|| EmbedError::UnknownMethod(format!("{:?}", method)))
}

pub fn descriptors() -> &'static [MethodDescriptor] {
    &METHODS
}

impl ReductionMethod {
    pub fn descriptor(&self) -> Result<&'static MethodDescriptor, EmbedError> {
        lookup(*self)
    }
}

impl NeighborsMethod {
    pub fn descriptor(&self) -> &'static NeighborsDescriptor {
        match self {
            NeighborsMethod::BruteForce => &NEIGHBORS[0],
            NeighborsMethod::VpTree => &NEIGHBORS[1],
        }
    }
}

impl EigenMethod {
    pub fn descriptor(&self) -> &'static EigenDescriptor {
        match self {
            EigenMethod::Lanczos => &EIGEN[0],
            EigenMethod::Randomized => &EIGEN[1],
            EigenMethod::Dense => &EIGEN[2],
        }
    }

    pub fn supports_generalized(&self) -> bool {
        self.descriptor().supports_generalized
    }
}

impl fmt::Display for ReductionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match lookup(*self) {
            Ok(descriptor) => f.write_str(descriptor.name),
            Err(_) => write!(f, "{:?}", self),
        }
    }
}

impl fmt::Display for NeighborsMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.descriptor().name)
    }
}

impl fmt::Display for EigenMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.descriptor().name)
    }
}

impl FromStr for ReductionMethod {
    type Err = EmbedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        METHODS
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(s))
            .map(|d| d.method)
            .ok_or_else(|| EmbedError::UnknownMethod(s.to_string()))
    }
}

impl FromStr for NeighborsMethod {
    type Err = EmbedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NEIGHBORS
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(s))
            .map(|d| d.method)
            .ok_or_else(|| EmbedError::UnknownMethod(s.to_string()))
    }
}

impl FromStr for EigenMethod {
    type Err = EmbedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EIGEN
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(s))
            .map(|d| d.method)
            .ok_or_else(|| EmbedError::UnknownMethod(s.to_string()))
    }
}
