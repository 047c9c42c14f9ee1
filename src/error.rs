use std::fmt;

use crate::callbacks::Capability;
use crate::methods::{EigenMethod, ReductionMethod};
use crate::parameters::ParameterKey;

/// Pipeline stage a collaborator failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    NeighborSearch,
    Eigendecomposition,
    Embedding,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::NeighborSearch => "neighbor search",
            Stage::Eigendecomposition => "eigendecomposition",
            Stage::Embedding => "embedding",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    #[error("missing parameter {0:?}")]
    MissingParameter(ParameterKey),

    #[error("parameter {key:?} holds a value of type {found}, expected {expected}")]
    TypeMismatch {
        key: ParameterKey,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{method} requires callbacks that were not supplied: {missing:?}")]
    MissingCapability {
        method: ReductionMethod,
        missing: Vec<Capability>,
    },

    #[error("invalid value for parameter {key:?}: {reason}")]
    InvalidParameterValue { key: ParameterKey, reason: String },

    #[error("{method} produces a generalized eigenproblem which the {solver} solver cannot handle")]
    UnsupportedCombination {
        method: ReductionMethod,
        solver: EigenMethod,
    },

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("{stage} failed while running {method}: {source}")]
    CollaboratorFailure {
        stage: Stage,
        method: ReductionMethod,
        #[source]
        source: anyhow::Error,
    },
}

impl EmbedError {
    pub(crate) fn invalid(key: ParameterKey, reason: impl Into<String>) -> Self {
        EmbedError::InvalidParameterValue {
            key,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EmbedError>;
