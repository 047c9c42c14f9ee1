pub mod callbacks;
pub mod dispatch;
pub mod eigen;
pub mod error;
pub mod methods;
pub mod neighbors;
pub mod parameters;
pub mod projection;
mod routines;
mod utils;

pub use callbacks::{Callbacks, Capability, DistanceCallback, FeatureVectorCallback, KernelCallback};
pub use dispatch::{embed, Dispatcher, EmbeddingOutput, EmbeddingResult};
pub use error::{EmbedError, Result, Stage};
pub use methods::{EigenMethod, NeighborsMethod, ReductionMethod};
pub use parameters::{ParameterKey, ParameterValue, ParametersMap};
pub use projection::{ProjectingFunction, ProjectingImplementation};
