//! # Parameters
//!
//! The configuration object threaded through an embedding run. A
//! [`ParametersMap`] maps each [`ParameterKey`] to a type-erased
//! [`ParameterValue`]; every key has one expected value type, documented on the
//! key and checked by the dispatcher before any work starts.
//!
//! The map never fills in defaults. A key that is not set is missing.

use std::any::{type_name, Any};
use std::collections::BTreeMap;

use crate::error::{EmbedError, Result};
use crate::methods::{EigenMethod, NeighborsMethod, ReductionMethod};

mod value;

pub use value::{ParameterValue, ValueTypeError};

/// Keys understood by the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParameterKey {
    /// [`ReductionMethod`]
    Method,
    /// `usize`
    NumberOfNeighbors,
    /// `usize`
    TargetDimension,
    /// `usize`
    CurrentDimension,
    /// [`EigenMethod`]
    EigenEmbeddingMethod,
    /// [`NeighborsMethod`]
    NeighborsMethod,
    /// `usize`
    DiffusionMapTimesteps,
    /// `f64`
    GaussianKernelWidth,
    /// `usize`
    MaxIteration,
    /// `bool`
    SpeGlobalStrategy,
    /// `f64`
    SpeTolerance,
    /// `usize`
    SpeNumUpdates,
    /// `f64`
    LandmarkRatio,
    /// `f64`
    Eigenshift,
}

impl ParameterKey {
    pub const ALL: [ParameterKey; 14] = [
        ParameterKey::Method,
        ParameterKey::NumberOfNeighbors,
        ParameterKey::TargetDimension,
        ParameterKey::CurrentDimension,
        ParameterKey::EigenEmbeddingMethod,
        ParameterKey::NeighborsMethod,
        ParameterKey::DiffusionMapTimesteps,
        ParameterKey::GaussianKernelWidth,
        ParameterKey::MaxIteration,
        ParameterKey::SpeGlobalStrategy,
        ParameterKey::SpeTolerance,
        ParameterKey::SpeNumUpdates,
        ParameterKey::LandmarkRatio,
        ParameterKey::Eigenshift,
    ];

    /// Name of the only type a value stored under this key may have.
    pub fn expected_type(&self) -> &'static str {
        match self {
            ParameterKey::Method => type_name::<ReductionMethod>(),
            ParameterKey::EigenEmbeddingMethod => type_name::<EigenMethod>(),
            ParameterKey::NeighborsMethod => type_name::<NeighborsMethod>(),
            ParameterKey::NumberOfNeighbors
            | ParameterKey::TargetDimension
            | ParameterKey::CurrentDimension
            | ParameterKey::DiffusionMapTimesteps
            | ParameterKey::MaxIteration
            | ParameterKey::SpeNumUpdates => type_name::<usize>(),
            ParameterKey::GaussianKernelWidth
            | ParameterKey::SpeTolerance
            | ParameterKey::LandmarkRatio
            | ParameterKey::Eigenshift => type_name::<f64>(),
            ParameterKey::SpeGlobalStrategy => type_name::<bool>(),
        }
    }

    /// Whether `value` has the type this key expects.
    pub fn accepts(&self, value: &ParameterValue) -> bool {
        match self {
            ParameterKey::Method => value.is::<ReductionMethod>(),
            ParameterKey::EigenEmbeddingMethod => value.is::<EigenMethod>(),
            ParameterKey::NeighborsMethod => value.is::<NeighborsMethod>(),
            ParameterKey::NumberOfNeighbors
            | ParameterKey::TargetDimension
            | ParameterKey::CurrentDimension
            | ParameterKey::DiffusionMapTimesteps
            | ParameterKey::MaxIteration
            | ParameterKey::SpeNumUpdates => value.is::<usize>(),
            ParameterKey::GaussianKernelWidth
            | ParameterKey::SpeTolerance
            | ParameterKey::LandmarkRatio
            | ParameterKey::Eigenshift => value.is::<f64>(),
            ParameterKey::SpeGlobalStrategy => value.is::<bool>(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParametersMap {
    entries: BTreeMap<ParameterKey, ParameterValue>,
}

impl ParametersMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites the value stored under `key`.
    pub fn set<T>(&mut self, key: ParameterKey, value: T) -> &mut Self
    where
        T: Any + Clone + Send + Sync,
    {
        self.entries.insert(key, ParameterValue::new(value));
        self
    }

    pub fn with<T>(mut self, key: ParameterKey, value: T) -> Self
    where
        T: Any + Clone + Send + Sync,
    {
        self.set(key, value);
        self
    }

    /// Typed lookup. Fails with `MissingParameter` if the key is absent and
    /// `TypeMismatch` if the stored value is not a `T`.
    pub fn get<T>(&self, key: ParameterKey) -> Result<T>
    where
        T: Any + Clone,
    {
        let value = self
            .entries
            .get(&key)
            .ok_or(EmbedError::MissingParameter(key))?;
        value.read::<T>().map_err(|e| EmbedError::TypeMismatch {
            key,
            expected: e.expected,
            found: e.found,
        })
    }

    /// Like [`get`](Self::get) but an absent key is `Ok(None)`.
    pub fn get_optional<T>(&self, key: ParameterKey) -> Result<Option<T>>
    where
        T: Any + Clone,
    {
        if self.has(key) {
            self.get(key).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn has(&self, key: ParameterKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn value(&self, key: ParameterKey) -> Option<&ParameterValue> {
        self.entries.get(&key)
    }

    pub fn remove(&mut self, key: ParameterKey) -> Option<ParameterValue> {
        self.entries.remove(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ParameterKey, &ParameterValue)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Checks every present value against the type its key expects.
    pub fn check_types(&self) -> Result<()> {
        for (key, value) in self.iter() {
            if !key.accepts(value) {
                return Err(EmbedError::TypeMismatch {
                    key,
                    expected: key.expected_type(),
                    found: value.type_name(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_roundtrip() {
        let params = ParametersMap::new()
            .with(ParameterKey::TargetDimension, 2usize)
            .with(ParameterKey::GaussianKernelWidth, 0.5f64)
            .with(ParameterKey::EigenEmbeddingMethod, EigenMethod::Dense);

        assert_eq!(params.len(), 3);
        assert_eq!(params.get::<usize>(ParameterKey::TargetDimension).unwrap(), 2);
        assert_eq!(params.get::<f64>(ParameterKey::GaussianKernelWidth).unwrap(), 0.5);
        assert_eq!(
            params.get::<EigenMethod>(ParameterKey::EigenEmbeddingMethod).unwrap(),
            EigenMethod::Dense
        );
    }

    #[test]
    fn test_set_overwrites() {
        let mut params = ParametersMap::new();
        params.set(ParameterKey::NumberOfNeighbors, 5usize);
        params.set(ParameterKey::NumberOfNeighbors, 8usize);
        assert_eq!(params.len(), 1);
        assert_eq!(params.get::<usize>(ParameterKey::NumberOfNeighbors).unwrap(), 8);

        // Overwriting may change the stored type
        params.set(ParameterKey::NumberOfNeighbors, 8i64);
        assert!(params.get::<usize>(ParameterKey::NumberOfNeighbors).is_err());
    }

    #[test]
    fn test_missing_parameter() {
        let params = ParametersMap::new();
        assert!(!params.has(ParameterKey::TargetDimension));
        match params.get::<usize>(ParameterKey::TargetDimension) {
            Err(EmbedError::MissingParameter(key)) => {
                assert_eq!(key, ParameterKey::TargetDimension)
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(params
            .get_optional::<usize>(ParameterKey::TargetDimension)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_type_mismatch_names_key() {
        let params = ParametersMap::new().with(ParameterKey::TargetDimension, 2i32);
        match params.get::<usize>(ParameterKey::TargetDimension) {
            Err(EmbedError::TypeMismatch { key, expected, found }) => {
                assert_eq!(key, ParameterKey::TargetDimension);
                assert_eq!(expected, "usize");
                assert_eq!(found, "i32");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_check_types_covers_every_key() {
        for key in ParameterKey::ALL {
            let params = ParametersMap::new().with(key, "not a parameter");
            match params.check_types() {
                Err(EmbedError::TypeMismatch { key: reported, .. }) => assert_eq!(reported, key),
                other => panic!("{:?} accepted a &str: {:?}", key, other),
            }
        }
    }

    #[test]
    fn test_check_types_accepts_well_typed_map() {
        let params = ParametersMap::new()
            .with(ParameterKey::Method, ReductionMethod::Isomap)
            .with(ParameterKey::NumberOfNeighbors, 10usize)
            .with(ParameterKey::NeighborsMethod, NeighborsMethod::VpTree)
            .with(ParameterKey::SpeGlobalStrategy, true)
            .with(ParameterKey::LandmarkRatio, 0.2f64);
        assert!(params.check_types().is_ok());
    }

    #[test]
    fn test_copied_map_is_independent() {
        let mut params = ParametersMap::new().with(ParameterKey::TargetDimension, 3usize);
        let copy = params.clone();
        params.set(ParameterKey::TargetDimension, 4usize);
        assert_eq!(copy.get::<usize>(ParameterKey::TargetDimension).unwrap(), 3);
    }
}
