use std::any::{type_name, Any};
use std::fmt;

/// Failed typed read of a [`ParameterValue`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("stored value has type {found}, requested {expected}")]
pub struct ValueTypeError {
    pub expected: &'static str,
    pub found: &'static str,
}

trait StoredValue: Any + Send + Sync {
    fn clone_boxed(&self) -> Box<dyn StoredValue>;
    fn as_any(&self) -> &dyn Any;
}

impl<T> StoredValue for T
where
    T: Any + Clone + Send + Sync,
{
    fn clone_boxed(&self) -> Box<dyn StoredValue> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Holds exactly one value of any cloneable type.
///
/// The concrete type is fixed when the value is constructed. Reads are checked
/// against it at runtime and never coerce, so a value stored as `i32` cannot be
/// read back as `usize` or `f64`. Cloning deep-copies the contained value.
pub struct ParameterValue {
    inner: Box<dyn StoredValue>,
    type_name: &'static str,
}

impl ParameterValue {
    pub fn new<T>(value: T) -> Self
    where
        T: Any + Clone + Send + Sync,
    {
        ParameterValue {
            inner: Box::new(value),
            type_name: type_name::<T>(),
        }
    }

    /// Returns a copy of the stored value if it is a `T`.
    pub fn read<T>(&self) -> Result<T, ValueTypeError>
    where
        T: Any + Clone,
    {
        self.read_ref::<T>().cloned().ok_or(ValueTypeError {
            expected: type_name::<T>(),
            found: self.type_name,
        })
    }

    pub fn read_ref<T: Any>(&self) -> Option<&T> {
        self.inner.as_ref().as_any().downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.inner.as_ref().as_any().is::<T>()
    }

    /// Name of the type the value was constructed with.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl Clone for ParameterValue {
    fn clone(&self) -> Self {
        ParameterValue {
            inner: self.inner.as_ref().clone_boxed(),
            type_name: self.type_name,
        }
    }
}

impl fmt::Debug for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterValue")
            .field("type", &self.type_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_matching_type() {
        let value = ParameterValue::new(15usize);
        assert_eq!(value.read::<usize>().unwrap(), 15);
        assert!(value.is::<usize>());
        assert_eq!(value.type_name(), "usize");
    }

    #[test]
    fn test_read_never_coerces() {
        let value = ParameterValue::new(15i32);
        let err = value.read::<usize>().unwrap_err();
        assert_eq!(err.expected, "usize");
        assert_eq!(err.found, "i32");

        let width = ParameterValue::new(2.5f32);
        assert!(width.read::<f64>().is_err());
        assert_eq!(width.read::<f32>().unwrap(), 2.5);
    }

    #[test]
    fn test_clone_copies_contents() {
        let original = ParameterValue::new(vec![1.0f64, 2.0, 3.0]);
        let copy = original.clone();
        drop(original);
        assert_eq!(copy.read::<Vec<f64>>().unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_read_ref_borrows() {
        let value = ParameterValue::new(String::from("brute-force"));
        assert_eq!(value.read_ref::<String>().map(String::as_str), Some("brute-force"));
        assert!(value.read_ref::<&str>().is_none());
    }
}
