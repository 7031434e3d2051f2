//! Cache Data Module
//!
//! Wraps a computed value and offers copy strategies for callers that need
//! an owned, independently mutable version of it.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

// == Clone Strategy ==
/// How [`CacheData::clone_with`] produces an independent copy.
pub enum CloneStrategy<T> {
    /// Structural copy through a serde round-trip
    DeepCopy,
    /// Copy of the outer sequence, elements cloned through `Clone`
    ArrayShallowCopy,
    /// Copy of the outer record, fields cloned through `Clone`
    ObjectShallowCopy,
    /// Caller-supplied copy function
    Custom(fn(&T) -> T),
}

impl<T> Default for CloneStrategy<T> {
    fn default() -> Self {
        CloneStrategy::DeepCopy
    }
}

// == Cache Data ==
/// A cached value as handed out by entanglement nodes.
///
/// The value is shared between the node's store and every reader. Use one of
/// the copy methods when an owned value is needed.
#[derive(Debug)]
pub struct CacheData<T> {
    value: T,
}

impl<T> CacheData<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    /// The cached value itself.
    pub fn raw(&self) -> &T {
        &self.value
    }

    /// Copies the value with a caller-supplied function.
    pub fn copy_with<F>(&self, copy: F) -> T
    where
        F: FnOnce(&T) -> T,
    {
        copy(&self.value)
    }
}

impl<T: Clone> CacheData<T> {
    /// Copies the value through `Clone`.
    pub fn shallow_copy(&self) -> T {
        self.value.clone()
    }
}

impl<T: Serialize + DeserializeOwned> CacheData<T> {
    /// Copies the value through its serialized structure.
    ///
    /// Fails for values without a structural representation, for example maps
    /// keyed by non-string types.
    pub fn deep_copy(&self) -> Result<T> {
        let structure = serde_json::to_value(&self.value)?;
        Ok(serde_json::from_value(structure)?)
    }
}

impl<T: Clone + Serialize + DeserializeOwned> CacheData<T> {
    /// Copies the value with the given strategy.
    pub fn clone_with(&self, strategy: CloneStrategy<T>) -> Result<T> {
        match strategy {
            CloneStrategy::DeepCopy => self.deep_copy(),
            CloneStrategy::ArrayShallowCopy | CloneStrategy::ObjectShallowCopy => {
                Ok(self.shallow_copy())
            }
            CloneStrategy::Custom(copy) => Ok(copy(&self.value)),
        }
    }
}
