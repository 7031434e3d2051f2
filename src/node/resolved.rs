//! Resolved dependency values handed to creation functions.

use std::any::{self, Any};
use std::fmt;
use std::sync::Arc;

use crate::data::CacheData;
use crate::error::{EntanglementError, Result};
use crate::node::Cached;

/// A cached value with its concrete type erased.
pub type ErasedData = Arc<dyn Any + Send + Sync>;

/// Dependency values for one resolution, in declared order.
#[derive(Clone, Default)]
pub struct ResolvedDependencies {
    entries: Vec<(String, ErasedData)>,
}

impl ResolvedDependencies {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, name: impl Into<String>, data: ErasedData) {
        self.entries.push((name.into(), data));
    }

    /// Returns the value resolved for dependency `name`.
    ///
    /// Fails if no dependency of that name was declared or if it holds
    /// values of a different type.
    pub fn get<T: Send + Sync + 'static>(&self, name: &str) -> Result<Cached<T>> {
        let data = self
            .entries
            .iter()
            .find(|(declared, _)| declared == name)
            .map(|(_, data)| Arc::clone(data))
            .ok_or_else(|| EntanglementError::UnknownDependency {
                dependency: name.to_string(),
            })?;

        data.downcast::<CacheData<T>>()
            .map_err(|_| EntanglementError::DependencyType {
                dependency: name.to_string(),
                expected: any::type_name::<T>(),
            })
    }

    /// Dependency names in declared order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for ResolvedDependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
