//! Error types for the entanglement engine
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

use crate::duration::DurationParseError;

// == Entanglement Error Enum ==
/// Unified error type for cache entanglement operations.
#[derive(Error, Debug)]
pub enum EntanglementError {
    /// A dependency holds no usable entry at the key or its parent key
    #[error("key '{key}' or '{parent_key}' has not been assigned yet in dependency '{dependency}' of {node}")]
    DependencyNotSatisfied {
        /// Local name of the dependency
        dependency: String,
        /// Key being resolved
        key: String,
        /// Parent key that was tried as a fallback
        parent_key: String,
        /// Diagnostic name of the node that requested the dependency
        node: String,
    },

    /// Key was never cached on the node
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Creation function asked for a dependency that was never declared
    #[error("unknown dependency '{dependency}'")]
    UnknownDependency { dependency: String },

    /// Creation function asked for a dependency with the wrong value type
    #[error("dependency '{dependency}' does not hold values of type {expected}")]
    DependencyType {
        dependency: String,
        expected: &'static str,
    },

    /// Value could not be deep-copied
    #[error("failed to copy cached value: {0}")]
    Copy(#[from] serde_json::Error),

    /// Creation function failed
    #[error("creation failed for key '{key}': {source}")]
    Creation {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// Before-update hook failed
    #[error("before-update hook failed for key '{key}': {source}")]
    Hook {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// Lifespan string could not be parsed
    #[error("invalid lifespan: {0}")]
    InvalidDuration(#[from] DurationParseError),
}

// == Result Type Alias ==
/// Convenience Result type for entanglement operations.
pub type Result<T> = std::result::Result<T, EntanglementError>;
