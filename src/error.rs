//! Error types for the resolution core

use thiserror::Error;

/// Errors that can occur while registering or resolving services
#[derive(Error, Debug, Clone)]
pub enum DiError {
    /// No definition, class or function is registered under the identifier
    #[error("nothing registered under id: {id}")]
    NotFound { id: String },

    /// Circular dependency detected during resolution
    #[error("circular dependency on '{id}' (chain: {})", .chain.join(" -> "))]
    CircularDependency { id: String, chain: Vec<String> },

    /// Attempted to construct an interface or abstract class
    #[error("type is not instantiable: {type_name}")]
    NotInstantiable { type_name: String },

    /// An interface had no environment override, definition or supplied concrete
    #[error("no concrete available for interface: {interface}")]
    InterfaceResolutionFailure { interface: String },

    /// The selected concrete does not implement the requested interface
    #[error("{concrete} does not implement {interface}")]
    InterfaceImplementationMismatch {
        interface: String,
        concrete: String,
    },

    /// Two parameters of one signature would inject the same class
    #[error("multiple instances of {type_name} in signature {owner}")]
    MultipleInstancesForType { owner: String, type_name: String },

    /// A required parameter could not be satisfied from any source
    #[error("cannot resolve parameter '{parameter}' of {owner}: {reason}")]
    ParameterResolutionFailure {
        owner: String,
        parameter: String,
        reason: String,
    },

    /// Built-in injection attribute carries an invalid payload
    #[error("malformed attribute on {target}: {reason}")]
    AttributeMalformed { target: String, reason: String },

    /// Container is locked and cannot be modified
    #[error("container is locked - definitions can no longer change")]
    Locked,

    /// A factory, constructor or setter failed
    #[error("failed to produce '{id}': {reason}")]
    CreationFailed { id: String, reason: String },

    /// Internal error
    #[error("internal resolution error: {0}")]
    Internal(String),
}

impl DiError {
    /// Create a NotFound error for an identifier
    #[inline]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create a CircularDependency error with the in-flight chain
    #[inline]
    pub fn circular(id: impl Into<String>, chain: Vec<String>) -> Self {
        Self::CircularDependency {
            id: id.into(),
            chain,
        }
    }

    /// Create a NotInstantiable error
    #[inline]
    pub fn not_instantiable(type_name: impl Into<String>) -> Self {
        Self::NotInstantiable {
            type_name: type_name.into(),
        }
    }

    /// Create a ParameterResolutionFailure error
    #[inline]
    pub fn parameter(
        owner: impl Into<String>,
        parameter: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ParameterResolutionFailure {
            owner: owner.into(),
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Create an AttributeMalformed error
    #[inline]
    pub fn attribute(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AttributeMalformed {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Create a CreationFailed error
    #[inline]
    pub fn creation_failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CreationFailed {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for resolution operations
pub type Result<T> = std::result::Result<T, DiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_message_carries_chain() {
        let err = DiError::circular("a", vec!["a".into(), "b".into(), "a".into()]);
        let msg = err.to_string();
        assert!(msg.contains("a -> b -> a"));
    }

    #[test]
    fn test_parameter_message_identifies_owner() {
        let err = DiError::parameter("Mailer::new", "transport", "no source");
        let msg = err.to_string();
        assert!(msg.contains("Mailer::new"));
        assert!(msg.contains("transport"));
    }
}
