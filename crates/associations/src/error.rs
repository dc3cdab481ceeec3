//! Error types for association declarations
//!
//! Every failure raised while declaring an association is fatal to that
//! declaration and is meant to surface unchanged to the application developer
//! at startup.

use thiserror::Error;

/// Result type alias for association operations
pub type AssociationResult<T> = Result<T, AssociationError>;

/// Error types for association registration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssociationError {
    /// The alias collides with an attribute of the source model
    #[error(
        "Naming collision between attribute '{alias}' and association '{alias}' on model {model}. \
         To remedy this, change the \"as\" option in your association definition"
    )]
    NamingConflict { model: String, alias: String },

    /// The alias collides with an association already registered on the source model
    #[error("{message}")]
    AssociationConflict {
        model: String,
        alias: String,
        message: String,
    },

    /// The target passed to a declaration method is not a model of this registry
    #[error("{model}.{method} was called with something that's not a model defined by this registry")]
    InvalidTarget { model: String, method: String },

    /// Source or target model has not completed its definition
    #[error(
        "Model {model} must be defined (through ModelRegistry::define) before calling one of its \
         association declaration methods ({method})"
    )]
    ModelNotDefined { model: String, method: String },

    /// Invalid or incomplete association configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A lifecycle hook rejected the declaration
    #[error("Hook '{event}' failed: {message}")]
    Hook { event: String, message: String },

    /// No method registered under this name on the model
    #[error("Model {model} has no method named '{method}'")]
    UnknownMethod { model: String, method: String },

    /// A model id or name this registry does not know
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// A model name defined twice on the same registry
    #[error("Model {0} is already defined")]
    DuplicateModel(String),
}

impl AssociationError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn hook(event: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Hook {
            event: event.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the same declaration later may succeed
    ///
    /// Only readiness failures qualify: they are raised before any metadata is
    /// touched.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::ModelNotDefined { .. })
    }
}

impl From<serde_yaml::Error> for AssociationError {
    fn from(err: serde_yaml::Error) -> Self {
        AssociationError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_naming_conflict_message() {
        let err = AssociationError::NamingConflict {
            model: "Post".to_string(),
            alias: "author".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("attribute 'author'"));
        assert!(message.contains("model Post"));
    }

    #[test]
    fn test_only_readiness_errors_are_retriable() {
        let not_defined = AssociationError::ModelNotDefined {
            model: "User".to_string(),
            method: "belongs_to".to_string(),
        };
        assert!(not_defined.is_retriable());
        assert!(!AssociationError::configuration("bad").is_retriable());
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_err = serde_yaml::from_str::<u32>("not a number").unwrap_err();
        let err: AssociationError = yaml_err.into();
        assert!(matches!(err, AssociationError::Configuration(_)));
    }
}
