//! Error types for the relation engine
//!
//! Metadata problems surface as [`InvalidRelationError`] at resolution time.
//! Everything that talks to a repository returns [`ModelResult`], and errors
//! coming out of the repository are handed back untouched.

use std::fmt;

use crate::relations::metadata::RelationType;

/// Result type alias for relation and repository operations
pub type ModelResult<T> = Result<T, ModelError>;

/// Error types for relation and repository operations
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Relation metadata is structurally wrong
    InvalidRelation(InvalidRelationError),
    /// The caller passed arguments the operation cannot work with
    InvalidArgument(String),
    /// Entity not found in the underlying store
    NotFound(String),
    /// Storage or connector error reported by a repository
    Database(String),
    /// Model validation failed
    Validation(String),
    /// Serialization/deserialization error
    Serialization(String),
    /// Configuration error
    Configuration(String),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::InvalidRelation(err) => write!(f, "{}", err),
            ModelError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            ModelError::NotFound(msg) => write!(f, "Entity not found: {}", msg),
            ModelError::Database(msg) => write!(f, "Database error: {}", msg),
            ModelError::Validation(msg) => write!(f, "Validation error: {}", msg),
            ModelError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            ModelError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for ModelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ModelError::InvalidRelation(err) => Some(err),
            _ => None,
        }
    }
}

impl ModelError {
    /// Shorthand for [`ModelError::InvalidArgument`]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        ModelError::InvalidArgument(message.into())
    }

    /// Returns true if this error came from relation metadata resolution
    pub fn is_invalid_relation(&self) -> bool {
        matches!(self, ModelError::InvalidRelation(_))
    }
}

impl From<InvalidRelationError> for ModelError {
    fn from(err: InvalidRelationError) -> Self {
        ModelError::InvalidRelation(err)
    }
}

// Convert from serde_json errors
impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

/// Relation metadata could not be resolved.
///
/// The rendered message is part of the public contract:
/// `Invalid <relationType> definition for <Source>#<property>: <reason>`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {relation_type} definition for {source_model}#{property}: {reason}")]
pub struct InvalidRelationError {
    pub relation_type: RelationType,
    pub source_model: String,
    pub property: String,
    pub reason: String,
}

impl InvalidRelationError {
    pub fn new(
        relation_type: RelationType,
        source_model: impl Into<String>,
        property: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            relation_type,
            source_model: source_model.into(),
            property: property.into(),
            reason: reason.into(),
        }
    }
}
