//! Error types and result aliases shared across Rift components.
//!
//! Errors are structured for programmatic handling: the storage layer decides
//! *once* whether a write lost a uniqueness race and reports it as
//! [`Error::UniqueConstraintViolation`], so callers never inspect
//! driver-specific error text to detect duplicate keys.

use std::fmt;

/// The result type used throughout Rift.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in core Rift operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An invalid identifier was provided.
    #[error("invalid identifier: {message}")]
    InvalidId {
        /// Description of what made the ID invalid.
        message: String,
    },

    /// A required identity field was absent.
    ///
    /// This is a validation failure: it fails fast and is never retried.
    #[error("missing required identifier: {field}")]
    MissingIdentifier {
        /// The name of the absent field (e.g. `puuid`).
        field: &'static str,
    },

    /// A storage operation failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A write lost a uniqueness race with a concurrent writer.
    ///
    /// Classified at the storage boundary. Callers that treat a duplicate
    /// insert as success-by-another-writer match on this variant.
    #[error("unique constraint violation: {constraint}")]
    UniqueConstraintViolation {
        /// The logical constraint that rejected the write
        /// (e.g. `matches.match_id`, `players.puuid`).
        constraint: &'static str,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// The requested resource was not found.
    #[error("not found: {resource_type} with id {id}")]
    ResourceNotFound {
        /// The type of resource that was not found.
        resource_type: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// A precondition for the operation was not met.
    #[error("precondition failed: {message}")]
    PreconditionFailed {
        /// Description of the failed precondition.
        message: String,
    },

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a new storage error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source cause.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new resource not found error.
    #[must_use]
    pub fn resource_not_found(resource_type: &'static str, id: impl fmt::Display) -> Self {
        Self::ResourceNotFound {
            resource_type,
            id: id.to_string(),
        }
    }

    /// Creates a unique constraint violation for the named constraint.
    #[must_use]
    pub const fn unique_violation(constraint: &'static str) -> Self {
        Self::UniqueConstraintViolation { constraint }
    }

    /// Returns true if this error is a uniqueness race with another writer.
    #[must_use]
    pub const fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueConstraintViolation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_classification() {
        let err = Error::unique_violation("matches.match_id");
        assert!(err.is_unique_violation());
        assert!(err.to_string().contains("matches.match_id"));

        let other = Error::storage("connection reset");
        assert!(!other.is_unique_violation());
    }

    #[test]
    fn missing_identifier_display() {
        let err = Error::MissingIdentifier { field: "puuid" };
        assert_eq!(err.to_string(), "missing required identifier: puuid");
    }

    #[test]
    fn storage_error_with_source() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "row vanished");
        let err = Error::storage_with_source("failed to read player", source);
        assert!(err.to_string().contains("storage error"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn resource_not_found_display() {
        let err = Error::resource_not_found("player", "abc-123");
        assert!(err.to_string().contains("player"));
        assert!(err.to_string().contains("abc-123"));
    }
}
