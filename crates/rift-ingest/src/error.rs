//! Error types for the ingestion domain.

use rift_core::PlayerIdentity;

/// The result type used throughout rift-ingest.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in ingestion operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The player could not be resolved upstream or in the store.
    #[error("player not found: {identity}")]
    PlayerNotFound {
        /// The identity that was looked up.
        identity: PlayerIdentity,
    },

    /// A match aggregate failed an internal consistency check.
    ///
    /// Counts against the fetch retry budget; never partially committed.
    #[error("integrity failure: {message}")]
    IntegrityFailure {
        /// Description of the failed check.
        message: String,
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

    /// An upstream API call failed.
    #[error("upstream error: {0}")]
    Upstream(#[from] rift_riot::ApiError),

    /// An error from rift-core.
    #[error("core error: {0}")]
    Core(#[from] rift_core::Error),
}

impl Error {
    /// Creates a new storage error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an integrity failure with the given description.
    #[must_use]
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::IntegrityFailure {
            message: message.into(),
        }
    }

    /// Returns true if this error is a uniqueness race with another writer.
    ///
    /// The storage boundary classifies duplicate-key conflicts once; callers
    /// that treat them as success-by-another-writer branch on this.
    #[must_use]
    pub const fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            Self::Core(rift_core::Error::UniqueConstraintViolation { .. })
        )
    }

    /// Returns true if a later retry of the failed operation could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Upstream(api) => api.is_retryable(),
            Self::Storage { .. } => true,
            Self::PlayerNotFound { .. } | Self::IntegrityFailure { .. } | Self::Core(_) => false,
        }
    }
}
