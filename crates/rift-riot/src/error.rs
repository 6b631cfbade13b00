//! Typed errors for the upstream match-data API.
//!
//! The upstream is rate-limited and unreliable: any call may time out, return
//! not-found, or hand back a partial payload. The engine never sees raw HTTP
//! failures; every outcome is classified here so retry decisions stay in the
//! fetch state machines.

/// The result type for upstream API calls.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Errors returned by the upstream match-data API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The requested entity does not exist upstream.
    ///
    /// Terminal for that lookup; never retried.
    #[error("not found upstream: {resource}")]
    NotFound {
        /// Description of the missing resource (endpoint + id).
        resource: String,
    },

    /// The upstream rejected the call due to rate limiting.
    #[error("rate limited by upstream")]
    RateLimited {
        /// Retry-After hint in seconds, when the upstream provided one.
        retry_after_secs: Option<u64>,
    },

    /// A transient upstream failure (5xx or similar).
    #[error("transient upstream failure (status {status}): {message}")]
    Transient {
        /// HTTP status code.
        status: u16,
        /// Response body or status text.
        message: String,
    },

    /// The upstream returned a payload that could not be interpreted.
    #[error("malformed upstream payload: {message}")]
    Malformed {
        /// Description of what failed to parse.
        message: String,
    },

    /// A network-level failure (connect, timeout, TLS).
    #[error("transport failure: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ApiError {
    /// Creates a not-found error for the given resource description.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Creates a transport error with a source cause.
    #[must_use]
    pub fn transport(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns true if retrying the call later could succeed.
    ///
    /// Not-found and malformed payloads are terminal for the lookup;
    /// everything else counts as a transient failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Transient { .. } | Self::Transport { .. }
        )
    }
}
