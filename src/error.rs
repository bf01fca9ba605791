use thiserror::Error;

/// Main error type for the memory engine
#[derive(Debug, Error, Clone)]
pub enum MemoryError {
    /// The remote memory store could not be reached or returned a transport-level failure
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The local cache/index store (KV) could not be reached
    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    /// The requested memory does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller supplied invalid input
    #[error("invalid request: {0}")]
    Invalid(String),

    /// An operation exceeded its configured deadline
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Anything else, including serialization and configuration failures
    #[error("internal error: {0}")]
    Internal(String),
}

impl MemoryError {
    /// Whether this error originates from the authoritative remote store
    pub fn is_backend_error(&self) -> bool {
        matches!(self, MemoryError::BackendUnavailable(_))
    }

    /// Whether this error originates from the local cache/index tier
    pub fn is_cache_error(&self) -> bool {
        matches!(self, MemoryError::CacheUnavailable(_))
    }

    /// Short machine-readable kind, used in tool-surface error text and logs
    pub fn kind(&self) -> &'static str {
        match self {
            MemoryError::BackendUnavailable(_) => "backend_unavailable",
            MemoryError::CacheUnavailable(_) => "cache_unavailable",
            MemoryError::NotFound(_) => "not_found",
            MemoryError::Invalid(_) => "invalid",
            MemoryError::Timeout(_) => "timeout",
            MemoryError::Internal(_) => "internal",
        }
    }
}

impl From<serde_json::Error> for MemoryError {
    fn from(err: serde_json::Error) -> Self {
        MemoryError::Internal(format!("serialization error: {err}"))
    }
}

impl From<std::io::Error> for MemoryError {
    fn from(err: std::io::Error) -> Self {
        MemoryError::Internal(format!("io error: {err}"))
    }
}

/// Result type alias used throughout the engine
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Validation error for request parameters, surfaced to callers as `MemoryError::Invalid`
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid user id: {0}")]
    InvalidUserId(String),

    #[error("invalid content: {0}")]
    InvalidContent(String),

    #[error("invalid limit: {0}")]
    InvalidLimit(String),

    #[error("invalid threshold: {0}")]
    InvalidThreshold(String),
}

impl From<ValidationError> for MemoryError {
    fn from(err: ValidationError) -> Self {
        MemoryError::Invalid(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(MemoryError::NotFound("x".into()).kind(), "not_found");
        assert_eq!(MemoryError::Timeout("x".into()).kind(), "timeout");
    }

    #[test]
    fn backend_and_cache_classification() {
        assert!(MemoryError::BackendUnavailable("down".into()).is_backend_error());
        assert!(!MemoryError::BackendUnavailable("down".into()).is_cache_error());
        assert!(MemoryError::CacheUnavailable("down".into()).is_cache_error());
    }

    #[test]
    fn validation_error_maps_to_invalid() {
        let err: MemoryError = ValidationError::InvalidLimit("too big".into()).into();
        assert!(matches!(err, MemoryError::Invalid(_)));
    }
}
