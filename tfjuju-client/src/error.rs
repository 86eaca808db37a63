//! Client error type

use thiserror::Error;
use tfjuju_core::wait::Retryable;

/// Errors returned by controller and JAAS clients
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The requested entity does not exist (yet, or any more)
    #[error("{kind} {name:?} not found")]
    NotFound { kind: String, name: String },

    #[error("{kind} {name:?} already exists")]
    AlreadyExists { kind: String, name: String },

    #[error("permission denied: {0}")]
    Unauthorized(String),

    /// The controller could not serve the request right now
    #[error("controller unavailable: {0}")]
    Unavailable(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Any other error reported by the remote API
    #[error("{0}")]
    Remote(String),
}

impl ClientError {
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl Retryable for ClientError {
    /// A missing entity right after creation is usually eventual consistency,
    /// and an unavailable controller may come back within the wait budget.
    fn is_retryable(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Unavailable(_))
    }
}

/// Result type for client calls
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ClientError::not_found("storage pool", "fast");
        assert_eq!(err.to_string(), "storage pool \"fast\" not found");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ClientError::not_found("machine", "0").is_retryable());
        assert!(ClientError::Unavailable("restarting".to_string()).is_retryable());
        assert!(!ClientError::Unauthorized("no".to_string()).is_retryable());
        assert!(!ClientError::Remote("boom".to_string()).is_retryable());
    }
}
