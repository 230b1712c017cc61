//! Error types shared across Lectern crates

use thiserror::Error;

/// Shape errors for records and payloads coming off the wire.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Expected a JSON object, got {found}")]
    NotAnObject { found: &'static str },

    #[error("Record is missing its id field")]
    MissingId,
}

/// Failure of a page fetch.
///
/// Cloneable so one failed fetch can be handed to every caller that was
/// waiting on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Not authenticated")]
    Unauthorized,

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid list response: {0}")]
    Decode(String),
}

impl FetchError {
    /// Whether the failure means the session is no longer valid.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        let err = FetchError::Status {
            status: 503,
            message: "maintenance".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 503: maintenance");
        assert!(!err.is_unauthorized());
        assert!(FetchError::Unauthorized.is_unauthorized());
    }
}
