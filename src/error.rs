// AutoClipper Error Taxonomy
// Copyright (c) 2026 Xing_The_Creator | AutoClipper

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClipError>;

#[derive(Debug, Error)]
pub enum ClipError {
    /// Network, timeout or overloaded backend. Safe to retry with backoff.
    #[error("transient I/O failure on backend '{backend}': {message}")]
    TransientIo { backend: String, message: String },

    /// The backend answered, but not with schema-shaped JSON.
    #[error("malformed response: {reason}")]
    MalformedResponse { raw: String, reason: String },

    #[error("EDL violates constraints: {}", .errors.join("; "))]
    ConstraintViolation { errors: Vec<String> },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("repair budget exhausted after {attempts} attempt(s): {}", .errors.join("; "))]
    ExhaustedRepair { attempts: u32, errors: Vec<String> },

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("no clip candidates discovered ({failed_chunks} of {total_chunks} chunks failed)")]
    NoCandidates {
        failed_chunks: usize,
        total_chunks: usize,
    },

    /// Rerank answered, but nothing in it survived enforcement. Carries
    /// the model's answer so the repair loop can explain why.
    #[error("no clip survived enforcement ({proposed} proposed)")]
    EmptySelection { proposed: usize, raw: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClipError {
    pub fn transient(backend: &str, message: impl Into<String>) -> Self {
        Self::TransientIo {
            backend: backend.to_string(),
            message: message.into(),
        }
    }

    pub fn malformed(raw: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            raw: raw.into(),
            reason: reason.into(),
        }
    }

    /// Only transport failures qualify for a blind retry. Everything else is
    /// either fatal or goes through the repair loop.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientIo { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_errors_are_transient() {
        assert!(ClipError::transient("chat", "connection reset").is_transient());
        assert!(!ClipError::malformed("{", "eof").is_transient());
        assert!(!ClipError::Configuration("bad".into()).is_transient());
        assert!(!ClipError::Cancelled("deadline".into()).is_transient());
    }

    #[test]
    fn test_violation_message_lists_every_error() {
        let err = ClipError::ConstraintViolation {
            errors: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.to_string(), "EDL violates constraints: a; b");
    }

    #[test]
    fn test_empty_selection_is_not_retried() {
        let err = ClipError::EmptySelection {
            proposed: 2,
            raw: "{}".into(),
        };
        assert!(!err.is_transient());
        assert_eq!(err.to_string(), "no clip survived enforcement (2 proposed)");
    }
}
