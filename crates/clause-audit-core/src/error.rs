//! Error taxonomy shared by the segmenter, the orchestrator, and the
//! collaborator traits.
//!
//! Only [`InputError`] is meant to reach a caller. The other kinds are
//! recovered inside the component that produced them: model failures turn
//! into degraded results, precedent failures into the keyword fallback or
//! an empty list, trace failures are dropped.

use std::path::PathBuf;

use thiserror::Error;

/// Malformed document input or segmentation options.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("document is not valid UTF-8 text (invalid byte at offset {offset})")]
    NotText { offset: usize },

    #[error("invalid segmentation options: {0}")]
    InvalidOptions(String),
}

/// Any failure of a single model attempt.
///
/// Every variant is retryable by default; see
/// [`RetryPolicy`](crate::retry::RetryPolicy) for the opt-in exception.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model request failed: {0}")]
    Transport(String),

    #[error("model request timed out after {0}s")]
    Timeout(u64),

    #[error("model endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("no content returned from model response")]
    EmptyContent,

    #[error("model returned non-JSON content")]
    Unparseable,

    #[error("parsed model response is not a JSON object")]
    NotAnObject,

    #[error("model client misconfigured: {0}")]
    Config(String),
}

impl ModelError {
    /// Errors that no amount of retrying will fix: missing credentials,
    /// rejected credentials, or a client that cannot be built.
    pub fn is_configuration(&self) -> bool {
        match self {
            ModelError::Config(_) => true,
            ModelError::Status { status, .. } => *status == 401 || *status == 403,
            _ => false,
        }
    }

    /// Short machine-friendly label used in degraded-result reasons.
    pub fn kind(&self) -> &'static str {
        match self {
            ModelError::Transport(_) | ModelError::Timeout(_) | ModelError::Status { .. } => {
                "llm_error"
            }
            ModelError::EmptyContent | ModelError::Unparseable | ModelError::NotAnObject => {
                "parse_error"
            }
            ModelError::Config(_) => "config_error",
        }
    }
}

/// Failures on the precedent lookup path.
#[derive(Debug, Error)]
pub enum PrecedentError {
    #[error("similarity store lookup failed: {0}")]
    Lookup(String),

    #[error("failed to load reference corpus {path}: {reason}")]
    CorpusLoad { path: PathBuf, reason: String },
}

/// A trace record could not be appended.
#[derive(Debug, Error)]
#[error("failed to append trace entry: {0}")]
pub struct TraceWriteError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors() {
        assert!(ModelError::Config("no key".into()).is_configuration());
        assert!(ModelError::Status {
            status: 401,
            body: String::new()
        }
        .is_configuration());
        assert!(!ModelError::Status {
            status: 503,
            body: String::new()
        }
        .is_configuration());
        assert!(!ModelError::Timeout(20).is_configuration());
        assert!(!ModelError::Unparseable.is_configuration());
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(ModelError::Transport("reset".into()).kind(), "llm_error");
        assert_eq!(ModelError::NotAnObject.kind(), "parse_error");
        assert_eq!(ModelError::Config("x".into()).kind(), "config_error");
    }
}
