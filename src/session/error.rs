use serde::Serialize;
use thiserror::Error;

use super::phase::Phase;
use crate::api::ApiError;
use crate::capture::CaptureError;

/// Error category shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Capture device/resource unavailable
    Permission,
    /// Slot creation or submission failed remotely
    Network,
    /// Rejected locally before any network call
    Validation,
    Unexpected,
}

/// Errors returned by the session controller
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("capture unavailable: {0}")]
    Capture(#[from] CaptureError),

    #[error("scoring service error: {0}")]
    Remote(#[from] ApiError),

    #[error("submission timed out after {0}s")]
    SubmitTimeout(u64),

    #[error("the response is empty")]
    EmptyArtifact,

    #[error("this prompt is locked for the current account")]
    Locked,

    #[error("cannot {operation} while the session is in {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: Phase,
    },

    #[error("another request is still in progress")]
    Busy,

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Capture(CaptureError::Unavailable(_)) => ErrorKind::Permission,
            SessionError::Capture(_) => ErrorKind::Unexpected,
            SessionError::Remote(_) | SessionError::SubmitTimeout(_) => ErrorKind::Network,
            SessionError::EmptyArtifact
            | SessionError::Locked
            | SessionError::InvalidPhase { .. }
            | SessionError::Busy => ErrorKind::Validation,
            SessionError::Unexpected(_) => ErrorKind::Unexpected,
        }
    }

    /// Whether repeating the same operation may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            SessionError::Capture(CaptureError::Unavailable(_)) => true,
            SessionError::Remote(e) => e.is_retryable(),
            SessionError::SubmitTimeout(_) | SessionError::Busy => true,
            _ => false,
        }
    }

    /// Message suitable for a toast
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Capture(CaptureError::Unavailable(_)) => {
                "Microphone access denied or not available. Check permissions and try again."
                    .to_string()
            }
            SessionError::Remote(ApiError::Status { message, .. }) => message.clone(),
            SessionError::Remote(ApiError::Timeout) | SessionError::SubmitTimeout(_) => {
                "The scoring service took too long to respond. Your response is kept; try again."
                    .to_string()
            }
            SessionError::Remote(_) => {
                "Could not reach the scoring service. Check your connection and try again."
                    .to_string()
            }
            SessionError::EmptyArtifact => "Your response is empty.".to_string(),
            SessionError::Locked => "Sign in to attempt this prompt.".to_string(),
            other => other.to_string(),
        }
    }
}
