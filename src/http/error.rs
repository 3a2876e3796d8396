use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::api::ApiError;
use crate::capture::CaptureError;
use crate::session::{ErrorKind, SessionError};

/// Errors returned by the control API
#[derive(Debug, Error)]
pub enum HttpError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Remote(#[from] ApiError),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unavailable(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
    pub retryable: bool,
}

impl HttpError {
    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::Session(e) => session_status(e),
            HttpError::Remote(_) => StatusCode::BAD_GATEWAY,
            HttpError::NotFound(_) => StatusCode::NOT_FOUND,
            HttpError::Conflict(_) => StatusCode::CONFLICT,
            HttpError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HttpError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn body(&self) -> ErrorResponse {
        match self {
            HttpError::Session(e) => ErrorResponse {
                error: e.user_message(),
                kind: e.kind(),
                retryable: e.is_retryable(),
            },
            HttpError::Remote(e) => ErrorResponse {
                error: e.to_string(),
                kind: ErrorKind::Network,
                retryable: e.is_retryable(),
            },
            HttpError::Unavailable(message) => ErrorResponse {
                error: message.clone(),
                kind: ErrorKind::Permission,
                retryable: true,
            },
            other => ErrorResponse {
                error: other.to_string(),
                kind: ErrorKind::Validation,
                retryable: false,
            },
        }
    }
}

fn session_status(err: &SessionError) -> StatusCode {
    match err {
        SessionError::EmptyArtifact => StatusCode::UNPROCESSABLE_ENTITY,
        SessionError::Locked => StatusCode::FORBIDDEN,
        SessionError::InvalidPhase { .. } | SessionError::Busy => StatusCode::CONFLICT,
        SessionError::Capture(CaptureError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        SessionError::Capture(_) | SessionError::Unexpected(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        SessionError::Remote(_) | SessionError::SubmitTimeout(_) => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
