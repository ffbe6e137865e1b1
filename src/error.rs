use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::response::envelope;

/// Client-facing failure classes. Everything that reaches a response body
/// goes through here so the envelope shape is uniform.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    /// Unknown identifier and wrong password produce the same message.
    #[error("Email/password salah")]
    InvalidCredentials,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    /// Unknown and expired reset tokens share one message so the endpoint
    /// never confirms whether a token exists.
    #[error("Token tidak valid atau telah kedaluwarsa")]
    InvalidResetToken,

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_)
            | ApiError::InvalidCredentials
            | ApiError::InvalidResetToken => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            // Raw store/mailer errors are logged, never serialized.
            ApiError::Internal(e) => {
                error!(error = %e, "internal error");
                "Terjadi kesalahan pada server".to_string()
            }
            other => other.to_string(),
        };
        envelope::<()>(self.status(), None, message).into_response()
    }
}
