use axum::http::{header, HeaderValue, StatusCode};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::store::StoreError;

/// Standard error type for the authentication engine.
///
/// Every variant is per-request; none of them is fatal to the process.
/// The response body never says *why* a credential was refused.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Too many requests, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl AuthError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code string for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MalformedRequest(_) => "BAD_REQUEST",
            AuthError::InvalidCredentials => "UNAUTHORIZED",
            AuthError::RateLimited { .. } => "TOO_MANY_REQUESTS",
            AuthError::Internal(_) => "INTERNAL_ERROR",
            AuthError::Store(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to hand to the caller.
    pub fn public_message(&self) -> String {
        match self {
            AuthError::MalformedRequest(msg) => msg.clone(),
            AuthError::InvalidCredentials => "Invalid credentials".to_string(),
            AuthError::RateLimited { .. } => {
                "Too many attempts. Please try again later.".to_string()
            }
            AuthError::Internal(_) | AuthError::Store(_) => "Internal server error".to_string(),
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AuthError::Store(StoreError::Timeout) | AuthError::RateLimited { .. }
        )
    }
}

/// Error detail for API responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// Error envelope: `{"error": {"code": "...", "message": "..."}}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

impl axum::response::IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();

        match &self {
            AuthError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed with internal error");
            }
            AuthError::Store(source) => {
                tracing::error!(error = %source, retryable = self.is_retryable(), "store failure");
            }
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.public_message(),
            },
        };

        let mut response = (status, axum::Json(body)).into_response();
        if let AuthError::RateLimited { retry_after } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
