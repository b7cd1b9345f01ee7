use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

use crate::config::ConfigError;
use crate::domain::errors::{BeginSignInError, SignInFailure};

/// The only text an end user sees when sign-in fails, whatever the cause.
pub const SIGN_IN_FAILED_MESSAGE: &str = "sign-in could not be completed, please try again";

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Conflict(String),
    SignInFailed,
    Internal(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::SignInFailed => write!(f, "Sign-in failed"),
            ApiError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::SignInFailed => (StatusCode::BAD_REQUEST, SIGN_IN_FAILED_MESSAGE.to_string()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

// Every sign-in failure looks the same from the outside; the distinct
// reasons live in logs and metrics
impl From<SignInFailure> for ApiError {
    fn from(_: SignInFailure) -> Self {
        ApiError::SignInFailed
    }
}

// Setup defects are for the operator, not the user
impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        tracing::error!(error = %err, "OAuth configuration error");
        ApiError::Internal("sign-in is not configured correctly".to_string())
    }
}

impl From<BeginSignInError> for ApiError {
    fn from(err: BeginSignInError) -> Self {
        match err {
            BeginSignInError::Configuration(e) => e.into(),
            BeginSignInError::AlreadyAuthenticated => {
                ApiError::Conflict("already signed in".to_string())
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
