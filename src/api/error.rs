//! Shared error handling for API endpoints.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::error::AuthError;
use crate::mail::MailError;

/// Extension trait for the authentication-adjacent mapping on Results.
pub trait ResultExt<T> {
    /// See [`ApiError::auth_adjacent`].
    fn auth_adjacent(self) -> Result<T, ApiError>;
}

impl<T> ResultExt<T> for Result<T, AuthError> {
    fn auth_adjacent(self) -> Result<T, ApiError> {
        self.map_err(ApiError::auth_adjacent)
    }
}

/// API error type with automatic response conversion. The payload is the
/// machine-readable error code.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized(&'static str),
    Forbidden(&'static str),
    NotFound(&'static str),
    Conflict(&'static str),
    Unprocessable(&'static str),
    BadGateway(&'static str),
    Internal(&'static str),
}

impl ApiError {
    /// For endpoints where "no such user" must look exactly like a bad
    /// credential or token.
    pub fn auth_adjacent(e: AuthError) -> Self {
        match e {
            AuthError::UserNotFound | AuthError::Token(_) => {
                Self::Unauthorized("invalid_credentials")
            }
            other => other.into(),
        }
    }

    fn internal(context: &AuthError) -> Self {
        error!(error = %context, "Request failed");
        Self::Internal("internal_error")
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        let code = e.code();
        match e {
            AuthError::Token(_)
            | AuthError::AuthenticationFailed
            | AuthError::InvalidActivationToken
            | AuthError::InvalidPasswordToken => Self::Unauthorized(code),
            AuthError::UserInactive | AuthError::Forbidden => Self::Forbidden(code),
            AuthError::UserNotFound => Self::NotFound(code),
            AuthError::UserActivatedBefore
            | AuthError::UserPendingActivation
            | AuthError::UsernameAlreadyTaken
            | AuthError::UserAlreadyExists
            | AuthError::EmailAlreadyTaken
            | AuthError::CannotDeactivateYourself
            | AuthError::LastAdminCannotBeDeactivated
            | AuthError::CannotDemoteYourself
            | AuthError::LastAdminCannotBeDemoted => Self::Conflict(code),
            AuthError::Validation(_) => Self::Unprocessable(code),
            AuthError::Mail(MailError::Unavailable(ref reason)) => {
                error!(reason = %reason, "Email service unavailable");
                Self::BadGateway(code)
            }
            AuthError::Mail(MailError::Rejected(ref reason)) => {
                error!(reason = %reason, "Email was not sent");
                Self::Internal(code)
            }
            AuthError::Repository(_) | AuthError::Signing(_) | AuthError::Hashing(_) => {
                Self::internal(&e)
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match self {
            ApiError::Unauthorized(code) => (StatusCode::UNAUTHORIZED, code),
            ApiError::Forbidden(code) => (StatusCode::FORBIDDEN, code),
            ApiError::NotFound(code) => (StatusCode::NOT_FOUND, code),
            ApiError::Conflict(code) => (StatusCode::CONFLICT, code),
            ApiError::Unprocessable(code) => (StatusCode::UNPROCESSABLE_ENTITY, code),
            ApiError::BadGateway(code) => (StatusCode::BAD_GATEWAY, code),
            ApiError::Internal(code) => (StatusCode::INTERNAL_SERVER_ERROR, code),
        };
        (status, Json(ErrorResponse { error: code })).into_response()
    }
}
