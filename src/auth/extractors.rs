//! Axum extractors for authentication.

use std::marker::PhantomData;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use tracing::error;

use super::errors::{ApiAuthError, AuthErrorKind};
use super::state::HasAccounts;
use crate::accounts::Session;
use crate::error::AuthError;
use crate::tokens::{Claims, TokenError, bearer_token};
use crate::user::User;

/// Extra check applied after the token resolved to a live user.
pub trait RoleConstraint: Send + Sync + 'static {
    fn check(user: &User) -> Result<(), AuthErrorKind>;
}

/// Any holder of a current access token, active or not.
pub struct AnyRole;

/// Active users only.
pub struct ActiveOnly;

/// Active admins only.
pub struct AdminOnly;

impl RoleConstraint for AnyRole {
    fn check(_user: &User) -> Result<(), AuthErrorKind> {
        Ok(())
    }
}

impl RoleConstraint for ActiveOnly {
    fn check(user: &User) -> Result<(), AuthErrorKind> {
        if user.is_active() {
            Ok(())
        } else {
            Err(AuthErrorKind::AccountInactive)
        }
    }
}

impl RoleConstraint for AdminOnly {
    fn check(user: &User) -> Result<(), AuthErrorKind> {
        ActiveOnly::check(user)?;
        if user.is_admin() {
            Ok(())
        } else {
            Err(AuthErrorKind::InsufficientRole)
        }
    }
}

/// Authenticated caller, resolved from `Authorization: Bearer <token>`.
pub struct Auth<R: RoleConstraint = ActiveOnly> {
    pub session: Session,
    _role: PhantomData<R>,
}

impl<R: RoleConstraint> Auth<R> {
    pub fn user(&self) -> &User {
        &self.session.user
    }

    pub fn claims(&self) -> &Claims {
        &self.session.claims
    }
}

fn rejection(e: AuthError) -> AuthErrorKind {
    match e {
        AuthError::Token(TokenError::Revoked) => AuthErrorKind::TokenRevoked,
        AuthError::Token(_) => AuthErrorKind::InvalidToken,
        AuthError::UserNotFound => AuthErrorKind::UserNotFound,
        other => {
            error!(error = %other, "Failed to authenticate request");
            AuthErrorKind::Internal
        }
    }
}

impl<S, R> FromRequestParts<S> for Auth<R>
where
    S: HasAccounts + Send + Sync,
    R: RoleConstraint,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .ok_or(AuthErrorKind::NotAuthenticated)?;

        let session = state
            .accounts()
            .verify_access(token)
            .await
            .map_err(rejection)?;

        R::check(&session.user)?;

        Ok(Auth {
            session,
            _role: PhantomData,
        })
    }
}
