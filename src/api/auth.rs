//! Session API endpoints.
//!
//! - POST `/login` - Exchange username/email and password for a token pair
//! - POST `/refresh` - Exchange a refresh token for a new token pair
//! - POST `/logout` - Revoke every access and refresh token of the caller
//! - GET `/verify` - Check that the presented access token is still current

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use super::error::{ApiError, ResultExt};
use crate::accounts::{AccountService, TokenPair};
use crate::auth::{AnyRole, Auth};
use crate::impl_has_accounts;
use crate::rate_limit::{RateLimitConfig, rate_limit_login, rate_limit_refresh};

#[derive(Clone)]
pub struct AuthState {
    pub accounts: Arc<AccountService>,
    pub rate_limits: Option<Arc<RateLimitConfig>>,
}

impl_has_accounts!(AuthState);

pub fn router(state: AuthState) -> Router {
    let session_router = Router::new()
        .route("/logout", post(logout))
        .route("/verify", get(verify))
        .with_state(state.clone());

    let login_router = Router::new()
        .route("/login", post(login))
        .with_state(state.clone());

    let refresh_router = Router::new()
        .route("/refresh", post(refresh))
        .with_state(state.clone());

    let (login_router, refresh_router) = match state.rate_limits {
        Some(limits) => (
            login_router.layer(middleware::from_fn_with_state(
                limits.clone(),
                rate_limit_login,
            )),
            refresh_router.layer(middleware::from_fn_with_state(limits, rate_limit_refresh)),
        ),
        None => (login_router, refresh_router),
    };

    Router::new()
        .merge(session_router)
        .merge(login_router)
        .merge(refresh_router)
}

#[derive(Deserialize)]
struct LoginRequest {
    identifier: String,
    password: String,
}

#[derive(Deserialize)]
struct RefreshRequest {
    refresh_token: String,
}

#[derive(Serialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    token_type: &'static str,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "bearer",
        }
    }
}

#[derive(Serialize)]
struct VerifyResponse {
    sub: String,
    #[serde(rename = "type")]
    token_type: &'static str,
}

async fn login(
    State(state): State<AuthState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let pair = state
        .accounts
        .login(&request.identifier, &request.password)
        .await?;
    Ok(Json(pair.into()))
}

async fn refresh(
    State(state): State<AuthState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let pair = state.accounts.refresh(&request.refresh_token).await?;
    Ok(Json(pair.into()))
}

async fn logout(
    State(state): State<AuthState>,
    auth: Auth<AnyRole>,
) -> Result<StatusCode, ApiError> {
    state.accounts.logout(auth.user().id()).await.auth_adjacent()?;
    Ok(StatusCode::NO_CONTENT)
}

async fn verify(auth: Auth<AnyRole>) -> Json<VerifyResponse> {
    Json(VerifyResponse {
        sub: auth.claims().subject.to_string(),
        token_type: auth.claims().purpose.as_str(),
    })
}
