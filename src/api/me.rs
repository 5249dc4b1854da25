//! Self-service account endpoints.
//!
//! - GET `/` - Current user
//! - POST `/change-password` - Replace the credential (revokes all sessions)
//! - POST `/change-email` - Move the account to another email
//! - POST `/reset-password-request` - Mail a reset link (always reports success)
//! - POST `/reset-password` - Redeem a reset link
//! - POST `/activation-request` - Re-mail the activation link (always reports success)
//! - POST `/first-activation` - Redeem an activation link

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
use crate::accounts::{AccountService, UserView};
use crate::auth::Auth;
use crate::impl_has_accounts;
use crate::rate_limit::{RateLimitConfig, rate_limit_email_requests};

pub const RESET_REQUEST_MESSAGE: &str =
    "if user exists and is active a link was sent to reset password";
pub const ACTIVATION_REQUEST_MESSAGE: &str =
    "if user exists and is pending activation a link was sent";

#[derive(Clone)]
pub struct MeState {
    pub accounts: Arc<AccountService>,
    pub rate_limits: Option<Arc<RateLimitConfig>>,
}

impl_has_accounts!(MeState);

pub fn router(state: MeState) -> Router {
    let account_router = Router::new()
        .route("/", get(me))
        .route("/change-password", post(change_password))
        .route("/change-email", post(change_email))
        .route("/reset-password", post(confirm_password_reset))
        .route("/first-activation", post(first_activation))
        .with_state(state.clone());

    let request_router = Router::new()
        .route("/reset-password-request", post(request_password_reset))
        .route("/activation-request", post(request_activation))
        .with_state(state.clone());

    let request_router = match state.rate_limits {
        Some(limits) => request_router.layer(middleware::from_fn_with_state(
            limits,
            rate_limit_email_requests,
        )),
        None => request_router,
    };

    Router::new().merge(account_router).merge(request_router)
}

#[derive(Deserialize)]
struct ChangePasswordRequest {
    old_password: String,
    new_password: String,
}

#[derive(Deserialize)]
struct ChangeEmailRequest {
    new_email: String,
    password: String,
}

#[derive(Deserialize)]
struct EmailRequest {
    email: String,
}

#[derive(Deserialize)]
struct ResetPasswordRequest {
    token: String,
    new_password: String,
}

#[derive(Deserialize)]
struct FirstActivationRequest {
    token: String,
    username: String,
    password: String,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

async fn me(auth: Auth) -> Json<UserView> {
    Json(UserView::from(auth.user()))
}

async fn change_password(
    State(state): State<MeState>,
    auth: Auth,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .accounts
        .change_password(auth.user().id(), &request.old_password, &request.new_password)
        .await
        .auth_adjacent()?;
    Ok(StatusCode::NO_CONTENT)
}

async fn change_email(
    State(state): State<MeState>,
    auth: Auth,
    Json(request): Json<ChangeEmailRequest>,
) -> Result<Json<UserView>, ApiError> {
    let user = state
        .accounts
        .change_email(auth.user().id(), &request.new_email, &request.password)
        .await
        .auth_adjacent()?;
    Ok(Json(UserView::from(&user)))
}

async fn request_password_reset(
    State(state): State<MeState>,
    Json(request): Json<EmailRequest>,
) -> Json<MessageResponse> {
    state.accounts.request_password_reset(&request.email).await;
    Json(MessageResponse {
        message: RESET_REQUEST_MESSAGE,
    })
}

async fn confirm_password_reset(
    State(state): State<MeState>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .accounts
        .confirm_password_reset(&request.token, &request.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn request_activation(
    State(state): State<MeState>,
    Json(request): Json<EmailRequest>,
) -> Json<MessageResponse> {
    state.accounts.request_activation(&request.email).await;
    Json(MessageResponse {
        message: ACTIVATION_REQUEST_MESSAGE,
    })
}

async fn first_activation(
    State(state): State<MeState>,
    Json(request): Json<FirstActivationRequest>,
) -> Result<(StatusCode, Json<UserView>), ApiError> {
    let user = state
        .accounts
        .confirm_first_activation(&request.token, &request.username, &request.password)
        .await?;
    Ok((StatusCode::CREATED, Json(UserView::from(&user))))
}
