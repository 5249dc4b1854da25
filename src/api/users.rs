//! User administration endpoints.
//!
//! - POST `/` - Create a pending user and mail the activation link (admin)
//! - POST `/resend-activation` - Re-mail the activation link (admin)
//! - GET `/` - List users (admin)
//! - GET `/{id}` - Read one user (admin, or the user themselves)
//! - PATCH `/{id}/activate`, `/deactivate`, `/promote`, `/demote` (admin)

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, patch, post},
};
use serde::Deserialize;
use uuid::Uuid;

use super::error::ApiError;
use crate::accounts::{AccountService, ListUsersQuery, UserPage, UserView};
use crate::auth::{AdminOnly, Auth};
use crate::impl_has_accounts;
use crate::rate_limit::{RateLimitConfig, rate_limit_user_create};

#[derive(Clone)]
pub struct UsersState {
    pub accounts: Arc<AccountService>,
    pub rate_limits: Option<Arc<RateLimitConfig>>,
}

impl_has_accounts!(UsersState);

pub fn router(state: UsersState) -> Router {
    let admin_router = Router::new()
        .route("/", get(list_users))
        .route("/resend-activation", post(resend_activation))
        .route("/{id}", get(get_user))
        .route("/{id}/activate", patch(activate_user))
        .route("/{id}/deactivate", patch(deactivate_user))
        .route("/{id}/promote", patch(promote_user))
        .route("/{id}/demote", patch(demote_user))
        .with_state(state.clone());

    let create_router = Router::new()
        .route("/", post(create_user))
        .with_state(state.clone());

    let create_router = match state.rate_limits {
        Some(limits) => create_router.layer(middleware::from_fn_with_state(
            limits,
            rate_limit_user_create,
        )),
        None => create_router,
    };

    Router::new().merge(admin_router).merge(create_router)
}

#[derive(Deserialize)]
struct EmailRequest {
    email: String,
}

async fn create_user(
    State(state): State<UsersState>,
    _admin: Auth<AdminOnly>,
    Json(request): Json<EmailRequest>,
) -> Result<(StatusCode, Json<UserView>), ApiError> {
    let user = state.accounts.create_user(&request.email).await?;
    Ok((StatusCode::CREATED, Json(UserView::from(&user))))
}

async fn resend_activation(
    State(state): State<UsersState>,
    _admin: Auth<AdminOnly>,
    Json(request): Json<EmailRequest>,
) -> Result<StatusCode, ApiError> {
    state.accounts.resend_activation(&request.email).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn list_users(
    State(state): State<UsersState>,
    _admin: Auth<AdminOnly>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<UserPage>, ApiError> {
    Ok(Json(state.accounts.list_users(&query).await?))
}

async fn get_user(
    State(state): State<UsersState>,
    auth: Auth,
    Path(id): Path<Uuid>,
) -> Result<Json<UserView>, ApiError> {
    let user = state.accounts.get_user(auth.user(), id).await?;
    Ok(Json(UserView::from(&user)))
}

async fn activate_user(
    State(state): State<UsersState>,
    _admin: Auth<AdminOnly>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserView>, ApiError> {
    let user = state.accounts.activate_user(id).await?;
    Ok(Json(UserView::from(&user)))
}

async fn deactivate_user(
    State(state): State<UsersState>,
    admin: Auth<AdminOnly>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserView>, ApiError> {
    let user = state.accounts.deactivate_user(admin.user().id(), id).await?;
    Ok(Json(UserView::from(&user)))
}

async fn promote_user(
    State(state): State<UsersState>,
    _admin: Auth<AdminOnly>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserView>, ApiError> {
    let user = state.accounts.promote_user(id).await?;
    Ok(Json(UserView::from(&user)))
}

async fn demote_user(
    State(state): State<UsersState>,
    admin: Auth<AdminOnly>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserView>, ApiError> {
    let user = state.accounts.demote_user(admin.user().id(), id).await?;
    Ok(Json(UserView::from(&user)))
}
