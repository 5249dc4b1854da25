mod auth;
mod error;
mod me;
mod users;

use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::accounts::AccountService;
use crate::rate_limit::RateLimitConfig;

pub use error::ApiError;
pub use me::{ACTIVATION_REQUEST_MESSAGE, RESET_REQUEST_MESSAGE};

/// Create the API router.
pub fn create_api_router(
    accounts: Arc<AccountService>,
    rate_limits: Option<Arc<RateLimitConfig>>,
) -> Router {
    let auth_state = auth::AuthState {
        accounts: accounts.clone(),
        rate_limits: rate_limits.clone(),
    };

    let me_state = me::MeState {
        accounts: accounts.clone(),
        rate_limits: rate_limits.clone(),
    };

    let users_state = users::UsersState {
        accounts,
        rate_limits,
    };

    Router::new()
        .nest("/auth", auth::router(auth_state))
        .nest("/me", me::router(me_state))
        .nest("/users", users::router(users_state))
}

/// Liveness probe.
pub fn health_router() -> Router {
    Router::new().route("/healthz", get(health))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
