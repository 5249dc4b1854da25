//! Rate limiting for authentication endpoints.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down
//! credential guessing and email flooding.

use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderName, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use serde_json::json;
use tracing::warn;

use crate::auth::extract_client_ip;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

const LOGIN_PER_SEC: NonZeroU32 = NonZeroU32::new(1).unwrap();
const LOGIN_BURST: NonZeroU32 = NonZeroU32::new(5).unwrap();
const REFRESH_PER_SEC: NonZeroU32 = NonZeroU32::new(10).unwrap();
const EMAIL_REQUESTS_PER_MIN: NonZeroU32 = NonZeroU32::new(3).unwrap();
const USER_CREATE_PER_MIN: NonZeroU32 = NonZeroU32::new(10).unwrap();

#[derive(Clone)]
pub struct RateLimitConfig {
    /// Login attempts (strict: 5 burst, then 1 per second)
    pub login: Arc<IpLimiter>,
    /// Token refreshes (10 per second)
    pub refresh: Arc<IpLimiter>,
    /// Password-reset and activation-link requests (3 per minute)
    pub email_requests: Arc<IpLimiter>,
    /// Admin user creation (10 per minute)
    pub user_create: Arc<IpLimiter>,
    /// Header holding the client IP when running behind a proxy
    pub ip_header: Option<HeaderName>,
}

impl RateLimitConfig {
    pub fn new(ip_header: Option<HeaderName>) -> Self {
        Self {
            login: Arc::new(RateLimiter::keyed(
                Quota::per_second(LOGIN_PER_SEC).allow_burst(LOGIN_BURST),
            )),
            refresh: Arc::new(RateLimiter::keyed(Quota::per_second(REFRESH_PER_SEC))),
            email_requests: Arc::new(RateLimiter::keyed(Quota::per_minute(
                EMAIL_REQUESTS_PER_MIN,
            ))),
            user_create: Arc::new(RateLimiter::keyed(Quota::per_minute(USER_CREATE_PER_MIN))),
            ip_header,
        }
    }
}

async fn check(
    config: &RateLimitConfig,
    limiter: &IpLimiter,
    request: Request,
    next: Next,
) -> Response {
    let ip = match extract_client_ip(&request, config.ip_header.as_ref()) {
        Ok(ip) => ip,
        Err(reason) => {
            warn!(reason, "Rejecting request without client IP");
            return (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "unknown_client" })),
            )
                .into_response();
        }
    };

    match limiter.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            warn!(ip = %ip, path = %request.uri().path(), "Rate limit exceeded");
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error": "too_many_requests" })),
            )
                .into_response()
        }
    }
}

pub async fn rate_limit_login(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    check(&config, &config.login, request, next).await
}

pub async fn rate_limit_refresh(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    check(&config, &config.refresh, request, next).await
}

pub async fn rate_limit_email_requests(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    check(&config, &config.email_requests, request, next).await
}

pub async fn rate_limit_user_create(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    check(&config, &config.user_create, request, next).await
}
