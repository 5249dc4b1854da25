pub mod accounts;
pub mod api;
pub mod auth;
pub mod cli;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod jwt;
pub mod mail;
pub mod password;
pub mod rate_limit;
pub mod tokens;
pub mod user;
pub mod validation;

use accounts::AccountService;
use api::{create_api_router, health_router};
use axum::Router;
use clock::Clock;
use config::TokenSettings;
use db::UserRepository;
use mail::{LinkBuilder, Mailer, Notifier};
use password::CredentialHasher;
use rate_limit::RateLimitConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokens::TokenServices;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use url::Url;

pub struct ServerConfig {
    /// User persistence (sqlite in production, in-memory in tests)
    pub users: Arc<dyn UserRepository>,
    /// Signing secret, algorithm and token lifetimes
    pub tokens: TokenSettings,
    /// Public base URL used to build links in emails
    pub public_url: Url,
    /// Outbound email transport
    pub mailer: Arc<dyn Mailer>,
    /// Credential hashing
    pub hasher: Arc<dyn CredentialHasher>,
    /// Time source for token timestamps and record bookkeeping
    pub clock: Arc<dyn Clock>,
    /// Per-IP rate limits, or None to disable them
    pub rate_limits: Option<RateLimitConfig>,
}

impl ServerConfig {
    /// Build the account service this configuration describes.
    pub fn account_service(&self) -> AccountService {
        AccountService::new(
            self.users.clone(),
            self.hasher.clone(),
            Notifier::new(self.mailer.clone(), LinkBuilder::new(self.public_url.clone())),
            TokenServices::new(&self.tokens, self.clock.clone()),
            self.clock.clone(),
        )
    }
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let accounts = Arc::new(config.account_service());
    let rate_limits = config.rate_limits.clone().map(Arc::new);

    Router::new()
        .nest("/api", create_api_router(accounts, rate_limits))
        .merge(health_router())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
