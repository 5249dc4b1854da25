//! CLI argument parsing, validation, and startup helpers.

use std::sync::Arc;

use axum::http::HeaderName;
use clap::Parser;
use jsonwebtoken::Algorithm;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use url::Url;

use crate::ServerConfig;
use crate::clock::SystemClock;
use crate::config::{
    DEFAULT_ACCESS_TOKEN_MINUTES, DEFAULT_ACTIVATION_TOKEN_MINUTES, DEFAULT_REFRESH_TOKEN_MINUTES,
    DEFAULT_RESET_PASSWORD_TOKEN_MINUTES, MIN_SECRET_LENGTH, TokenLifetimes, TokenSettings,
    parse_algorithm,
};
use crate::db::Database;
use crate::mail::LogMailer;
use crate::password::Argon2Hasher;
use crate::rate_limit::RateLimitConfig;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "warden", about = "User accounts with versioned, revocable tokens")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8080")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, env = "DATABASE_PATH", default_value = "warden.db")]
    pub database: String,

    /// Public base URL, used for links in activation and reset emails
    #[arg(long, env = "PUBLIC_URL", default_value = "http://localhost:8080")]
    pub public_url: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Token signing algorithm (HS256, HS384 or HS512)
    #[arg(long, env = "JWT_ALGORITHM", default_value = "HS256", value_parser = parse_algorithm)]
    pub jwt_algorithm: Algorithm,

    /// Access token lifetime in minutes
    #[arg(long, env = "ACCESS_TOKEN_EXPIRE_MINUTES", default_value_t = DEFAULT_ACCESS_TOKEN_MINUTES)]
    pub access_token_minutes: i64,

    /// Refresh token lifetime in minutes
    #[arg(long, env = "REFRESH_TOKEN_EXPIRE_MINUTES", default_value_t = DEFAULT_REFRESH_TOKEN_MINUTES)]
    pub refresh_token_minutes: i64,

    /// Activation link lifetime in minutes
    #[arg(long, env = "ACTIVATION_TOKEN_EXPIRE_MINUTES", default_value_t = DEFAULT_ACTIVATION_TOKEN_MINUTES)]
    pub activation_token_minutes: i64,

    /// Password reset link lifetime in minutes
    #[arg(long, env = "RESET_PASSWORD_TOKEN_EXPIRE_MINUTES", default_value_t = DEFAULT_RESET_PASSWORD_TOKEN_MINUTES)]
    pub reset_password_token_minutes: i64,

    /// Header carrying the client IP (e.g. X-Forwarded-For) when behind a proxy
    #[arg(long, env = "CLIENT_IP_HEADER")]
    pub client_ip_header: Option<String>,

    /// Disable per-IP rate limiting
    #[arg(long)]
    pub no_rate_limit: bool,

    /// Create (or re-invite) a pending admin with this email and print the activation link
    #[arg(long, value_name = "EMAIL")]
    pub create_admin: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

impl Args {
    pub fn lifetimes(&self) -> TokenLifetimes {
        TokenLifetimes {
            access_minutes: self.access_token_minutes,
            refresh_minutes: self.refresh_token_minutes,
            activation_minutes: self.activation_token_minutes,
            reset_password_minutes: self.reset_password_token_minutes,
        }
    }
}

/// Initialize logging based on the specified format. `RUST_LOG` overrides
/// the default `info` level.
pub fn init_logging(format: &LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    if secret.len() < MIN_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Parse and validate the public URL used for email links.
pub fn validate_public_url(public_url: &str) -> Option<Url> {
    let url = match Url::parse(public_url) {
        Ok(url) => url,
        Err(e) => {
            error!(url = %public_url, error = %e, "Invalid public URL");
            return None;
        }
    };

    if !matches!(url.scheme(), "http" | "https") {
        error!(url = %public_url, "Public URL must use http or https");
        return None;
    }

    Some(url)
}

/// Build ServerConfig from validated arguments.
/// Returns None and logs an error if any setting is rejected.
pub fn build_config(args: &Args, db: &Database, jwt_secret: String) -> Option<ServerConfig> {
    let tokens = match TokenSettings::new(jwt_secret, args.jwt_algorithm, args.lifetimes()) {
        Ok(tokens) => tokens,
        Err(e) => {
            error!(error = %e, "Invalid token settings");
            return None;
        }
    };

    let public_url = validate_public_url(&args.public_url)?;

    let ip_header = match args.client_ip_header.as_deref().map(HeaderName::try_from) {
        None => None,
        Some(Ok(name)) => Some(name),
        Some(Err(e)) => {
            error!(error = %e, "Invalid client IP header name");
            return None;
        }
    };

    let rate_limits = (!args.no_rate_limit).then(|| RateLimitConfig::new(ip_header));

    Some(ServerConfig {
        users: Arc::new(db.users()),
        tokens,
        public_url,
        mailer: Arc::new(LogMailer),
        hasher: Arc::new(Argon2Hasher::default()),
        clock: Arc::new(SystemClock),
        rate_limits,
    })
}

/// Handle --create-admin: create or re-invite a pending admin and print
/// the activation link.
pub async fn handle_create_admin(config: &ServerConfig, email: &str) {
    match config.account_service().bootstrap_admin(email).await {
        Ok(link) => {
            println!();
            println!("Pending admin: {}", email);
            println!("Activation URL: {}", link);
            println!();
        }
        Err(e) => {
            error!(email = %email, error = %e, "Failed to create admin user");
            std::process::exit(1);
        }
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
