#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{HeaderName, Request, StatusCode},
};
use jsonwebtoken::Algorithm;
use serde_json::Value;
use tower::ServiceExt;
use url::Url;
use uuid::Uuid;
use warden::{
    ServerConfig,
    accounts::{AccountService, TokenPair},
    clock::ManualClock,
    config::{TokenLifetimes, TokenSettings},
    create_app,
    db::{Database, MemoryUserStore, UserRepository},
    mail::{MemoryMailer, token_from_mail},
    password::{Argon2Hasher, CredentialHasher},
    rate_limit::RateLimitConfig,
    user::User,
};

pub const SECRET: &[u8] = b"integration-test-secret-0123456789";
pub const START: i64 = 1_700_000_000;
pub const PASSWORD: &str = "Str0ngPassword";
pub const IP_HEADER: &str = "x-forwarded-for";

pub struct TestContext {
    pub accounts: AccountService,
    pub users: Arc<dyn UserRepository>,
    pub mailer: Arc<MemoryMailer>,
    pub clock: Arc<ManualClock>,
    pub hasher: Arc<Argon2Hasher>,
    pub config: ServerConfig,
}

pub async fn setup() -> TestContext {
    TestSetup::new().build().await
}

/// Builder for test setup with various options
pub struct TestSetup {
    sqlite: bool,
    rate_limits: bool,
}

impl TestSetup {
    pub fn new() -> Self {
        Self {
            sqlite: false,
            rate_limits: false,
        }
    }

    /// Store users in an in-memory sqlite database instead of the fake.
    pub fn with_sqlite(mut self) -> Self {
        self.sqlite = true;
        self
    }

    /// Enable per-IP rate limits keyed on the `x-forwarded-for` header.
    pub fn with_rate_limits(mut self) -> Self {
        self.rate_limits = true;
        self
    }

    pub async fn build(self) -> TestContext {
        let users: Arc<dyn UserRepository> = if self.sqlite {
            let db = Database::open(":memory:")
                .await
                .expect("Failed to open test database");
            Arc::new(db.users())
        } else {
            Arc::new(MemoryUserStore::new())
        };

        let mailer = Arc::new(MemoryMailer::new());
        let clock = Arc::new(ManualClock::new(START));
        let hasher = Arc::new(
            Argon2Hasher::with_params(argon2::Params::MIN_M_COST, 1, 1)
                .expect("Failed to build hasher"),
        );
        let tokens = TokenSettings::new(SECRET, Algorithm::HS256, TokenLifetimes::default())
            .expect("Invalid token settings");
        let rate_limits = self
            .rate_limits
            .then(|| RateLimitConfig::new(Some(HeaderName::from_static(IP_HEADER))));

        let config = ServerConfig {
            users: users.clone(),
            tokens,
            public_url: Url::parse("https://accounts.example.com").expect("Invalid URL"),
            mailer: mailer.clone(),
            hasher: hasher.clone(),
            clock: clock.clone(),
            rate_limits,
        };

        TestContext {
            accounts: config.account_service(),
            users,
            mailer,
            clock,
            hasher,
            config,
        }
    }
}

impl TestContext {
    /// Insert an activated user whose password is [`PASSWORD`].
    pub async fn seed_user(&self, username: &str, email: &str, admin: bool) -> User {
        let now = chrono::DateTime::from_timestamp(START, 0).expect("Invalid timestamp");
        let hash = self.hasher.hash(PASSWORD).expect("Failed to hash");
        let mut user = User::create_pending(email, now);
        user.complete_first_activation(username, hash, now);
        if admin {
            user.promote_to_admin(now);
        }
        self.users.create(&user).await.expect("Failed to seed user");
        user
    }

    /// Insert a user that was created but never activated.
    pub async fn seed_pending(&self, email: &str) -> User {
        let now = chrono::DateTime::from_timestamp(START, 0).expect("Invalid timestamp");
        let user = User::create_pending(email, now);
        self.users.create(&user).await.expect("Failed to seed user");
        user
    }

    pub async fn user(&self, id: Uuid) -> User {
        self.users
            .find_by_id(id)
            .await
            .expect("Failed to load user")
            .expect("User missing")
    }

    pub async fn login(&self, identifier: &str) -> TokenPair {
        self.accounts
            .login(identifier, PASSWORD)
            .await
            .expect("Login failed")
    }

    /// Token carried by the most recent email sent to `to`.
    pub fn mailed_token(&self, to: &str) -> String {
        let mail = self.mailer.last_to(to).expect("No email sent");
        token_from_mail(&mail).expect("No token in email")
    }

    pub fn mails_to(&self, to: &str) -> usize {
        self.mailer.sent().iter().filter(|m| m.to == to).count()
    }

    pub fn app(&self) -> Router {
        create_app(&self.config)
    }
}

/// Minimal HTTP request description for [`send`].
pub struct Call<'a> {
    pub method: &'a str,
    pub uri: &'a str,
    pub bearer: Option<&'a str>,
    pub body: Option<Value>,
    pub ip: Option<&'a str>,
}

impl<'a> Call<'a> {
    pub fn get(uri: &'a str) -> Self {
        Self {
            method: "GET",
            uri,
            bearer: None,
            body: None,
            ip: None,
        }
    }

    pub fn post(uri: &'a str, body: Value) -> Self {
        Self {
            method: "POST",
            uri,
            bearer: None,
            body: Some(body),
            ip: None,
        }
    }

    pub fn patch(uri: &'a str) -> Self {
        Self {
            method: "PATCH",
            uri,
            bearer: None,
            body: None,
            ip: None,
        }
    }

    pub fn bearer(mut self, token: &'a str) -> Self {
        self.bearer = Some(token);
        self
    }

    pub fn from_ip(mut self, ip: &'a str) -> Self {
        self.ip = Some(ip);
        self
    }
}

/// Send one request and return the status and the JSON body (`Null` when empty).
pub async fn send(app: &Router, call: Call<'_>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(call.method).uri(call.uri);
    if let Some(token) = call.bearer {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    if let Some(ip) = call.ip {
        builder = builder.header(IP_HEADER, ip);
    }
    let body = match call.body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}
