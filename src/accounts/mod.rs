//! Account use cases.
//!
//! [`AccountService`] ties the user repository, the four token services,
//! the credential hasher and the notifier together. Each use case loads
//! the live user, compares token versions against its counters, applies a
//! transition on the aggregate and persists the result.

mod activation;
mod admin;
mod password;
mod profile;
mod session;

use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::clock::Clock;
use crate::db::UserRepository;
use crate::error::AuthError;
use crate::mail::Notifier;
use crate::password::CredentialHasher;
use crate::tokens::{Claims, TokenServices};
use crate::user::User;

pub use admin::{ListUsersQuery, SortDirection, UserOrder, UserPage};

/// Access and refresh token issued together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// A user authenticated by a current access token.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub claims: Claims,
}

/// Public view of a user. Never carries the credential or counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserView {
    pub id: Uuid,
    pub username: Option<String>,
    pub email: String,
    pub is_active: bool,
    pub is_admin: bool,
    pub has_activated_once: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id(),
            username: (!user.username().is_empty()).then(|| user.username().to_string()),
            email: user.email().to_string(),
            is_active: user.is_active(),
            is_admin: user.is_admin(),
            has_activated_once: user.has_activated_once(),
            created_at: user.created_at(),
            updated_at: user.updated_at(),
        }
    }
}

pub struct AccountService {
    users: Arc<dyn UserRepository>,
    hasher: Arc<dyn CredentialHasher>,
    notifier: Notifier,
    tokens: TokenServices,
    clock: Arc<dyn Clock>,
    dummy_hash: OnceLock<String>,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        hasher: Arc<dyn CredentialHasher>,
        notifier: Notifier,
        tokens: TokenServices,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            hasher,
            notifier,
            tokens,
            clock,
            dummy_hash: OnceLock::new(),
        }
    }

    pub fn tokens(&self) -> &TokenServices {
        &self.tokens
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now_utc()
    }

    /// A well-formed hash of no real credential, verified against when
    /// there is no stored one so failed logins cost the same.
    fn dummy_hash(&self) -> &str {
        self.dummy_hash.get_or_init(|| {
            self.hasher
                .hash("no-such-credential")
                .unwrap_or_else(|e| {
                    error!(error = %e, "Failed to prepare dummy credential hash");
                    String::new()
                })
        })
    }

    async fn load(&self, id: Uuid) -> Result<User, AuthError> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    fn issue_session(&self, user: &User) -> Result<TokenPair, AuthError> {
        let versions = user.versions();
        Ok(TokenPair {
            access_token: self.tokens.access.create(user.id(), versions.access)?,
            refresh_token: self.tokens.refresh.create(user.id(), versions.refresh)?,
        })
    }
}

/// The one place where failures of public request endpoints are dropped.
///
/// The caller always answers with the same generic message. Whether the
/// identity exists or is eligible only shows up in the log.
pub(crate) fn report_generic_success_regardless_of_outcome(
    action: &'static str,
    outcome: Result<(), AuthError>,
) {
    match outcome {
        Ok(()) => debug!(action, "Request fulfilled"),
        Err(e) if e.reveals_eligibility() => {
            info!(action, reason = e.code(), "Request ignored for ineligible identity")
        }
        Err(e) => error!(action, error = %e, "Request failed behind generic response"),
    }
}
