//! Account creation and first activation.
//!
//! Like reset links, re-sent activation links are bump-then-send.

use tracing::{info, warn};
use url::Url;

use super::{AccountService, report_generic_success_regardless_of_outcome};
use crate::db::RepositoryError;
use crate::error::AuthError;
use crate::tokens::TokenPurpose;
use crate::user::User;
use crate::validation::{normalize_email, validate_email, validate_password, validate_username};

fn map_create_conflict(e: RepositoryError) -> AuthError {
    match e {
        RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
        other => other.into(),
    }
}

impl AccountService {
    /// Create a pending account and mail its first activation link.
    pub async fn create_user(&self, email: &str) -> Result<User, AuthError> {
        let email = validate_email(email)?;
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AuthError::UserAlreadyExists);
        }

        let user = User::create_pending(email, self.now());
        self.users.create(&user).await.map_err(map_create_conflict)?;
        info!(user_id = %user.id(), "Pending user created");

        let version = user.token_version(TokenPurpose::Activation);
        let token = self.tokens.activation.create(user.id(), version)?;
        self.notifier.send_activation(user.email(), &token).await?;

        Ok(user)
    }

    /// Re-send the activation link, reporting why when not eligible.
    pub async fn resend_activation(&self, email: &str) -> Result<(), AuthError> {
        let email = normalize_email(email);
        let mut user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if user.has_activated_once() {
            return Err(AuthError::UserActivatedBefore);
        }

        user.bump_activation_token(self.now());
        self.users.update(&user).await?;

        let version = user.token_version(TokenPurpose::Activation);
        let token = self.tokens.activation.create(user.id(), version)?;
        self.notifier.send_activation(user.email(), &token).await?;

        info!(user_id = %user.id(), token_version = version, "Activation link re-sent");
        Ok(())
    }

    /// Public variant of [`resend_activation`](Self::resend_activation):
    /// the outcome never reaches the caller.
    pub async fn request_activation(&self, email: &str) {
        let outcome = self.resend_activation(email).await;
        report_generic_success_regardless_of_outcome("activation", outcome);
    }

    /// Redeem an activation link: pick a username and first password.
    pub async fn confirm_first_activation(
        &self,
        token: &str,
        username: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let claims = self.tokens.activation.verify(token).map_err(|e| {
            warn!(reason = e.code(), "Activation token rejected");
            AuthError::InvalidActivationToken
        })?;

        let mut user = self
            .users
            .find_by_id(claims.subject)
            .await?
            .ok_or(AuthError::InvalidActivationToken)?;

        if user.has_activated_once() {
            return Err(AuthError::UserActivatedBefore);
        }

        if !user.is_current(TokenPurpose::Activation, claims.version) {
            warn!(user_id = %user.id(), token_version = claims.version, "Stale activation token");
            return Err(AuthError::InvalidActivationToken);
        }

        validate_username(username)?;
        if let Some(holder) = self.users.find_by_username(username).await? {
            if holder.id() != user.id() {
                return Err(AuthError::UsernameAlreadyTaken);
            }
        }

        validate_password(password)?;
        let hash = self.hasher.hash(password)?;
        user.complete_first_activation(username, hash, self.now());
        self.users.update(&user).await.map_err(|e| match e {
            RepositoryError::Conflict("username") => AuthError::UsernameAlreadyTaken,
            other => other.into(),
        })?;

        info!(user_id = %user.id(), "User activated");
        Ok(user)
    }

    /// Create or re-invite a pending admin and return the activation link
    /// instead of mailing it. Used from the command line.
    pub async fn bootstrap_admin(&self, email: &str) -> Result<Url, AuthError> {
        let email = validate_email(email)?;
        let now = self.now();

        let user = match self.users.find_by_email(&email).await? {
            Some(existing) if existing.has_activated_once() => {
                return Err(AuthError::UserActivatedBefore);
            }
            Some(mut existing) => {
                existing.promote_to_admin(now);
                existing.bump_activation_token(now);
                self.users.update(&existing).await?;
                existing
            }
            None => {
                let mut user = User::create_pending(email, now);
                user.promote_to_admin(now);
                self.users.create(&user).await.map_err(map_create_conflict)?;
                user
            }
        };

        let version = user.token_version(TokenPurpose::Activation);
        let token = self.tokens.activation.create(user.id(), version)?;
        info!(user_id = %user.id(), token_version = version, "Admin invitation issued");
        Ok(self.notifier.links().activation(&token))
    }
}
