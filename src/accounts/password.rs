//! Password change and the reset-by-email flow.
//!
//! Reset links are bump-then-send: the new `password_token_version` is
//! persisted first and the mailed token carries it. Any earlier link is
//! dead before the new one leaves, even if sending fails.

use tracing::{info, warn};
use uuid::Uuid;

use super::{AccountService, report_generic_success_regardless_of_outcome};
use crate::error::AuthError;
use crate::tokens::TokenPurpose;
use crate::validation::{normalize_email, validate_password};

impl AccountService {
    /// Replace the credential of an authenticated user. Revokes every
    /// session and reset link the user had.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let mut user = self.load(user_id).await?;

        if !self.hasher.verify(old_password, user.credential_hash()) {
            warn!(user_id = %user_id, "Password change refused: wrong credential");
            return Err(AuthError::AuthenticationFailed);
        }

        validate_password(new_password)?;
        let hash = self.hasher.hash(new_password)?;
        user.change_credential(hash, self.now());
        self.users.update(&user).await?;

        info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    /// Send a reset link, reporting why when the user is not eligible.
    pub async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let email = normalize_email(email);
        let mut user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !user.is_active() {
            return Err(AuthError::UserInactive);
        }

        user.bump_password_token(self.now());
        self.users.update(&user).await?;

        let version = user.token_version(TokenPurpose::ResetPassword);
        let token = self.tokens.reset_password.create(user.id(), version)?;
        self.notifier
            .send_password_reset(user.email(), &token)
            .await?;

        info!(user_id = %user.id(), token_version = version, "Password reset link sent");
        Ok(())
    }

    /// Public variant of [`send_password_reset`](Self::send_password_reset):
    /// the outcome never reaches the caller.
    pub async fn request_password_reset(&self, email: &str) {
        let outcome = self.send_password_reset(email).await;
        report_generic_success_regardless_of_outcome("password_reset", outcome);
    }

    /// Set a new credential from a reset link.
    pub async fn confirm_password_reset(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let claims = self.tokens.reset_password.verify(token).map_err(|e| {
            warn!(reason = e.code(), "Reset token rejected");
            AuthError::InvalidPasswordToken
        })?;

        let mut user = self
            .users
            .find_by_id(claims.subject)
            .await?
            .ok_or(AuthError::InvalidPasswordToken)?;

        if !user.is_current(TokenPurpose::ResetPassword, claims.version) {
            warn!(user_id = %user.id(), token_version = claims.version, "Stale reset token");
            return Err(AuthError::InvalidPasswordToken);
        }

        if !user.is_active() {
            return Err(AuthError::UserInactive);
        }

        validate_password(new_password)?;
        let hash = self.hasher.hash(new_password)?;
        user.change_credential(hash, self.now());
        self.users.update(&user).await?;

        info!(user_id = %user.id(), "Password reset completed");
        Ok(())
    }
}
