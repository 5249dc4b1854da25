//! Login, refresh, logout and access-token verification.

use tracing::{info, warn};
use uuid::Uuid;

use super::{AccountService, Session, TokenPair};
use crate::error::AuthError;
use crate::tokens::{TokenError, TokenPurpose};
use crate::validation::{is_email_identifier, normalize_email};

impl AccountService {
    /// Authenticate by username or email (anything containing `@`).
    pub async fn login(&self, identifier: &str, password: &str) -> Result<TokenPair, AuthError> {
        let identifier = identifier.trim();
        let user = if is_email_identifier(identifier) {
            self.users
                .find_by_email(&normalize_email(identifier))
                .await?
        } else {
            self.users.find_by_username(identifier).await?
        };

        let Some(user) = user else {
            self.hasher.verify(password, self.dummy_hash());
            warn!("Login failed: unknown identifier");
            return Err(AuthError::AuthenticationFailed);
        };

        let stored = match user.credential_hash() {
            "" => self.dummy_hash(),
            hash => hash,
        };
        if !self.hasher.verify(password, stored) || user.credential_hash().is_empty() {
            warn!(user_id = %user.id(), "Login failed: wrong credential");
            return Err(AuthError::AuthenticationFailed);
        }

        if !user.is_active() {
            warn!(user_id = %user.id(), "Login refused: user inactive");
            return Err(AuthError::UserInactive);
        }

        info!(user_id = %user.id(), "User logged in");
        self.issue_session(&user)
    }

    /// Trade a current refresh token for a fresh pair. Counters are left
    /// alone, so the same refresh token keeps working until it expires or
    /// is revoked.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.tokens.refresh.verify(refresh_token)?;

        let Some(user) = self.users.find_by_id(claims.subject).await? else {
            warn!(user_id = %claims.subject, "Refresh for unknown user");
            return Err(AuthError::AuthenticationFailed);
        };

        if !user.is_current(TokenPurpose::Refresh, claims.version) {
            warn!(user_id = %user.id(), token_version = claims.version, "Refresh token revoked");
            return Err(TokenError::Revoked.into());
        }

        if !user.is_active() {
            warn!(user_id = %user.id(), "Refresh refused: user inactive");
            return Err(AuthError::AuthenticationFailed);
        }

        self.issue_session(&user)
    }

    /// Revoke every access and refresh token of the user.
    pub async fn logout(&self, user_id: Uuid) -> Result<(), AuthError> {
        let mut user = self.load(user_id).await?;
        user.logout(self.now());
        self.users.update(&user).await?;
        info!(user_id = %user_id, "User logged out");
        Ok(())
    }

    /// Resolve an access token to its live user.
    pub async fn verify_access(&self, access_token: &str) -> Result<Session, AuthError> {
        let claims = self.tokens.access.verify(access_token)?;

        let user = self
            .users
            .find_by_id(claims.subject)
            .await?
            .ok_or(TokenError::Invalid)?;

        if !user.is_current(TokenPurpose::Access, claims.version) {
            return Err(TokenError::Revoked.into());
        }

        Ok(Session { user, claims })
    }
}
