use tracing::{info, warn};
use uuid::Uuid;

use super::AccountService;
use crate::db::RepositoryError;
use crate::error::AuthError;
use crate::user::User;
use crate::validation::validate_email;

impl AccountService {
    /// Move the account to a new email after re-checking the password.
    /// Tokens are unaffected.
    pub async fn change_email(
        &self,
        user_id: Uuid,
        new_email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let mut user = self.load(user_id).await?;

        if !self.hasher.verify(password, user.credential_hash()) {
            warn!(user_id = %user_id, "Email change refused: wrong credential");
            return Err(AuthError::AuthenticationFailed);
        }

        let email = validate_email(new_email)?;
        if email == user.email() {
            return Ok(user);
        }
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailAlreadyTaken);
        }

        user.change_email(email, self.now());
        self.users.update(&user).await.map_err(|e| match e {
            RepositoryError::Conflict("email") => AuthError::EmailAlreadyTaken,
            other => other.into(),
        })?;

        info!(user_id = %user_id, "Email changed");
        Ok(user)
    }
}
