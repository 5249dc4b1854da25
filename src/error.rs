//! Domain errors raised by the account use cases.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::jwt::JwtError;
use crate::mail::MailError;
use crate::password::HashError;
use crate::tokens::TokenError;
use crate::validation::ValidationError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("authentication failed")]
    AuthenticationFailed,
    #[error("user is inactive")]
    UserInactive,
    #[error("user not found")]
    UserNotFound,
    #[error("user was activated before")]
    UserActivatedBefore,
    #[error("user has not completed activation")]
    UserPendingActivation,
    #[error("invalid activation token")]
    InvalidActivationToken,
    #[error("invalid password token")]
    InvalidPasswordToken,
    #[error("username already taken")]
    UsernameAlreadyTaken,
    #[error("user already exists")]
    UserAlreadyExists,
    #[error("email already taken")]
    EmailAlreadyTaken,
    #[error("operation not permitted")]
    Forbidden,
    #[error("cannot deactivate yourself")]
    CannotDeactivateYourself,
    #[error("the last admin cannot be deactivated")]
    LastAdminCannotBeDeactivated,
    #[error("cannot demote yourself")]
    CannotDemoteYourself,
    #[error("the last admin cannot be demoted")]
    LastAdminCannotBeDemoted,

    #[error(transparent)]
    Mail(#[from] MailError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("failed to sign token: {0}")]
    Signing(#[from] JwtError),
    #[error(transparent)]
    Hashing(#[from] HashError),
}

impl AuthError {
    /// Stable machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Token(e) => e.code(),
            AuthError::Validation(e) => e.code(),
            AuthError::AuthenticationFailed => "invalid_credentials",
            AuthError::UserInactive => "inactive_user",
            AuthError::UserNotFound => "user_not_found",
            AuthError::UserActivatedBefore => "user_was_activated_before",
            AuthError::UserPendingActivation => "user_pending_activation",
            AuthError::InvalidActivationToken => "invalid_activation_token",
            AuthError::InvalidPasswordToken => "invalid_password_token",
            AuthError::UsernameAlreadyTaken => "username_already_taken",
            AuthError::UserAlreadyExists => "user_already_exists",
            AuthError::EmailAlreadyTaken => "email_already_taken",
            AuthError::Forbidden => "forbidden",
            AuthError::CannotDeactivateYourself => "cannot_deactivate_yourself",
            AuthError::LastAdminCannotBeDeactivated => "last_admin_cannot_be_deactivated",
            AuthError::CannotDemoteYourself => "cannot_demote_yourself",
            AuthError::LastAdminCannotBeDemoted => "last_admin_cannot_be_demoted",
            AuthError::Mail(e) => e.code(),
            AuthError::Repository(_) | AuthError::Signing(_) | AuthError::Hashing(_) => {
                "internal_error"
            }
        }
    }

    /// Whether the error only says "this identity is not eligible", which
    /// public request endpoints must not reveal.
    pub fn reveals_eligibility(&self) -> bool {
        matches!(
            self,
            AuthError::UserNotFound | AuthError::UserInactive | AuthError::UserActivatedBefore
        )
    }
}
