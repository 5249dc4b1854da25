//! Input rules for passwords, usernames, emails and paging.

use thiserror::Error;
use validator::ValidateEmail;

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const USERNAME_LENGTH: std::ops::RangeInclusive<usize> = 3..=30;

/// A rejected input. The message is the client-facing code and is stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("password_required")]
    PasswordRequired,
    #[error("password_cannot_contain_spaces")]
    PasswordContainsSpaces,
    #[error("password_too_short")]
    PasswordTooShort,
    #[error("password_needs_uppercase")]
    PasswordNeedsUppercase,
    #[error("password_needs_lowercase")]
    PasswordNeedsLowercase,
    #[error("password_needs_number")]
    PasswordNeedsNumber,
    #[error("username_required")]
    UsernameRequired,
    #[error("username_cannot_contain_spaces")]
    UsernameContainsSpaces,
    #[error("username_must_have_between_3_and_30_characters")]
    UsernameLength,
    #[error("username_must_contain_letters")]
    UsernameNeedsLetters,
    #[error("username_invalid_characters")]
    UsernameInvalidCharacters,
    #[error("invalid_email")]
    InvalidEmail,
    #[error("invalid_page")]
    InvalidPage,
    #[error("invalid_limit")]
    InvalidLimit,
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::PasswordRequired => "password_required",
            ValidationError::PasswordContainsSpaces => "password_cannot_contain_spaces",
            ValidationError::PasswordTooShort => "password_too_short",
            ValidationError::PasswordNeedsUppercase => "password_needs_uppercase",
            ValidationError::PasswordNeedsLowercase => "password_needs_lowercase",
            ValidationError::PasswordNeedsNumber => "password_needs_number",
            ValidationError::UsernameRequired => "username_required",
            ValidationError::UsernameContainsSpaces => "username_cannot_contain_spaces",
            ValidationError::UsernameLength => "username_must_have_between_3_and_30_characters",
            ValidationError::UsernameNeedsLetters => "username_must_contain_letters",
            ValidationError::UsernameInvalidCharacters => "username_invalid_characters",
            ValidationError::InvalidEmail => "invalid_email",
            ValidationError::InvalidPage => "invalid_page",
            ValidationError::InvalidLimit => "invalid_limit",
        }
    }
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::PasswordRequired);
    }
    if password.chars().any(char::is_whitespace) {
        return Err(ValidationError::PasswordContainsSpaces);
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooShort);
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(ValidationError::PasswordNeedsUppercase);
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(ValidationError::PasswordNeedsLowercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(ValidationError::PasswordNeedsNumber);
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.is_empty() {
        return Err(ValidationError::UsernameRequired);
    }
    if username.chars().any(char::is_whitespace) {
        return Err(ValidationError::UsernameContainsSpaces);
    }
    if !USERNAME_LENGTH.contains(&username.chars().count()) {
        return Err(ValidationError::UsernameLength);
    }
    if !username.chars().any(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::UsernameNeedsLetters);
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-');
    if !username.chars().all(allowed) {
        return Err(ValidationError::UsernameInvalidCharacters);
    }
    Ok(())
}

/// Trim and lowercase an email address. Does not validate it.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Normalize then validate an email address.
pub fn validate_email(email: &str) -> Result<String, ValidationError> {
    let email = normalize_email(email);
    if email.validate_email() {
        Ok(email)
    } else {
        Err(ValidationError::InvalidEmail)
    }
}

/// Login identifiers containing `@` are treated as emails.
pub fn is_email_identifier(identifier: &str) -> bool {
    identifier.contains('@')
}
