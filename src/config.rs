//! Immutable token configuration, built once at startup.

use jsonwebtoken::Algorithm;
use thiserror::Error;

pub const MIN_SECRET_LENGTH: usize = 32;

pub const DEFAULT_ACCESS_TOKEN_MINUTES: i64 = 30;
pub const DEFAULT_REFRESH_TOKEN_MINUTES: i64 = 24 * 60;
pub const DEFAULT_ACTIVATION_TOKEN_MINUTES: i64 = 15;
pub const DEFAULT_RESET_PASSWORD_TOKEN_MINUTES: i64 = 15;

/// Longest accepted token lifetime: one year.
pub const MAX_LIFETIME_MINUTES: i64 = 366 * 24 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("token secret must be at least {MIN_SECRET_LENGTH} bytes")]
    SecretTooShort,
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("{0} lifetime must be between 1 and {MAX_LIFETIME_MINUTES} minutes")]
    InvalidLifetime(&'static str),
}

/// Lifetimes of the four token purposes, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    pub access_minutes: i64,
    pub refresh_minutes: i64,
    pub activation_minutes: i64,
    pub reset_password_minutes: i64,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access_minutes: DEFAULT_ACCESS_TOKEN_MINUTES,
            refresh_minutes: DEFAULT_REFRESH_TOKEN_MINUTES,
            activation_minutes: DEFAULT_ACTIVATION_TOKEN_MINUTES,
            reset_password_minutes: DEFAULT_RESET_PASSWORD_TOKEN_MINUTES,
        }
    }
}

/// Signing material and lifetimes shared by every token service.
#[derive(Clone)]
pub struct TokenSettings {
    pub secret: Vec<u8>,
    pub algorithm: Algorithm,
    pub lifetimes: TokenLifetimes,
}

impl std::fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSettings")
            .field("secret", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .field("lifetimes", &self.lifetimes)
            .finish()
    }
}

impl TokenSettings {
    /// Build settings, rejecting anything the codec cannot safely use.
    pub fn new(
        secret: impl Into<Vec<u8>>,
        algorithm: Algorithm,
        lifetimes: TokenLifetimes,
    ) -> Result<Self, ConfigError> {
        let settings = Self {
            secret: secret.into(),
            algorithm,
            lifetimes,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.len() < MIN_SECRET_LENGTH {
            return Err(ConfigError::SecretTooShort);
        }
        if !matches!(
            self.algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(ConfigError::UnsupportedAlgorithm(format!(
                "{:?}",
                self.algorithm
            )));
        }
        let lifetimes = [
            ("access token", self.lifetimes.access_minutes),
            ("refresh token", self.lifetimes.refresh_minutes),
            ("activation token", self.lifetimes.activation_minutes),
            ("reset password token", self.lifetimes.reset_password_minutes),
        ];
        for (name, minutes) in lifetimes {
            if !(1..=MAX_LIFETIME_MINUTES).contains(&minutes) {
                return Err(ConfigError::InvalidLifetime(name));
            }
        }
        Ok(())
    }
}

/// Parse an HMAC algorithm name such as `HS256`.
pub fn parse_algorithm(name: &str) -> Result<Algorithm, ConfigError> {
    match name.trim().to_ascii_uppercase().as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        _ => Err(ConfigError::UnsupportedAlgorithm(name.to_string())),
    }
}
