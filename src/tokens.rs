//! Purpose-scoped versioned tokens.
//!
//! Each [`VersionedTokenService`] is bound to one [`TokenPurpose`] and one
//! lifetime. It stamps the caller-supplied revocation version into `ver`
//! and, on verify, checks the token is well formed and of its purpose.
//! Comparing `ver` against the live counter is left to the caller that
//! holds the user.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::TokenSettings;
use crate::jwt::{ClaimSet, JwtError, TokenCodec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Access,
    Refresh,
    Activation,
    ResetPassword,
}

impl TokenPurpose {
    pub const ALL: [TokenPurpose; 4] = [
        TokenPurpose::Access,
        TokenPurpose::Refresh,
        TokenPurpose::Activation,
        TokenPurpose::ResetPassword,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::Access => "access",
            TokenPurpose::Refresh => "refresh",
            TokenPurpose::Activation => "activation",
            TokenPurpose::ResetPassword => "reset_password",
        }
    }
}

impl std::fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every way a presented token can be refused. The remedy is always to
/// authenticate again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,
    #[error("wrong token type")]
    WrongType,
    #[error("token has no subject")]
    MissingSubject,
    #[error("token has no version")]
    MissingVersion,
    #[error("token has been revoked")]
    Revoked,
}

impl TokenError {
    pub fn code(&self) -> &'static str {
        match self {
            TokenError::Invalid => "invalid_token",
            TokenError::WrongType => "wrong_token_type",
            TokenError::MissingSubject => "missing_sub",
            TokenError::MissingVersion => "missing_token_version",
            TokenError::Revoked => "token_revoked",
        }
    }
}

/// Claims of a token that passed [`VersionedTokenService::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub subject: Uuid,
    pub purpose: TokenPurpose,
    pub version: u32,
    pub issued_at: i64,
    pub not_before: i64,
    pub expires_at: i64,
    pub jti: Option<String>,
}

#[derive(Clone)]
pub struct VersionedTokenService {
    codec: TokenCodec,
    purpose: TokenPurpose,
    ttl_seconds: i64,
}

impl VersionedTokenService {
    pub fn new(codec: TokenCodec, purpose: TokenPurpose, ttl_minutes: i64) -> Self {
        Self {
            codec,
            purpose,
            ttl_seconds: ttl_minutes.saturating_mul(60),
        }
    }

    pub fn purpose(&self) -> TokenPurpose {
        self.purpose
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Mint a token for `subject` stamped with `version`.
    pub fn create(&self, subject: Uuid, version: u32) -> Result<String, JwtError> {
        let now = self.codec.now();
        let claims = ClaimSet {
            sub: Some(subject.to_string()),
            token_type: Some(self.purpose.as_str().to_string()),
            ver: Some(version),
            iat: now,
            nbf: now,
            exp: now.saturating_add(self.ttl_seconds),
            jti: Some(Uuid::new_v4().to_string()),
        };
        self.codec.encode(&claims)
    }

    /// Check signature, validity window, purpose, subject and presence of
    /// a version. Does not look at any user.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let raw = self.codec.decode(token).map_err(|e| {
            tracing::debug!(purpose = %self.purpose, error = %e, "Token rejected by codec");
            TokenError::Invalid
        })?;

        if raw.token_type.as_deref() != Some(self.purpose.as_str()) {
            return Err(TokenError::WrongType);
        }

        let subject = match raw.sub.as_deref() {
            None | Some("") => return Err(TokenError::MissingSubject),
            Some(sub) => Uuid::parse_str(sub).map_err(|_| TokenError::Invalid)?,
        };

        let version = raw.ver.ok_or(TokenError::MissingVersion)?;

        Ok(Claims {
            subject,
            purpose: self.purpose,
            version,
            issued_at: raw.iat,
            not_before: raw.nbf,
            expires_at: raw.exp,
            jti: raw.jti,
        })
    }
}

/// The four purpose-scoped services sharing one codec.
#[derive(Clone)]
pub struct TokenServices {
    pub access: VersionedTokenService,
    pub refresh: VersionedTokenService,
    pub activation: VersionedTokenService,
    pub reset_password: VersionedTokenService,
}

impl TokenServices {
    pub fn new(settings: &TokenSettings, clock: Arc<dyn Clock>) -> Self {
        let codec = TokenCodec::new(settings, clock);
        let lifetimes = settings.lifetimes;
        Self {
            access: VersionedTokenService::new(
                codec.clone(),
                TokenPurpose::Access,
                lifetimes.access_minutes,
            ),
            refresh: VersionedTokenService::new(
                codec.clone(),
                TokenPurpose::Refresh,
                lifetimes.refresh_minutes,
            ),
            activation: VersionedTokenService::new(
                codec.clone(),
                TokenPurpose::Activation,
                lifetimes.activation_minutes,
            ),
            reset_password: VersionedTokenService::new(
                codec,
                TokenPurpose::ResetPassword,
                lifetimes.reset_password_minutes,
            ),
        }
    }

    pub fn for_purpose(&self, purpose: TokenPurpose) -> &VersionedTokenService {
        match purpose {
            TokenPurpose::Access => &self.access,
            TokenPurpose::Refresh => &self.refresh,
            TokenPurpose::Activation => &self.activation,
            TokenPurpose::ResetPassword => &self.reset_password,
        }
    }
}

/// Extract the token from an `Authorization` header value.
///
/// The scheme is matched case-insensitively; anything else, including an
/// empty token, yields `None`.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
