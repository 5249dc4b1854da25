//! Signed claim encoding and decoding.
//!
//! The codec knows nothing about token purposes or users. It signs a
//! [`ClaimSet`] and, on decode, checks the signature and the
//! `[nbf, exp]` window against the injected [`Clock`].

use std::sync::Arc;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::Clock;
use crate::config::TokenSettings;

/// Raw claims carried by every token. Optional fields are checked by the
/// purpose-scoped services, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSet {
    /// Subject (user UUID)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Token purpose
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Revocation counter at issuance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ver: Option<u32>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Not before (Unix timestamp)
    pub nbf: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// JWT ID, random per token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("failed to encode token: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),
    #[error("token signature or algorithm rejected")]
    Signature,
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("token is not valid yet")]
    NotYetValid,
    #[error("token has expired")]
    Expired,
}

/// HMAC token codec bound to one secret and algorithm.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    pub fn new(settings: &TokenSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(&settings.secret),
            decoding_key: DecodingKey::from_secret(&settings.secret),
            algorithm: settings.algorithm,
            clock,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Current time according to the codec's clock.
    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    pub fn encode(&self, claims: &ClaimSet) -> Result<String, JwtError> {
        jsonwebtoken::encode(&Header::new(self.algorithm), claims, &self.encoding_key)
            .map_err(JwtError::Encoding)
    }

    /// Verify signature and validity window, returning the claims.
    pub fn decode(&self, token: &str) -> Result<ClaimSet, JwtError> {
        let mut validation = Validation::new(self.algorithm);
        // Time is checked below against our own clock.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;
        validation.required_spec_claims.clear();

        let claims = jsonwebtoken::decode::<ClaimSet>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => JwtError::Signature,
                _ => JwtError::Malformed(e.to_string()),
            })?
            .claims;

        let now = self.clock.now();
        if now < claims.nbf {
            return Err(JwtError::NotYetValid);
        }
        if now > claims.exp {
            return Err(JwtError::Expired);
        }
        Ok(claims)
    }
}
