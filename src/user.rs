//! The user aggregate.
//!
//! Revocation counters only move as a side effect of the transitions on
//! [`User`]; there is no setter for them. Every mutating transition also
//! refreshes `updated_at`.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::tokens::TokenPurpose;

/// One revocation counter per token purpose.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenVersions {
    pub activation: u32,
    pub password: u32,
    pub access: u32,
    pub refresh: u32,
}

impl TokenVersions {
    pub fn get(&self, purpose: TokenPurpose) -> u32 {
        match purpose {
            TokenPurpose::Activation => self.activation,
            TokenPurpose::ResetPassword => self.password,
            TokenPurpose::Access => self.access,
            TokenPurpose::Refresh => self.refresh,
        }
    }

    fn bump(&mut self, purpose: TokenPurpose) {
        let counter = match purpose {
            TokenPurpose::Activation => &mut self.activation,
            TokenPurpose::ResetPassword => &mut self.password,
            TokenPurpose::Access => &mut self.access,
            TokenPurpose::Refresh => &mut self.refresh,
        };
        *counter = counter.saturating_add(1);
    }
}

/// Flat persisted form of a user, used by repositories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: Uuid,
    /// Empty while the account is pending.
    pub username: String,
    pub email: String,
    /// Empty while the account is pending.
    pub credential_hash: String,
    pub is_active: bool,
    pub is_admin: bool,
    pub has_activated_once: bool,
    pub versions: TokenVersions,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    record: UserRecord,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        Self { record }
    }
}

impl User {
    /// A new pending account: inactive, never activated, no credential.
    pub fn create_pending(email: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            record: UserRecord {
                id: Uuid::new_v4(),
                username: String::new(),
                email: email.into(),
                credential_hash: String::new(),
                is_active: false,
                is_admin: false,
                has_activated_once: false,
                versions: TokenVersions::default(),
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn id(&self) -> Uuid {
        self.record.id
    }

    pub fn username(&self) -> &str {
        &self.record.username
    }

    pub fn email(&self) -> &str {
        &self.record.email
    }

    pub fn credential_hash(&self) -> &str {
        &self.record.credential_hash
    }

    pub fn is_active(&self) -> bool {
        self.record.is_active
    }

    pub fn is_admin(&self) -> bool {
        self.record.is_admin
    }

    pub fn has_activated_once(&self) -> bool {
        self.record.has_activated_once
    }

    pub fn versions(&self) -> TokenVersions {
        self.record.versions
    }

    pub fn token_version(&self, purpose: TokenPurpose) -> u32 {
        self.record.versions.get(purpose)
    }

    /// Whether a token of `purpose` stamped with `version` is still current.
    pub fn is_current(&self, purpose: TokenPurpose, version: u32) -> bool {
        self.token_version(purpose) == version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.record.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.record.updated_at
    }

    pub fn as_record(&self) -> &UserRecord {
        &self.record
    }

    pub fn into_record(self) -> UserRecord {
        self.record
    }

    /// Returns `false` when the user was already active.
    pub fn activate(&mut self, now: DateTime<Utc>) -> bool {
        if self.record.is_active {
            return false;
        }
        self.record.is_active = true;
        self.record.has_activated_once = true;
        self.touch(now);
        true
    }

    /// Returns `false` when the user was already inactive. Kills all
    /// sessions otherwise.
    pub fn deactivate(&mut self, now: DateTime<Utc>) -> bool {
        if !self.record.is_active {
            return false;
        }
        self.record.is_active = false;
        self.record.versions.bump(TokenPurpose::Access);
        self.record.versions.bump(TokenPurpose::Refresh);
        self.touch(now);
        true
    }

    pub fn promote_to_admin(&mut self, now: DateTime<Utc>) -> bool {
        if self.record.is_admin {
            return false;
        }
        self.record.is_admin = true;
        self.touch(now);
        true
    }

    /// Revokes access tokens only; the refresh token stays usable so the
    /// user can pick up a correctly scoped access token.
    pub fn demote_from_admin(&mut self, now: DateTime<Utc>) -> bool {
        if !self.record.is_admin {
            return false;
        }
        self.record.is_admin = false;
        self.record.versions.bump(TokenPurpose::Access);
        self.touch(now);
        true
    }

    /// Replace the credential and revoke reset, access and refresh tokens.
    pub fn change_credential(&mut self, new_hash: impl Into<String>, now: DateTime<Utc>) {
        self.record.credential_hash = new_hash.into();
        self.record.versions.bump(TokenPurpose::ResetPassword);
        self.record.versions.bump(TokenPurpose::Access);
        self.record.versions.bump(TokenPurpose::Refresh);
        self.touch(now);
    }

    pub fn logout(&mut self, now: DateTime<Utc>) {
        self.record.versions.bump(TokenPurpose::Access);
        self.record.versions.bump(TokenPurpose::Refresh);
        self.touch(now);
    }

    /// Invalidate outstanding activation links before issuing a new one.
    pub fn bump_activation_token(&mut self, now: DateTime<Utc>) {
        self.record.versions.bump(TokenPurpose::Activation);
        self.touch(now);
    }

    /// Invalidate outstanding reset links before issuing a new one.
    pub fn bump_password_token(&mut self, now: DateTime<Utc>) {
        self.record.versions.bump(TokenPurpose::ResetPassword);
        self.touch(now);
    }

    pub fn change_email(&mut self, email: impl Into<String>, now: DateTime<Utc>) {
        self.record.email = email.into();
        self.touch(now);
    }

    /// Set the chosen username and first credential, then activate.
    pub fn complete_first_activation(
        &mut self,
        username: impl Into<String>,
        credential_hash: impl Into<String>,
        now: DateTime<Utc>,
    ) {
        self.record.username = username.into();
        self.record.credential_hash = credential_hash.into();
        self.activate(now);
        self.touch(now);
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.record.updated_at = now;
    }
}
