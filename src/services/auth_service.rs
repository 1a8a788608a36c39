//! Domain service for accounts and sessions.
//!
//! Handles registration, login by username or email, logout and OAuth sign-in.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::entities::users;
use crate::services::oauth::OAuthProfile;
use crate::services::token::TokenError;

pub const MAX_USERNAME_LEN: usize = 50;

/// Loose `local@domain.tld` check, the same shape the frontend enforces.
#[must_use]
pub fn is_email(value: &str) -> bool {
    let value = value.trim();
    if value.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("Username already taken")]
    UsernameTaken,

    #[error("Email already in use")]
    EmailTaken,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Failed to send verification email: {0}")]
    Mail(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// User info DTO for responses.
#[derive(Debug, Clone, Serialize)]
pub struct UserInfo {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    /// Absolute avatar URL, empty when none is set
    pub avatar: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "emailVerified")]
    pub email_verified: bool,
}

impl UserInfo {
    #[must_use]
    pub fn from_model(user: users::Model, public_url: &str) -> Self {
        let avatar = user.avatar_id.map_or_else(String::new, |id| {
            format!("{}/api/user/avatar/{id}", public_url.trim_end_matches('/'))
        });

        Self {
            user_id: user.id,
            username: user.username,
            email: user.email,
            avatar,
            created_at: user.created_at,
            email_verified: user.email_verified,
        }
    }
}

/// Login result containing the session token and the user it belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserInfo,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Creates an unverified account and mails its first verification code.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UsernameTaken`] or [`AuthError::EmailTaken`] on conflicts.
    /// A mail failure is reported as [`AuthError::Mail`] after the account was stored.
    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserInfo, AuthError>;

    /// Verifies credentials and issues a session token.
    ///
    /// `identity` is looked up as an email when it parses as one, otherwise as a username.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] if login fails.
    async fn login(&self, identity: &str, password: &str) -> Result<LoginResult, AuthError>;

    /// Revokes a token until its natural expiry.
    async fn logout(&self, token: &str, expires_at: DateTime<Utc>) -> Result<(), AuthError>;

    /// Gets information for the token holder.
    async fn current_user(&self, user_id: Uuid) -> Result<UserInfo, AuthError>;

    /// Signs in (creating the account on first use) from a provider profile.
    async fn oauth_login(&self, profile: &OAuthProfile) -> Result<LoginResult, AuthError>;
}
