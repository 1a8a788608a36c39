//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::SecurityConfig;
use crate::db::repositories::user::hash_password_blocking;
use crate::db::{NewUser, Store, is_unique_violation};
use crate::entities::users;
use crate::services::auth_service::{
    AuthError, AuthService, LoginResult, MAX_USERNAME_LEN, UserInfo, is_email,
};
use crate::services::mailer::{CodePurpose, Mailer};
use crate::services::oauth::OAuthProfile;
use crate::services::otp::{CodeGenerator, OtpPolicy};
use crate::services::token::TokenIssuer;

/// How many numbered variants of an OAuth display name are tried.
const USERNAME_ATTEMPTS: usize = 50;

pub struct SeaOrmAuthService {
    store: Store,
    tokens: TokenIssuer,
    mailer: Arc<dyn Mailer>,
    codes: Arc<dyn CodeGenerator>,
    policy: OtpPolicy,
    security: SecurityConfig,
    public_url: String,
}

impl SeaOrmAuthService {
    #[must_use]
    pub fn new(
        store: Store,
        tokens: TokenIssuer,
        mailer: Arc<dyn Mailer>,
        codes: Arc<dyn CodeGenerator>,
        policy: OtpPolicy,
        security: SecurityConfig,
        public_url: String,
    ) -> Self {
        Self {
            store,
            tokens,
            mailer,
            codes,
            policy,
            security,
            public_url,
        }
    }

    fn session_for(&self, user: users::Model) -> Result<LoginResult, AuthError> {
        let (token, claims) = self.tokens.issue(user.id, &user.username)?;
        Ok(LoginResult {
            token,
            expires_at: claims.expires_at(),
            user: UserInfo::from_model(user, &self.public_url),
        })
    }

    /// Picks the first free username derived from the provider profile and creates the account.
    async fn create_oauth_user(&self, profile: &OAuthProfile) -> Result<users::Model, AuthError> {
        let base = oauth_username_base(profile);

        for attempt in 0..USERNAME_ATTEMPTS {
            let candidate = username_candidate(&base, attempt);
            if self.store.user_repo().username_taken(&candidate).await? {
                continue;
            }

            let new_user = NewUser {
                username: candidate,
                email: profile.email.clone(),
                password_hash: None,
                email_verified: true,
                verification_code: None,
                code_expires_at: None,
                last_verification_sent: None,
            };

            match self.store.user_repo().create(new_user).await {
                Ok(user) => return Ok(user),
                Err(e) if is_unique_violation(&e) => {
                    // Either the name or the email was claimed concurrently.
                    if let Some(user) = self.store.user_repo().get_by_email(&profile.email).await? {
                        return Ok(user);
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        let fallback = NewUser {
            username: username_candidate(&base, usize::MAX),
            email: profile.email.clone(),
            password_hash: None,
            email_verified: true,
            verification_code: None,
            code_expires_at: None,
            last_verification_sent: None,
        };
        Ok(self.store.user_repo().create(fallback).await?)
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserInfo, AuthError> {
        let repo = self.store.user_repo();

        if repo.username_taken(username).await? {
            return Err(AuthError::UsernameTaken);
        }
        if repo.get_by_email(email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = hash_password_blocking(password, &self.security).await?;

        let now = Utc::now();
        let code = self.codes.generate();

        let new_user = NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: Some(password_hash),
            email_verified: false,
            verification_code: Some(code.clone()),
            code_expires_at: Some(self.policy.expires_at(now)),
            last_verification_sent: Some(now),
        };

        let user = match repo.create(new_user).await {
            Ok(user) => user,
            Err(e) if is_unique_violation(&e) => {
                return Err(if repo.username_taken(username).await? {
                    AuthError::UsernameTaken
                } else {
                    AuthError::EmailTaken
                });
            }
            Err(e) => return Err(e.into()),
        };

        info!(event = "user_registered", user_id = %user.id, "User registered");

        if let Err(e) = self
            .mailer
            .send_code(&user.email, &code, CodePurpose::EmailVerification)
            .await
        {
            error!(event = "mail_failed", user_id = %user.id, error = %e, "Failed to send verification email");
            return Err(AuthError::Mail(e.to_string()));
        }

        Ok(UserInfo::from_model(user, &self.public_url))
    }

    async fn login(&self, identity: &str, password: &str) -> Result<LoginResult, AuthError> {
        let identity = identity.trim();
        let repo = self.store.user_repo();

        let user = if is_email(identity) {
            repo.get_by_email(identity).await?
        } else {
            repo.get_by_username(identity).await?
        };

        let Some(user) = user else {
            return Err(AuthError::InvalidCredentials);
        };

        if !repo.verify_password(&user, password).await? {
            return Err(AuthError::InvalidCredentials);
        }

        info!(event = "login", user_id = %user.id, "User logged in");
        self.session_for(user)
    }

    async fn logout(&self, token: &str, expires_at: DateTime<Utc>) -> Result<(), AuthError> {
        self.tokens.revoke(token, expires_at).await?;
        Ok(())
    }

    async fn current_user(&self, user_id: Uuid) -> Result<UserInfo, AuthError> {
        let user = self
            .store
            .user_repo()
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        Ok(UserInfo::from_model(user, &self.public_url))
    }

    async fn oauth_login(&self, profile: &OAuthProfile) -> Result<LoginResult, AuthError> {
        if !is_email(&profile.email) {
            return Err(AuthError::Validation(
                "OAuth provider returned no usable email".to_string(),
            ));
        }

        let user = match self.store.user_repo().get_by_email(&profile.email).await? {
            Some(user) => user,
            None => {
                let user = self.create_oauth_user(profile).await?;
                info!(event = "user_registered", user_id = %user.id, via = "oauth", "User registered");
                user
            }
        };

        self.session_for(user)
    }
}

fn oauth_username_base(profile: &OAuthProfile) -> String {
    let name = profile.name.trim();
    let base = if name.is_empty() {
        profile.email.split('@').next().unwrap_or_default()
    } else {
        name
    };

    let base: String = base.chars().filter(|c| !c.is_control()).collect();
    if base.is_empty() {
        "user".to_string()
    } else {
        base
    }
}

fn username_candidate(base: &str, attempt: usize) -> String {
    let suffix = match attempt {
        0 => String::new(),
        usize::MAX => format!("-{}", &Uuid::new_v4().simple().to_string()[..8]),
        n => (n + 1).to_string(),
    };

    let keep = MAX_USERNAME_LEN - suffix.chars().count();
    let mut name: String = base.chars().take(keep).collect();
    name.push_str(&suffix);
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str, email: &str) -> OAuthProfile {
        OAuthProfile {
            email: email.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_username_base_prefers_display_name() {
        assert_eq!(oauth_username_base(&profile("Jane Doe", "jd@x.com")), "Jane Doe");
        assert_eq!(oauth_username_base(&profile("  ", "jd@x.com")), "jd");
    }

    #[test]
    fn test_username_candidates_stay_within_limit() {
        assert_eq!(username_candidate("jane", 0), "jane");
        assert_eq!(username_candidate("jane", 1), "jane2");

        let long = "x".repeat(60);
        assert_eq!(username_candidate(&long, 0).chars().count(), MAX_USERNAME_LEN);
        let numbered = username_candidate(&long, 9);
        assert_eq!(numbered.chars().count(), MAX_USERNAME_LEN);
        assert!(numbered.ends_with("10"));
        assert_eq!(username_candidate(&long, usize::MAX).chars().count(), MAX_USERNAME_LEN);
    }
}
