//! `SeaORM` implementation of the `VerificationService` trait.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::SecurityConfig;
use crate::db::Store;
use crate::db::repositories::user::hash_password_blocking;
use crate::entities::users;
use crate::services::mailer::{CodePurpose, Mailer};
use crate::services::otp::{CodeGenerator, OtpPolicy, is_expired};
use crate::services::verification_service::{VerificationError, VerificationService};

pub struct SeaOrmVerificationService {
    store: Store,
    mailer: Arc<dyn Mailer>,
    codes: Arc<dyn CodeGenerator>,
    policy: OtpPolicy,
    security: SecurityConfig,
}

impl SeaOrmVerificationService {
    #[must_use]
    pub fn new(
        store: Store,
        mailer: Arc<dyn Mailer>,
        codes: Arc<dyn CodeGenerator>,
        policy: OtpPolicy,
        security: SecurityConfig,
    ) -> Self {
        Self {
            store,
            mailer,
            codes,
            policy,
            security,
        }
    }

    async fn find_user(&self, email: &str) -> Result<users::Model, VerificationError> {
        self.store
            .user_repo()
            .get_by_email(email)
            .await?
            .ok_or(VerificationError::UserNotFound)
    }

    async fn find_verified_user(&self, email: &str) -> Result<users::Model, VerificationError> {
        let user = self.find_user(email).await?;
        if !user.email_verified {
            return Err(VerificationError::EmailNotVerified);
        }
        Ok(user)
    }

    async fn dispatch(
        &self,
        email: &str,
        code: &str,
        purpose: CodePurpose,
    ) -> Result<(), VerificationError> {
        self.mailer
            .send_code(email, code, purpose)
            .await
            .map_err(|e| {
                error!(event = "mail_failed", purpose = ?purpose, error = %e, "Failed to send code email");
                VerificationError::Mail(e.to_string())
            })
    }

    async fn issue_reset_code(&self, email: &str) -> Result<(), VerificationError> {
        self.find_verified_user(email).await?;

        let now = Utc::now();
        let code = self.codes.generate();

        let written = self
            .store
            .password_reset_repo()
            .issue(
                email,
                &code,
                now,
                self.policy.expires_at(now),
                self.policy.cooldown_cutoff(now),
            )
            .await?;

        if !written {
            return Err(VerificationError::Cooldown);
        }

        self.dispatch(email, &code, CodePurpose::PasswordReset).await
    }
}

#[async_trait]
impl VerificationService for SeaOrmVerificationService {
    async fn verify_email(&self, email: &str, code: &str) -> Result<(), VerificationError> {
        let Some(user) = self.store.user_repo().get_by_email(email).await? else {
            return Err(VerificationError::InvalidCode);
        };

        if user.email_verified || user.verification_code.as_deref() != Some(code) {
            return Err(VerificationError::InvalidCode);
        }

        let now = Utc::now();
        if user
            .code_expires_at
            .is_none_or(|expires_at| is_expired(expires_at, now))
        {
            return Err(VerificationError::CodeExpired);
        }

        // Conditional on the code still being pending; a concurrent verify loses here.
        if !self
            .store
            .user_repo()
            .consume_verification_code(user.id, code)
            .await?
        {
            return Err(VerificationError::InvalidCode);
        }

        info!(event = "email_verified", user_id = %user.id, "Email verified");
        Ok(())
    }

    async fn resend_verification(&self, email: &str) -> Result<(), VerificationError> {
        let user = self.find_user(email).await?;

        if user.email_verified {
            return Err(VerificationError::AlreadyVerified);
        }

        let now = Utc::now();
        if self.policy.in_cooldown(user.last_verification_sent, now) {
            return Err(VerificationError::Cooldown);
        }

        let code = self.codes.generate();
        let written = self
            .store
            .user_repo()
            .replace_verification_code(
                user.id,
                &code,
                now,
                self.policy.expires_at(now),
                self.policy.cooldown_cutoff(now),
            )
            .await?;

        if !written {
            return Err(VerificationError::Cooldown);
        }

        info!(event = "verification_code_issued", user_id = %user.id, "Verification code re-issued");
        self.dispatch(&user.email, &code, CodePurpose::EmailVerification)
            .await
    }

    async fn request_password_reset(&self, email: &str) -> Result<(), VerificationError> {
        self.issue_reset_code(email).await?;
        info!(event = "reset_code_issued", "Password reset code issued");
        Ok(())
    }

    async fn resend_reset_code(&self, email: &str) -> Result<(), VerificationError> {
        self.issue_reset_code(email).await?;
        info!(event = "reset_code_reissued", "Password reset code re-sent");
        Ok(())
    }

    async fn verify_reset_code(&self, email: &str, code: &str) -> Result<(), VerificationError> {
        self.find_verified_user(email).await?;

        let entry = self
            .store
            .password_reset_repo()
            .get_by_email(email)
            .await?
            .filter(|entry| !entry.used && entry.verification_code == code)
            .ok_or(VerificationError::InvalidCode)?;

        if is_expired(entry.expires_at, Utc::now()) {
            return Err(VerificationError::CodeExpired);
        }

        if !self.store.password_reset_repo().mark_used(entry.id).await? {
            return Err(VerificationError::InvalidCode);
        }

        Ok(())
    }

    async fn reset_password(
        &self,
        email: &str,
        new_password: &str,
    ) -> Result<(), VerificationError> {
        let user = self.find_verified_user(email).await?;

        if !self.store.password_reset_repo().has_used_entry(email).await? {
            return Err(VerificationError::NoVerifiedReset);
        }

        let password_hash = hash_password_blocking(new_password, &self.security).await?;

        if !self
            .store
            .password_reset_repo()
            .complete_reset(email, user.id, password_hash)
            .await?
        {
            warn!(user_id = %user.id, "Reset entry consumed concurrently");
            return Err(VerificationError::NoVerifiedReset);
        }

        info!(event = "password_reset", user_id = %user.id, "Password reset completed");
        Ok(())
    }
}
