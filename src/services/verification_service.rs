//! Domain service for the two one-time code flows.
//!
//! Email verification: `PENDING -> VERIFIED`, with expiry.
//! Password reset: `PENDING -> USED -> CONSUMED`, with expiry.
//! Both flows share the resend cooldown and the code lifetime from [`OtpPolicy`].
//!
//! [`OtpPolicy`]: crate::services::otp::OtpPolicy

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("User not found")]
    UserNotFound,

    #[error("Email already verified")]
    AlreadyVerified,

    #[error("Email not verified. Please verify your email before resetting password.")]
    EmailNotVerified,

    #[error("Please wait before requesting another code")]
    Cooldown,

    #[error("Invalid verification code")]
    InvalidCode,

    #[error("Verification code has expired")]
    CodeExpired,

    #[error("No verified OTP found. Please verify OTP first.")]
    NoVerifiedReset,

    #[error("Failed to send email: {0}")]
    Mail(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for VerificationError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Inputs are expected to be syntactically validated by the caller.
#[async_trait::async_trait]
pub trait VerificationService: Send + Sync {
    /// Consumes the pending email code and marks the address verified.
    ///
    /// # Errors
    ///
    /// [`VerificationError::InvalidCode`] when no such pending code exists,
    /// [`VerificationError::CodeExpired`] when it is past its expiry.
    async fn verify_email(&self, email: &str, code: &str) -> Result<(), VerificationError>;

    /// Issues and mails a new email code, subject to the cooldown.
    async fn resend_verification(&self, email: &str) -> Result<(), VerificationError>;

    /// Issues and mails a reset code for a verified account.
    async fn request_password_reset(&self, email: &str) -> Result<(), VerificationError>;

    /// Same rules as [`Self::request_password_reset`]; kept separate for logging.
    async fn resend_reset_code(&self, email: &str) -> Result<(), VerificationError>;

    /// Marks the reset code used, unlocking [`Self::reset_password`].
    async fn verify_reset_code(&self, email: &str, code: &str) -> Result<(), VerificationError>;

    /// Replaces the password if a used reset code exists, then deletes that code.
    async fn reset_password(&self, email: &str, new_password: &str)
    -> Result<(), VerificationError>;
}
