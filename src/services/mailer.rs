//! Outbound mail for one-time codes.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info};

use crate::config::MailConfig;

/// Which flow a code belongs to; selects the message template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodePurpose {
    EmailVerification,
    PasswordReset,
}

impl CodePurpose {
    #[must_use]
    pub const fn subject(self) -> &'static str {
        match self {
            Self::EmailVerification => "Please verify your email address",
            Self::PasswordReset => "Password Reset OTP",
        }
    }

    #[must_use]
    pub fn plain_text(self, code: &str) -> String {
        match self {
            Self::EmailVerification => format!("Your verification code is: {code}"),
            Self::PasswordReset => format!("Your password reset OTP is: {code}"),
        }
    }

    #[must_use]
    pub fn html(self, code: &str) -> String {
        format!("<strong>{}</strong>", self.plain_text(code))
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_code(&self, to: &str, code: &str, purpose: CodePurpose) -> Result<()>;
}

/// Delivers codes through the SendGrid v3 mail API.
pub struct SendGridMailer {
    client: Client,
    config: MailConfig,
}

impl SendGridMailer {
    #[must_use]
    pub const fn new(client: Client, config: MailConfig) -> Self {
        Self { client, config }
    }

    fn payload(&self, to: &str, code: &str, purpose: CodePurpose) -> serde_json::Value {
        json!({
            "personalizations": [{ "to": [{ "email": to }] }],
            "from": {
                "email": self.config.sender_email,
                "name": self.config.sender_name,
            },
            "subject": purpose.subject(),
            "content": [
                { "type": "text/plain", "value": purpose.plain_text(code) },
                { "type": "text/html", "value": purpose.html(code) },
            ],
        })
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    async fn send_code(&self, to: &str, code: &str, purpose: CodePurpose) -> Result<()> {
        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .timeout(std::time::Duration::from_secs(
                self.config.request_timeout_seconds,
            ))
            .json(&self.payload(to, code, purpose))
            .send()
            .await
            .context("Failed to connect to mail provider")?;

        let status = response.status();
        if status.is_success() {
            debug!(purpose = ?purpose, "Code email accepted by mail provider");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            bail!("Mail provider rejected message: status={status}, body={body}")
        }
    }
}

/// Used when mail delivery is disabled; the code is only logged at debug level.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_code(&self, to: &str, code: &str, purpose: CodePurpose) -> Result<()> {
        info!(
            event = "mail_suppressed",
            to = %to,
            purpose = ?purpose,
            "Mail delivery disabled"
        );
        debug!(to = %to, code = %code, "Suppressed one-time code");
        Ok(())
    }
}
