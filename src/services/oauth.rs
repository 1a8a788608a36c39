//! Google sign-in: consent URL, code exchange and profile lookup.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::config::OAuthConfig;

/// The profile fields an account is created from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthProfile {
    pub email: String,
    pub name: String,
}

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Consent page URL carrying `state`.
    fn authorize_url(&self, state: &str) -> Result<String>;

    /// Exchanges an authorization code and fetches the user's profile.
    async fn exchange_code(&self, code: &str) -> Result<OAuthProfile>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    email: Option<String>,
    #[serde(default)]
    name: String,
}

pub struct GoogleOAuthProvider {
    client: Client,
    config: OAuthConfig,
}

impl GoogleOAuthProvider {
    #[must_use]
    pub const fn new(client: Client, config: OAuthConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl OAuthProvider for GoogleOAuthProvider {
    fn authorize_url(&self, state: &str) -> Result<String> {
        let mut url = Url::parse(&self.config.auth_url).context("Invalid OAuth auth URL")?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", "email profile")
            .append_pair("access_type", "offline")
            .append_pair("state", state);
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<OAuthProfile> {
        let params = [
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await
            .context("Failed to reach OAuth token endpoint")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Token exchange failed: status={status}, body={body}");
        }

        let token: TokenResponse = response
            .json()
            .await
            .context("Invalid token exchange response")?;

        let response = self
            .client
            .get(&self.config.userinfo_url)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .context("Failed to reach OAuth userinfo endpoint")?;

        let status = response.status();
        if !status.is_success() {
            bail!("User info request failed: status={status}");
        }

        let info: UserInfoResponse = response.json().await.context("Invalid user info response")?;
        let Some(email) = info.email.filter(|e| !e.is_empty()) else {
            bail!("OAuth profile has no email address");
        };

        Ok(OAuthProfile {
            email,
            name: info.name,
        })
    }
}
