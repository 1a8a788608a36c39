//! HS256 session tokens and their store-backed revocation list.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

use crate::db::Store;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token has expired")]
    Expired,

    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Token has been revoked")]
    Revoked,

    #[error("Token store error: {0}")]
    Store(String),
}

impl From<anyhow::Error> for TokenError {
    fn from(err: anyhow::Error) -> Self {
        Self::Store(err.to_string())
    }
}

/// The only claim set tokens carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

/// Signs and checks tokens without touching storage.
#[derive(Clone)]
pub struct TokenCodec {
    secret: Vec<u8>,
    ttl: Duration,
}

impl TokenCodec {
    #[must_use]
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            ttl,
        }
    }

    fn mac(&self) -> Result<Hmac<Sha256>, TokenError> {
        Hmac::<Sha256>::new_from_slice(&self.secret)
            .map_err(|e| TokenError::Malformed(format!("invalid signing key: {e}")))
    }

    pub fn encode(
        &self,
        user_id: Uuid,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<(String, Claims), TokenError> {
        let claims = Claims {
            user_id,
            username: username.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        let header = Header {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        };

        let header_json = serde_json::to_vec(&header)
            .map_err(|e| TokenError::Malformed(format!("header: {e}")))?;
        let claims_json = serde_json::to_vec(&claims)
            .map_err(|e| TokenError::Malformed(format!("claims: {e}")))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header_json),
            URL_SAFE_NO_PAD.encode(claims_json)
        );

        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok((format!("{signing_input}.{signature}"), claims))
    }

    /// Checks structure, signature and expiry, in that order.
    pub fn decode(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let mut parts = token.trim().split('.');
        let (Some(header_b64), Some(payload_b64), Some(sig_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed("expected three segments".to_string()));
        };

        let header: Header = decode_segment(header_b64)?;
        if header.alg != "HS256" || !header.typ.eq_ignore_ascii_case("JWT") {
            return Err(TokenError::Malformed("unsupported header".to_string()));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| TokenError::InvalidSignature)?;

        let mut mac = self.mac()?;
        mac.update(format!("{header_b64}.{payload_b64}").as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let claims: Claims = decode_segment(payload_b64)?;

        if now.timestamp() > claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, TokenError> {
    let raw = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| TokenError::Malformed(format!("invalid base64url: {e}")))?;
    serde_json::from_slice(&raw).map_err(|e| TokenError::Malformed(e.to_string()))
}

/// Issues, validates and revokes session tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    codec: TokenCodec,
    store: Store,
}

impl TokenIssuer {
    #[must_use]
    pub const fn new(codec: TokenCodec, store: Store) -> Self {
        Self { codec, store }
    }

    pub fn issue(&self, user_id: Uuid, username: &str) -> Result<(String, Claims), TokenError> {
        self.codec.encode(user_id, username, Utc::now())
    }

    /// Cryptographic checks first, then the revocation list.
    pub async fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.codec.decode(token, Utc::now())?;

        if self.store.token_blacklist_repo().contains(token).await? {
            return Err(TokenError::Revoked);
        }

        Ok(claims)
    }

    /// Revoked tokens stay listed until their own expiry.
    pub async fn revoke(&self, token: &str, expires_at: DateTime<Utc>) -> Result<(), TokenError> {
        self.store
            .token_blacklist_repo()
            .add(token, expires_at)
            .await?;
        Ok(())
    }
}
