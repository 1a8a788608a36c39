//! One-time code generation and the timing rules shared by both code flows.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use crate::config::OtpConfig;

/// Source of one-time codes. Swapped for a fixed generator in tests.
pub trait CodeGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Uniform 6-digit decimal codes from the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self) -> String {
        let code: u32 = rand::rng().random_range(100_000..1_000_000);
        code.to_string()
    }
}

/// Code lifetime and resend cooldown.
#[derive(Debug, Clone, Copy)]
pub struct OtpPolicy {
    pub code_ttl: Duration,
    pub resend_cooldown: Duration,
}

impl OtpPolicy {
    #[must_use]
    pub fn from_config(config: &OtpConfig) -> Self {
        Self {
            code_ttl: Duration::minutes(config.code_ttl_minutes),
            resend_cooldown: Duration::seconds(config.resend_cooldown_seconds),
        }
    }

    #[must_use]
    pub fn expires_at(&self, issued_at: DateTime<Utc>) -> DateTime<Utc> {
        issued_at + self.code_ttl
    }

    /// Latest issuance time that no longer blocks a new code at `now`.
    #[must_use]
    pub fn cooldown_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.resend_cooldown
    }

    #[must_use]
    pub fn in_cooldown(&self, last_sent: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        last_sent.is_some_and(|sent| sent > self.cooldown_cutoff(now))
    }
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self::from_config(&OtpConfig::default())
    }
}

/// A code is still valid at exactly its expiry instant.
#[must_use]
pub fn is_expired(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now > expires_at
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_code_is_six_digits() {
        let generator = RandomCodeGenerator;
        for _ in 0..200 {
            let code = generator.generate();
            assert_eq!(code.len(), 6, "{code}");
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_expiry_boundary_is_strict() {
        let expires = Utc::now();
        assert!(!is_expired(expires, expires));
        assert!(!is_expired(expires, expires - Duration::seconds(1)));
        assert!(is_expired(expires, expires + Duration::milliseconds(1)));
    }

    #[test]
    fn test_cooldown_window() {
        let policy = OtpPolicy::default();
        let sent = Utc::now();

        assert!(!policy.in_cooldown(None, sent));
        assert!(policy.in_cooldown(Some(sent), sent + Duration::seconds(59)));
        assert!(!policy.in_cooldown(Some(sent), sent + Duration::seconds(60)));
        assert!(!policy.in_cooldown(Some(sent), sent + Duration::seconds(61)));
    }

    #[test]
    fn test_expires_at_uses_ttl() {
        let policy = OtpPolicy::default();
        let issued = Utc::now();
        assert_eq!(policy.expires_at(issued) - issued, Duration::minutes(10));
    }
}
