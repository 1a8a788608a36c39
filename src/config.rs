use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Placeholder signing secret shipped in the default config.
pub const DEFAULT_JWT_SECRET: &str = "change-me-before-deploying";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub security: SecurityConfig,

    pub otp: OtpConfig,

    pub mail: MailConfig,

    pub oauth: OAuthConfig,

    pub prediction: PredictionConfig,

    pub uploads: UploadConfig,

    pub sweeper: SweeperConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    #[serde(default)]
    pub suppress_connection_errors: bool,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/kale.db".to_string(),
            log_level: "info".to_string(),
            suppress_connection_errors: false,
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    /// Externally reachable base URL, used to build avatar and image links.
    pub public_url: String,

    /// Frontend origin that OAuth logins are redirected back to.
    pub frontend_url: String,

    pub cors_allowed_origins: Vec<String>,

    /// Whether to set the Secure flag on the `token` and session cookies.
    /// Set to false for local development without HTTPS.
    pub secure_cookies: bool,

    /// Upper bound for request bodies. Kept above `uploads.max_file_bytes` so that
    /// oversized images reach validation and get a descriptive error.
    pub max_request_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8081,
            public_url: "http://localhost:8081".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            cors_allowed_origins: vec!["http://localhost:3000".to_string()],
            secure_cookies: false,
            max_request_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// HMAC key for session tokens.
    pub jwt_secret: String,

    /// Session token lifetime in hours (default: 72)
    pub token_ttl_hours: i64,

    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations)
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,

    /// Minimum length accepted for new passwords.
    pub min_password_length: usize,

    /// Per-client limiter for the password reset endpoints.
    pub rate_limit: RateLimitConfig,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            token_ttl_hours: 72,
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
            min_password_length: 8,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests allowed per client and route inside one window.
    pub max_requests: u32,

    pub window_seconds: u64,

    /// Trusted proxy IP addresses allowed to provide forwarded client IP headers.
    ///
    /// When empty, forwarded headers are ignored and the socket peer address is used.
    pub trusted_proxy_ips: Vec<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 5,
            window_seconds: 60,
            trusted_proxy_ips: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OtpConfig {
    /// Lifetime of an issued code in minutes (default: 10)
    pub code_ttl_minutes: i64,

    /// Minimum delay between two issuances for the same email (default: 60)
    pub resend_cooldown_seconds: i64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            code_ttl_minutes: 10,
            resend_cooldown_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// When disabled, codes are written to the log instead of being mailed.
    pub enabled: bool,

    pub api_url: String,

    pub api_key: String,

    pub sender_email: String,

    pub sender_name: String,

    pub request_timeout_seconds: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: "https://api.sendgrid.com/v3/mail/send".to_string(),
            api_key: String::new(),
            sender_email: String::new(),
            sender_name: "Kale Project".to_string(),
            request_timeout_seconds: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    pub enabled: bool,

    pub client_id: String,

    pub client_secret: String,

    pub redirect_uri: String,

    pub auth_url: String,

    pub token_url: String,

    pub userinfo_url: String,

    /// Frontend path the browser lands on after a successful login.
    pub success_path: String,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: "http://localhost:8081/api/auth/callback".to_string(),
            auth_url: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://www.googleapis.com/oauth2/v2/userinfo".to_string(),
            success_path: "/auth/oauth-callback".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    pub url: String,

    /// Request timeout in seconds (default: 30)
    pub timeout_seconds: u64,

    /// Attempts for the history insert after a successful prediction (default: 3)
    pub history_insert_attempts: u32,

    /// Linear backoff step between history insert attempts (default: 100)
    pub history_backoff_ms: u64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8083/predict".to_string(),
            timeout_seconds: 30,
            history_insert_attempts: 3,
            history_backoff_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub max_file_bytes: usize,

    pub allowed_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 5 * 1024 * 1024,
            allowed_extensions: vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweeperConfig {
    pub enabled: bool,

    /// Six-field cron expression (seconds first).
    pub cron_expression: String,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron_expression: "0 * * * * *".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            security: SecurityConfig::default(),
            otp: OtpConfig::default(),
            mail: MailConfig::default(),
            oauth: OAuthConfig::default(),
            prediction: PredictionConfig::default(),
            uploads: UploadConfig::default(),
            sweeper: SweeperConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    /// Loads the first config file found, then `.env` and process environment overrides.
    pub fn load() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv()
            && !e.not_found()
        {
            warn!("Failed to read .env file: {e}");
        }

        let mut config = Self::load_file()?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        for path in &Self::config_paths() {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    /// Applies the deployment variables the service has always been configured with.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("DATABASE_URL") {
            self.general.database_path = url;
        }
        if let Some(port) = get("PORT") {
            match port.trim().parse() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!("Ignoring invalid PORT value: {port}"),
            }
        }
        if let Some(url) = get("PUBLIC_URL") {
            self.server.public_url = url;
        }
        if let Some(url) = get("FRONTEND_URL") {
            self.server.frontend_url = url;
        }
        if let Some(secret) = get("SECRET") {
            self.security.jwt_secret = secret;
        }
        if let Some(key) = get("SENDGRID_API_KEY") {
            self.mail.api_key = key;
            self.mail.enabled = true;
        }
        if let Some(sender) = get("EMAIL_SENDGRID") {
            self.mail.sender_email = sender;
        }
        if let Some(id) = get("CLIENT_ID") {
            self.oauth.client_id = id;
            self.oauth.enabled = true;
        }
        if let Some(secret) = get("CLIENT_SECRET") {
            self.oauth.client_secret = secret;
        }
        if let Some(uri) = get("REDIRECT_URI") {
            self.oauth.redirect_uri = uri;
        }
        if let Some(url) = get("PREDICTION_URL") {
            self.prediction.url = url;
        }
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("kale").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".kale").join("config.toml"));
        }

        paths
    }

    #[must_use]
    pub fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.security.jwt_secret.trim().is_empty() {
            anyhow::bail!("security.jwt_secret (SECRET) cannot be empty");
        }

        if self.security.jwt_secret == DEFAULT_JWT_SECRET {
            warn!("Using the default token signing secret; set SECRET before deploying");
        }

        if self.security.token_ttl_hours <= 0 {
            anyhow::bail!("security.token_ttl_hours must be > 0");
        }

        if self.otp.code_ttl_minutes <= 0 || self.otp.resend_cooldown_seconds <= 0 {
            anyhow::bail!("otp.code_ttl_minutes and otp.resend_cooldown_seconds must be > 0");
        }

        if self.mail.enabled
            && (self.mail.api_key.is_empty() || self.mail.sender_email.is_empty())
        {
            anyhow::bail!(
                "Mail is enabled but SENDGRID_API_KEY or EMAIL_SENDGRID is not configured"
            );
        }

        if self.oauth.enabled
            && (self.oauth.client_id.is_empty()
                || self.oauth.client_secret.is_empty()
                || self.oauth.redirect_uri.is_empty())
        {
            anyhow::bail!("Missing CLIENT_ID, CLIENT_SECRET or REDIRECT_URI");
        }

        if self.prediction.history_insert_attempts == 0 {
            anyhow::bail!("prediction.history_insert_attempts must be at least 1");
        }

        if self.server.max_request_bytes <= self.uploads.max_file_bytes {
            anyhow::bail!("server.max_request_bytes must exceed uploads.max_file_bytes");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.security.token_ttl_hours, 72);
        assert_eq!(config.otp.code_ttl_minutes, 10);
        assert_eq!(config.otp.resend_cooldown_seconds, 60);
        assert_eq!(config.security.rate_limit.max_requests, 5);
        assert_eq!(config.uploads.max_file_bytes, 5 * 1024 * 1024);
        assert_eq!(config.prediction.timeout_seconds, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[security.rate_limit]"));
        assert!(toml_str.contains("[prediction]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [otp]
            resend_cooldown_seconds = 30
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.otp.resend_cooldown_seconds, 30);

        assert_eq!(config.otp.code_ttl_minutes, 10);
        assert_eq!(config.server.port, 8081);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PORT", "9090"),
            ("SECRET", "a-much-better-secret"),
            ("SENDGRID_API_KEY", "SG.key"),
            ("EMAIL_SENDGRID", "noreply@example.com"),
            ("PREDICTION_URL", "http://model:8083/predict"),
            ("CLIENT_ID", "   "),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env_overrides(|key| vars.get(key).map(|v| (*v).to_string()));

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.security.jwt_secret, "a-much-better-secret");
        assert!(config.mail.enabled);
        assert_eq!(config.mail.sender_email, "noreply@example.com");
        assert_eq!(config.prediction.url, "http://model:8083/predict");
        assert!(!config.oauth.enabled, "blank values are ignored");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_incomplete_mail() {
        let mut config = Config::default();
        config.mail.enabled = true;
        assert!(config.validate().is_err());

        config.mail.api_key = "SG.key".to_string();
        config.mail.sender_email = "noreply@example.com".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_small_body_limit() {
        let mut config = Config::default();
        config.server.max_request_bytes = config.uploads.max_file_bytes;
        assert!(config.validate().is_err());
    }
}
