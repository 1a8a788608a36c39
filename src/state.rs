use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::Config;
use crate::db::Store;
use crate::services::{
    AuthService, CodeGenerator, GoogleOAuthProvider, HttpPredictionClient, LogMailer, Mailer,
    OAuthProvider, OtpPolicy, PredictionClient, PredictionService, ProfileService,
    RandomCodeGenerator, SeaOrmAuthService, SeaOrmVerificationService, SendGridMailer,
    TokenCodec, TokenIssuer, VerificationService,
};

/// Build a shared HTTP client with reasonable defaults for outbound calls.
/// This client should be reused across all HTTP-based services to enable
/// connection pooling and avoid socket exhaustion.
fn build_shared_http_client(timeout_seconds: u64) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_seconds))
        .user_agent(concat!("Kale/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build shared HTTP client: {e}"))
}

/// External collaborators. `None` selects the implementation the config asks for.
#[derive(Default)]
pub struct Collaborators {
    pub mailer: Option<Arc<dyn Mailer>>,
    pub codes: Option<Arc<dyn CodeGenerator>>,
    pub predictor: Option<Arc<dyn PredictionClient>>,
    pub oauth: Option<Arc<dyn OAuthProvider>>,
}

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub tokens: TokenIssuer,

    pub auth_service: Arc<dyn AuthService>,

    pub verification_service: Arc<dyn VerificationService>,

    pub profile_service: Arc<ProfileService>,

    pub prediction_service: Arc<PredictionService>,

    /// Present only when OAuth sign-in is configured
    pub oauth: Option<Arc<dyn OAuthProvider>>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::with_collaborators(config, Collaborators::default()).await
    }

    pub async fn with_collaborators(
        config: Config,
        collaborators: Collaborators,
    ) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        // Mail and prediction calls set their own per-request timeouts.
        let http_client = build_shared_http_client(60)?;

        let mailer: Arc<dyn Mailer> = match collaborators.mailer {
            Some(mailer) => mailer,
            None if config.mail.enabled => Arc::new(SendGridMailer::new(
                http_client.clone(),
                config.mail.clone(),
            )),
            None => {
                info!("Mail delivery disabled; codes will be logged");
                Arc::new(LogMailer)
            }
        };

        let codes: Arc<dyn CodeGenerator> = match collaborators.codes {
            Some(codes) => codes,
            None => Arc::new(RandomCodeGenerator),
        };

        let predictor: Arc<dyn PredictionClient> = match collaborators.predictor {
            Some(predictor) => predictor,
            None => Arc::new(HttpPredictionClient::new(
                http_client.clone(),
                config.prediction.clone(),
            )),
        };

        let oauth: Option<Arc<dyn OAuthProvider>> = match collaborators.oauth {
            Some(oauth) => Some(oauth),
            None if config.oauth.enabled => Some(Arc::new(GoogleOAuthProvider::new(
                http_client.clone(),
                config.oauth.clone(),
            )) as Arc<dyn OAuthProvider>),
            None => None,
        };

        let policy = OtpPolicy::from_config(&config.otp);
        let tokens = TokenIssuer::new(
            TokenCodec::new(
                &config.security.jwt_secret,
                chrono::Duration::hours(config.security.token_ttl_hours),
            ),
            store.clone(),
        );
        let public_url = config.server.public_url.clone();

        let auth_service: Arc<dyn AuthService> = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            tokens.clone(),
            mailer.clone(),
            codes.clone(),
            policy,
            config.security.clone(),
            public_url.clone(),
        ));

        let verification_service: Arc<dyn VerificationService> =
            Arc::new(SeaOrmVerificationService::new(
                store.clone(),
                mailer,
                codes,
                policy,
                config.security.clone(),
            ));

        let profile_service = Arc::new(ProfileService::new(
            store.clone(),
            config.uploads.clone(),
            public_url.clone(),
        ));

        let prediction_service = Arc::new(PredictionService::new(
            store.clone(),
            predictor,
            config.prediction.clone(),
            config.uploads.clone(),
            public_url,
        ));

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            store,
            tokens,
            auth_service,
            verification_service,
            profile_service,
            prediction_service,
            oauth,
        })
    }
}
