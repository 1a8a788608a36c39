use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::config::Config;
use crate::state::SharedState;

pub mod auth;
mod error;
mod history;
mod oauth;
mod observability;
mod predict;
pub mod rate_limit;
mod types;
mod upload;
mod users;
pub mod validation;
mod verification;

pub use error::ApiError;
pub use rate_limit::RateLimiter;
pub use types::*;

use tokio::sync::RwLock;

use crate::services::{AuthService, PredictionService, ProfileService, VerificationService};
use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub rate_limiter: Arc<RateLimiter>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Arc<RwLock<Config>> {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn auth_service(&self) -> &Arc<dyn AuthService> {
        &self.shared.auth_service
    }

    #[must_use]
    pub fn verification_service(&self) -> &Arc<dyn VerificationService> {
        &self.shared.verification_service
    }

    #[must_use]
    pub fn profile_service(&self) -> &Arc<ProfileService> {
        &self.shared.profile_service
    }

    #[must_use]
    pub fn prediction_service(&self) -> &Arc<PredictionService> {
        &self.shared.prediction_service
    }
}

pub async fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    let rate_limiter = {
        let config = shared.config.read().await;
        Arc::new(RateLimiter::new(&config.security.rate_limit))
    };

    Arc::new(AppState {
        shared,
        rate_limiter,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn router(state: Arc<AppState>) -> Router {
    let (cors_origins, secure_cookies, body_limit) = {
        let config = state.config().read().await;
        (
            config.server.cors_allowed_origins.clone(),
            config.server.secure_cookies,
            config.server.max_request_bytes,
        )
    };

    // Only the OAuth handshake keeps server-side session state
    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(secure_cookies)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(10)));

    let oauth_routes = Router::new()
        .route("/auth/oauth", get(oauth::start))
        .route("/auth/callback", get(oauth::callback))
        .layer(session_layer);

    let limited_routes = Router::new()
        .route("/auth/forgot-password", post(verification::forgot_password))
        .route("/auth/verify-reset-otp", post(verification::verify_reset_code))
        .route("/auth/resend-reset-otp", post(verification::resend_reset_code))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_middleware,
        ));

    let optional_auth_routes = Router::new()
        .route("/predict", post(predict::predict))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::optional_auth_middleware,
        ));

    let api_router = Router::new()
        .merge(create_protected_router(state.clone()))
        .merge(limited_routes)
        .merge(optional_auth_routes)
        .merge(oauth_routes)
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/verify-email", post(verification::verify_email))
        .route("/auth/resend-otp", post(verification::resend_verification))
        .route("/auth/reset-password", post(verification::reset_password))
        .route("/user/avatar/{file_id}", get(users::get_avatar))
        .route("/image/{file_id}", get(predict::get_image))
        .route("/health", get(observability::health));

    let cors_layer = if cors_origins.iter().any(|o| o == "*") {
        // Credentialed CORS cannot use a literal wildcard
        CorsLayer::new().allow_origin(AllowOrigin::mirror_request())
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    let cors_layer = cors_layer
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    Router::new()
        .nest("/api", api_router)
        .route("/metrics", get(observability::get_metrics))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
}

fn create_protected_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/user", get(auth::get_current_user))
        .route("/user/avatar", post(users::upload_avatar))
        .route("/user/{id}", get(users::get_user).patch(users::update_user))
        .route("/history", get(history::list_history))
        .route(
            "/history/{id}",
            get(history::get_history).delete(history::delete_history),
        )
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::auth_middleware,
        ))
}
