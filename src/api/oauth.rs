use axum::{
    extract::{Query, State},
    http::header,
    response::{AppendHeaders, IntoResponse, Redirect},
};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use serde::Deserialize;
use std::sync::Arc;
use tower_sessions::Session;

use super::auth::session_cookie;
use super::{ApiError, AppState};
use crate::services::OAuthProvider;

const STATE_KEY: &str = "oauth_state";

#[derive(Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

fn provider(state: &AppState) -> Result<&Arc<dyn OAuthProvider>, ApiError> {
    state
        .shared
        .oauth
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("OAuth sign-in is not configured".to_string()))
}

fn random_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// GET /auth/oauth
pub async fn start(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Redirect, ApiError> {
    let provider = provider(&state)?;

    let oauth_state = random_state();
    session
        .insert(STATE_KEY, &oauth_state)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to store OAuth state: {e}")))?;

    let url = provider.authorize_url(&oauth_state)?;
    Ok(Redirect::to(&url))
}

/// GET /auth/callback
pub async fn callback(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let provider = provider(&state)?;

    let expected = session
        .remove::<String>(STATE_KEY)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to read OAuth state: {e}")))?;

    match (expected, query.state.as_deref()) {
        (Some(expected), Some(received)) if expected == received => {}
        _ => {
            tracing::warn!(event = "oauth_state_mismatch", "OAuth callback with unknown state");
            return Err(ApiError::validation("Invalid OAuth state"));
        }
    }

    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::validation("Missing code"))?;

    let profile = provider
        .exchange_code(&code)
        .await
        .map_err(|e| ApiError::ExternalApiError {
            service: "OAuth".to_string(),
            message: format!("{e:#}"),
        })?;

    let login = state.auth_service().oauth_login(&profile).await?;

    let (secure, target) = {
        let config = state.config().read().await;
        (
            config.server.secure_cookies,
            format!(
                "{}{}",
                config.server.frontend_url.trim_end_matches('/'),
                config.oauth.success_path
            ),
        )
    };

    let remaining = (login.expires_at - chrono::Utc::now()).num_seconds().max(0);
    let cookie = session_cookie(&login.token, time::Duration::seconds(remaining), secure);

    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Redirect::to(&target),
    ))
}
