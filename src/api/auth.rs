use axum::{
    Extension, Json,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{AppendHeaders, IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tower_sessions::cookie::{Cookie, SameSite};
use uuid::Uuid;

use super::validation::{validate_email, validate_password, validate_username};
use super::{ApiError, ApiResponse, AppState};
use crate::services::{LoginResult, UserInfo};

pub const TOKEN_COOKIE: &str = "token";

// ============================================================================
// Request Types
// ============================================================================

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    /// Username or email address
    pub identity: String,
    pub password: String,
}

/// The authenticated caller, inserted into request extensions by the auth gate.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub username: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

// ============================================================================
// Middleware
// ============================================================================

/// Requires a valid session token from either:
/// 1. the `token` cookie (set at login)
/// 2. an `Authorization: Bearer <token>` header
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing or malformed token"))?;

    let user = authenticate(&state, token).await?;
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Attaches the caller when a token is present; anonymous requests pass through.
/// A token that is present but invalid is still rejected.
pub async fn optional_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(token) = extract_token(request.headers()) {
        let user = authenticate(&state, token).await?;
        request.extensions_mut().insert(user);
    }

    Ok(next.run(request).await)
}

async fn authenticate(state: &AppState, token: String) -> Result<CurrentUser, ApiError> {
    let claims = state.shared.tokens.validate(&token).await.map_err(|e| {
        tracing::debug!(error = %e, "Rejected session token");
        ApiError::from(e)
    })?;

    tracing::Span::current().record("user_id", tracing::field::display(claims.user_id));

    Ok(CurrentUser {
        id: claims.user_id,
        expires_at: claims.expires_at(),
        username: claims.username,
        token,
    })
}

/// Extract the session token from the cookie or the bearer header
fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION)
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
        && !token.trim().is_empty()
    {
        return Some(token.trim().to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == TOKEN_COOKIE && !cookie.value().is_empty())
        .map(|cookie| cookie.value().to_string())
}

pub fn session_cookie(token: &str, max_age: time::Duration, secure: bool) -> String {
    Cookie::build((TOKEN_COOKIE, token.to_string()))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .build()
        .to_string()
}

fn login_cookie(login: &LoginResult, secure: bool) -> String {
    let remaining = (login.expires_at - Utc::now()).num_seconds().max(0);
    session_cookie(&login.token, time::Duration::seconds(remaining), secure)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let min_password = state.config().read().await.security.min_password_length;

    let username = validate_username(&payload.username)?;
    let email = validate_email(&payload.email)?;
    validate_password(&payload.password, min_password)?;

    let user = state
        .auth_service()
        .register(&username, &email, &payload.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            "Registration successful. Please check your email for the verification code.",
            user,
        )),
    ))
}

/// POST /auth/login
/// Returns the token in the body and also sets it as the `token` cookie
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.identity.trim().is_empty() {
        return Err(ApiError::validation("Username or email is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let result = state
        .auth_service()
        .login(payload.identity.trim(), &payload.password)
        .await?;

    let secure = state.config().read().await.server.secure_cookies;
    let cookie = login_cookie(&result, secure);

    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(ApiResponse::success("Login successful", result)),
    ))
}

/// POST /auth/logout
/// Revokes the presented token until its natural expiry and clears the cookie
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .auth_service()
        .logout(&user.token, user.expires_at)
        .await?;

    let secure = state.config().read().await.server.secure_cookies;

    Ok((
        AppendHeaders([(
            header::SET_COOKIE,
            session_cookie("", time::Duration::ZERO, secure),
        )]),
        Json(ApiResponse::message("Logged out successfully")),
    ))
}

/// GET /auth/user
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<UserInfo>>, ApiError> {
    let info = state.auth_service().current_user(user.id).await?;
    Ok(Json(ApiResponse::success("User found", info)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "theme=dark; token=from-cookie".parse().unwrap());
        assert_eq!(extract_token(&headers).as_deref(), Some("from-cookie"));

        headers.insert(header::AUTHORIZATION, "Bearer from-header".parse().unwrap());
        assert_eq!(extract_token(&headers).as_deref(), Some("from-header"));
    }

    #[test]
    fn test_missing_or_empty_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_token(&headers), None);

        headers.insert(header::COOKIE, "token=".parse().unwrap());
        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(extract_token(&headers), None);
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("abc", time::Duration::hours(1), false);
        assert!(cookie.starts_with("token=abc"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Max-Age=3600"));
        assert!(!cookie.contains("Secure"));
    }
}
