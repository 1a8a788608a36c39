mod common;

use axum::{
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use common::{StubOAuthProvider, into_json, spawn_app, spawn_app_with, test_config};
use kale::services::OAuthProfile;
use std::sync::Arc;

async fn oauth_app(name: &str, email: &str) -> common::TestApp {
    let provider = StubOAuthProvider {
        profile: OAuthProfile {
            email: email.to_string(),
            name: name.to_string(),
        },
    };
    spawn_app_with(test_config(), Some(Arc::new(provider))).await
}

fn cookie_pair(response: &Response<Body>, name: &str) -> String {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .find(|pair| pair.starts_with(&format!("{name}=")))
        .unwrap()
        .to_string()
}

/// Starts the handshake; returns the session cookie and the issued state.
async fn start(app: &common::TestApp) -> (String, String) {
    let response = app
        .send(
            Request::builder()
                .uri("/api/auth/oauth")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
    let state = location.split("state=").nth(1).unwrap().to_string();
    (cookie_pair(&response, "id"), state)
}

async fn callback(app: &common::TestApp, session: &str, query: &str) -> Response<Body> {
    app.send(
        Request::builder()
            .uri(format!("/api/auth/callback?{query}"))
            .header(header::COOKIE, session)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

#[tokio::test]
async fn test_oauth_creates_verified_account() {
    let app = oauth_app("Jane Doe", "jane@x.com").await;
    let (session, state) = start(&app).await;

    let response = callback(&app, &session, &format!("code=abc&state={state}")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()[header::LOCATION],
        "http://frontend.test/auth/oauth-callback"
    );

    let token_cookie = cookie_pair(&response, "token");

    let response = app
        .send(
            Request::builder()
                .uri("/api/auth/user")
                .header(header::COOKIE, token_cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    let (status, body) = into_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "Jane Doe");
    assert_eq!(body["data"]["emailVerified"], true);

    // OAuth-only accounts have no password to log in with
    let (status, _) = app
        .post_json(
            "/api/auth/login",
            serde_json::json!({ "identity": "jane@x.com", "password": "" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app
        .post_json(
            "/api/auth/login",
            serde_json::json!({ "identity": "jane@x.com", "password": "anything-at-all" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_oauth_reuses_account_and_dedupes_username() {
    let app = oauth_app("alice", "alice@gmail.com").await;
    app.signed_in_user("alice", "a@x.com").await;

    let (session, state) = start(&app).await;
    let response = callback(&app, &session, &format!("code=abc&state={state}")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let created = app
        .shared
        .store
        .user_repo()
        .get_by_email("alice@gmail.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(created.username, "alice2");
    assert!(created.password_hash.is_none());

    let (session, state) = start(&app).await;
    let response = callback(&app, &session, &format!("code=abc&state={state}")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let again = app
        .shared
        .store
        .user_repo()
        .get_by_email("alice@gmail.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(again.id, created.id);
}

#[tokio::test]
async fn test_oauth_state_and_code_checks() {
    let app = oauth_app("Jane Doe", "jane@x.com").await;

    let (session, _) = start(&app).await;
    let response = callback(&app, &session, "code=abc&state=forged").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // State is single-use even when it was wrong
    let (session, state) = start(&app).await;
    let response = callback(&app, &session, &format!("state={state}")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (session, state) = start(&app).await;
    let response = callback(&app, &session, &format!("code=bad&state={state}")).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let response = app
        .send(
            Request::builder()
                .uri("/api/auth/callback?code=abc&state=x")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_oauth_unconfigured_is_not_found() {
    let app = spawn_app().await;

    let response = app
        .send(
            Request::builder()
                .uri("/api/auth/oauth")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
