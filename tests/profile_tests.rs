mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{into_json, multipart_body, multipart_request, spawn_app};
use serde_json::json;

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\navatar";

#[tokio::test]
async fn test_profile_is_owner_only() {
    let app = spawn_app().await;
    let (alice, alice_id) = app.signed_in_user("alice", "a@x.com").await;
    let (_, bob_id) = app.signed_in_user("bob", "b@x.com").await;

    let (status, body) = app
        .authed("GET", &format!("/api/user/{alice_id}"), &alice, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "a@x.com");

    let (status, _) = app
        .authed("GET", &format!("/api/user/{bob_id}"), &alice, None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .authed(
            "PATCH",
            &format!("/api/user/{bob_id}"),
            &alice,
            Some(json!({ "username": "mallory" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.authed("GET", "/api/user/12345", &alice, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid user ID format");
}

#[tokio::test]
async fn test_update_username() {
    let app = spawn_app().await;
    let (alice, alice_id) = app.signed_in_user("alice", "a@x.com").await;
    app.signed_in_user("bob", "b@x.com").await;
    let uri = format!("/api/user/{alice_id}");

    let (status, body) = app
        .authed("PATCH", &uri, &alice, Some(json!({ "username": "alice2" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Username updated");
    assert_eq!(body["data"]["username"], "alice2");

    let (status, _) = app
        .authed("PATCH", &uri, &alice, Some(json!({ "username": "bob" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .authed("PATCH", &uri, &alice, Some(json!({ "username": "" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Setting the current name again is not a conflict
    let (status, _) = app
        .authed("PATCH", &uri, &alice, Some(json!({ "username": "alice2" })))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_avatar_upload_replaces_previous() {
    let app = spawn_app().await;
    let (alice, _) = app.signed_in_user("alice", "a@x.com").await;

    let response = app
        .send(multipart_request(
            "/api/user/avatar",
            Some(&alice),
            multipart_body("avatar", "me.png", PNG_BYTES),
        ))
        .await;
    let (status, body) = into_json(response).await;
    assert_eq!(status, StatusCode::OK);
    let first = body["data"]["avatar"].as_str().unwrap().to_string();
    assert!(first.starts_with("http://kale.test/api/user/avatar/"));

    let first_path = first.trim_start_matches("http://kale.test").to_string();
    let response = app
        .send(Request::builder().uri(&first_path).body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");

    let response = app
        .send(multipart_request(
            "/api/user/avatar",
            Some(&alice),
            multipart_body("avatar", "me2.jpeg", PNG_BYTES),
        ))
        .await;
    let (status, body) = into_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(body["data"]["avatar"].as_str().unwrap(), first);

    // The old blob is gone
    let response = app
        .send(Request::builder().uri(&first_path).body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let (_, body) = app.authed("GET", "/api/auth/user", &alice, None).await;
    assert!(
        body["data"]["avatar"]
            .as_str()
            .unwrap()
            .starts_with("http://kale.test/api/user/avatar/")
    );
}

#[tokio::test]
async fn test_avatar_rules() {
    let app = spawn_app().await;
    let (alice, _) = app.signed_in_user("alice", "a@x.com").await;

    let response = app
        .send(multipart_request(
            "/api/user/avatar",
            None,
            multipart_body("avatar", "me.png", PNG_BYTES),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .send(multipart_request(
            "/api/user/avatar",
            Some(&alice),
            multipart_body("avatar", "me.bmp", PNG_BYTES),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Prediction images are not served from the avatar route
    let response = app
        .send(multipart_request(
            "/api/predict",
            None,
            multipart_body("file", "leaf.png", PNG_BYTES),
        ))
        .await;
    let (_, body) = into_json(response).await;
    let image_id = body["data"]["imageUrl"]
        .as_str()
        .unwrap()
        .rsplit('/')
        .next()
        .unwrap()
        .to_string();

    let response = app
        .send(
            Request::builder()
                .uri(format!("/api/user/avatar/{image_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .send(
            Request::builder()
                .uri("/api/user/avatar/bogus")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
