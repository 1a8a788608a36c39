mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{into_json, multipart_body, multipart_request, spawn_app};
use http_body_util::BodyExt;
use kale::entities::stored_files;
use sea_orm::{ConnectionTrait, EntityTrait, PaginatorTrait};

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nnot-really-a-png";

async fn stored_file_count(app: &common::TestApp) -> u64 {
    stored_files::Entity::find()
        .count(&app.shared.store.conn)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_anonymous_prediction_skips_history() {
    let app = spawn_app().await;

    let response = app
        .send(multipart_request(
            "/api/predict",
            None,
            multipart_body("file", "leaf.png", PNG_BYTES),
        ))
        .await;
    let (status, body) = into_json(response).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["percentage_weight_lose"], 12.5);
    assert_eq!(body["data"]["features"]["moisture"], 0.4);
    assert!(body["data"]["imageUrl"]
        .as_str()
        .unwrap()
        .starts_with("http://kale.test/api/image/"));
    assert!(body["data"].get("historyId").is_none());
    assert_eq!(app.predictor.calls.lock().unwrap().as_slice(), ["leaf.png"]);
}

#[tokio::test]
async fn test_signed_in_prediction_records_history() {
    let app = spawn_app().await;
    let (token, user_id) = app.signed_in_user("alice", "a@x.com").await;

    let response = app
        .send(multipart_request(
            "/api/predict",
            Some(&token),
            multipart_body("file", "Leaf.JPG", PNG_BYTES),
        ))
        .await;
    let (status, body) = into_json(response).await;
    assert_eq!(status, StatusCode::OK);

    let history_id = body["data"]["historyId"].as_str().unwrap().to_string();
    let image_url = body["data"]["imageUrl"].as_str().unwrap().to_string();

    let (status, body) = app.authed("GET", "/api/history", &token, None).await;
    assert_eq!(status, StatusCode::OK);
    let entries = body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["_id"], history_id.as_str());
    assert_eq!(entries[0]["UserID"], user_id.as_str());
    assert_eq!(entries[0]["FileName"], "Leaf.JPG");
    assert_eq!(entries[0]["Percentage"], 12.5);
    assert_eq!(entries[0]["ImageUrl"], image_url.as_str());
    assert!(entries[0]["Timestamp"].is_string());

    // The stored image is served back with its content type
    let path = image_url.trim_start_matches("http://kale.test");
    let response = app
        .send(Request::builder().uri(path).body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], PNG_BYTES);
}

#[tokio::test]
async fn test_history_insert_failure_returns_500() {
    let app = spawn_app().await;
    let (token, _) = app.signed_in_user("alice", "a@x.com").await;

    app.shared
        .store
        .conn
        .execute_unprepared("DROP TABLE prediction_history")
        .await
        .unwrap();

    let response = app
        .send(multipart_request(
            "/api/predict",
            Some(&token),
            multipart_body("file", "leaf.png", PNG_BYTES),
        ))
        .await;
    let (status, body) = into_json(response).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "An internal error occurred");
    // The upstream call itself went through once
    assert_eq!(app.predictor.calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_uploads_rejected_before_storage() {
    let app = spawn_app().await;

    let response = app
        .send(multipart_request(
            "/api/predict",
            None,
            multipart_body("file", "leaf.gif", PNG_BYTES),
        ))
        .await;
    let (status, body) = into_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().starts_with("Invalid file type"));

    let big = vec![0u8; 6 * 1024 * 1024];
    let response = app
        .send(multipart_request(
            "/api/predict",
            None,
            multipart_body("file", "leaf.png", &big),
        ))
        .await;
    let (status, body) = into_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "File too large. Maximum size is 5MB");

    let response = app
        .send(multipart_request(
            "/api/predict",
            None,
            multipart_body("image", "leaf.png", PNG_BYTES),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(stored_file_count(&app).await, 0);
    assert!(app.predictor.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_upstream_failure_is_bad_gateway() {
    let app = spawn_app().await;
    let (token, _) = app.signed_in_user("alice", "a@x.com").await;
    *app.predictor.fail.lock().unwrap() = true;

    let response = app
        .send(multipart_request(
            "/api/predict",
            Some(&token),
            multipart_body("file", "leaf.png", PNG_BYTES),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let (_, body) = app.authed("GET", "/api/history", &token, None).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_token_on_predict_is_rejected() {
    let app = spawn_app().await;

    let response = app
        .send(multipart_request(
            "/api/predict",
            Some("garbage"),
            multipart_body("file", "leaf.png", PNG_BYTES),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(app.predictor.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_history_item_lookup_and_delete() {
    let app = spawn_app().await;
    let (alice, _) = app.signed_in_user("alice", "a@x.com").await;
    let (bob, _) = app.signed_in_user("bob", "b@x.com").await;

    let response = app
        .send(multipart_request(
            "/api/predict",
            Some(&alice),
            multipart_body("file", "leaf.png", PNG_BYTES),
        ))
        .await;
    let (_, body) = into_json(response).await;
    let history_id = body["data"]["historyId"].as_str().unwrap().to_string();
    let uri = format!("/api/history/{history_id}");

    let (status, body) = app.authed("GET", &uri, &alice, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["_id"], history_id.as_str());

    // Another user's record looks missing
    let (status, _) = app.authed("GET", &uri, &bob, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.authed("DELETE", &uri, &bob, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.authed("GET", "/api/history/not-a-uuid", &alice, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid history ID format");

    let (status, _) = app.authed("DELETE", &uri, &alice, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.authed("GET", &uri, &alice, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
