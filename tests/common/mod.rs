#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use http_body_util::BodyExt;
use kale::config::Config;
use kale::services::{
    CodeGenerator, CodePurpose, ImageUpload, Mailer, OAuthProfile, OAuthProvider,
    PredictionClient, PredictionResult,
};
use kale::state::{Collaborators, SharedState};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const TEST_CODE: &str = "123456";
pub const BOUNDARY: &str = "kale-test-boundary";

pub struct FixedCodeGenerator(pub &'static str);

impl CodeGenerator for FixedCodeGenerator {
    fn generate(&self) -> String {
        self.0.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub code: String,
    pub purpose: CodePurpose,
}

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<SentMail>>,
    pub fail: Mutex<bool>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_code(&self, to: &str, code: &str, purpose: CodePurpose) -> anyhow::Result<()> {
        if *self.fail.lock().unwrap() {
            anyhow::bail!("mail provider returned 503");
        }
        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            code: code.to_string(),
            purpose,
        });
        Ok(())
    }
}

#[derive(Default)]
pub struct StubPredictionClient {
    pub calls: Mutex<Vec<String>>,
    pub fail: Mutex<bool>,
}

#[async_trait]
impl PredictionClient for StubPredictionClient {
    async fn predict(&self, image: &ImageUpload) -> anyhow::Result<PredictionResult> {
        self.calls.lock().unwrap().push(image.original_name.clone());
        if *self.fail.lock().unwrap() {
            anyhow::bail!("prediction server returned 500");
        }
        Ok(PredictionResult {
            percentage_weight_lose: 12.5,
            features: serde_json::json!({ "moisture": 0.4 }),
        })
    }
}

pub struct StubOAuthProvider {
    pub profile: OAuthProfile,
}

#[async_trait]
impl OAuthProvider for StubOAuthProvider {
    fn authorize_url(&self, state: &str) -> anyhow::Result<String> {
        Ok(format!("https://accounts.example.com/auth?state={state}"))
    }

    async fn exchange_code(&self, code: &str) -> anyhow::Result<OAuthProfile> {
        if code == "bad" {
            anyhow::bail!("invalid_grant");
        }
        Ok(self.profile.clone())
    }
}

pub struct TestApp {
    pub router: Router,
    pub shared: Arc<SharedState>,
    pub mailer: Arc<RecordingMailer>,
    pub predictor: Arc<StubPredictionClient>,
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    config.server.public_url = "http://kale.test".to_string();
    config.server.frontend_url = "http://frontend.test".to_string();
    config.security.jwt_secret = "integration-test-secret".to_string();
    config.sweeper.enabled = false;
    config
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config(), None).await
}

pub async fn spawn_app_with(config: Config, oauth: Option<Arc<dyn OAuthProvider>>) -> TestApp {
    let mailer = Arc::new(RecordingMailer::default());
    let predictor = Arc::new(StubPredictionClient::default());

    let collaborators = Collaborators {
        mailer: Some(mailer.clone()),
        codes: Some(Arc::new(FixedCodeGenerator(TEST_CODE))),
        predictor: Some(predictor.clone()),
        oauth,
    };

    let shared = Arc::new(
        SharedState::with_collaborators(config, collaborators)
            .await
            .expect("Failed to create shared state"),
    );
    let state = kale::api::create_app_state(shared.clone(), None).await;
    let router = kale::api::router(state).await;

    TestApp {
        router,
        shared,
        mailer,
        predictor,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn post_json(
        &self,
        uri: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let response = self
            .send(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await;
        into_json(response).await
    }

    pub async fn authed(
        &self,
        method: &str,
        uri: &str,
        token: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"));

        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref());
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        into_json(self.send(builder.body(body).unwrap()).await).await
    }

    /// Registers, verifies and logs in; returns the token and the user id.
    pub async fn signed_in_user(&self, username: &str, email: &str) -> (String, String) {
        let (status, _) = self
            .post_json(
                "/api/auth/register",
                serde_json::json!({ "username": username, "email": email, "password": "hunter2hunter2" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = self
            .post_json(
                "/api/auth/verify-email",
                serde_json::json!({ "email": email, "verificationCode": TEST_CODE }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = self
            .post_json(
                "/api/auth/login",
                serde_json::json!({ "identity": username, "password": "hunter2hunter2" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        (
            body["data"]["token"].as_str().unwrap().to_string(),
            body["data"]["user"]["user_id"].as_str().unwrap().to_string(),
        )
    }
}

pub async fn into_json(response: Response<Body>) -> (StatusCode, serde_json::Value) {
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

pub fn multipart_body(field: &str, file_name: &str, data: &[u8]) -> Body {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    Body::from(body)
}

pub fn multipart_request(uri: &str, token: Option<&str>, body: Body) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(body).unwrap()
}
