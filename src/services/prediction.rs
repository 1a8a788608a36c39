//! Forwards uploaded images to the prediction service and records the result.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, multipart};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{PredictionConfig, UploadConfig};
use crate::db::{FileKind, NewFile, NewHistoryEntry, Store};
use crate::services::uploads::{ImageUpload, UploadError, validate_image};

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("Prediction service error: {0}")]
    Upstream(String),

    #[error("Failed to save history: {0}")]
    Persistence(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for PredictionError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// What the prediction service returns under `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub percentage_weight_lose: f64,
    #[serde(default = "empty_object")]
    pub features: serde_json::Value,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

#[derive(Debug, Deserialize)]
struct PredictionEnvelope {
    data: PredictionResult,
}

#[async_trait]
pub trait PredictionClient: Send + Sync {
    async fn predict(&self, image: &ImageUpload) -> Result<PredictionResult>;
}

pub struct HttpPredictionClient {
    client: Client,
    config: PredictionConfig,
}

impl HttpPredictionClient {
    #[must_use]
    pub const fn new(client: Client, config: PredictionConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl PredictionClient for HttpPredictionClient {
    async fn predict(&self, image: &ImageUpload) -> Result<PredictionResult> {
        let part = multipart::Part::bytes(image.data.clone())
            .file_name(image.original_name.clone())
            .mime_str(&image.content_type)
            .context("Invalid image content type")?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&self.config.url)
            .timeout(Duration::from_secs(self.config.timeout_seconds))
            .multipart(form)
            .send()
            .await
            .context("Failed to connect to prediction server")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("status={status}, body={body}");
        }

        let envelope: PredictionEnvelope = response
            .json()
            .await
            .context("Failed to parse prediction response")?;

        Ok(envelope.data)
    }
}

/// Result of one successful prediction.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionOutcome {
    pub percentage_weight_lose: f64,
    pub features: serde_json::Value,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
    #[serde(rename = "historyId", skip_serializing_if = "Option::is_none")]
    pub history_id: Option<Uuid>,
}

/// Runs `op` up to `attempts` times, sleeping `step * attempt` after each failure.
pub async fn with_linear_backoff<T, F, Fut>(attempts: u32, step: Duration, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                warn!(attempt, error = %e, "Attempt failed, retrying");
                tokio::time::sleep(step * attempt).await;
                attempt += 1;
            }
            Err(e) => return Err(e.context(format!("gave up after {attempts} attempts"))),
        }
    }
}

pub struct PredictionService {
    store: Store,
    client: Arc<dyn PredictionClient>,
    config: PredictionConfig,
    uploads: UploadConfig,
    public_url: String,
}

impl PredictionService {
    #[must_use]
    pub fn new(
        store: Store,
        client: Arc<dyn PredictionClient>,
        config: PredictionConfig,
        uploads: UploadConfig,
        public_url: String,
    ) -> Self {
        Self {
            store,
            client,
            config,
            uploads,
            public_url,
        }
    }

    #[must_use]
    pub fn image_url(&self, id: Uuid) -> String {
        format!("{}/api/image/{id}", self.public_url.trim_end_matches('/'))
    }

    /// Validates, stores and forwards the image; records history for signed-in users.
    pub async fn predict(
        &self,
        user_id: Option<Uuid>,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<PredictionOutcome, PredictionError> {
        let image = validate_image(file_name, data, &self.uploads)?;

        let stored = self
            .store
            .file_repo()
            .store(NewFile {
                original_name: image.original_name.clone(),
                extension: image.extension.clone(),
                content_type: image.content_type.clone(),
                kind: FileKind::PredictionImage,
                owner_id: user_id,
                data: image.data.clone(),
            })
            .await?;
        let image_url = self.image_url(stored.id);

        let result = self.client.predict(&image).await.map_err(|e| {
            warn!(event = "prediction_failed", error = %e, "Prediction service call failed");
            PredictionError::Upstream(e.to_string())
        })?;

        let history_id = match user_id {
            Some(user_id) => {
                let entry = NewHistoryEntry {
                    user_id,
                    file_name: image.original_name.clone(),
                    percentage_weight_lose: result.percentage_weight_lose,
                    image_id: stored.id,
                    image_url: image_url.clone(),
                    features: result.features.clone(),
                    created_at: Utc::now(),
                };

                let saved = with_linear_backoff(
                    self.config.history_insert_attempts,
                    Duration::from_millis(self.config.history_backoff_ms),
                    |_| {
                        let repo = self.store.history_repo();
                        let entry = entry.clone();
                        async move { repo.insert(entry).await }
                    },
                )
                .await
                .map_err(|e| PredictionError::Persistence(format!("{e:#}")))?;

                info!(event = "prediction_recorded", user_id = %user_id, history_id = %saved.id, "Prediction saved to history");
                Some(saved.id)
            }
            None => None,
        };

        Ok(PredictionOutcome {
            percentage_weight_lose: result.percentage_weight_lose,
            features: result.features,
            image_url,
            history_id,
        })
    }
}
