use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::entities::prediction_history;

/// Response envelope shared by every JSON endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            status: "success",
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: message.into(),
            data: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: "success",
            message: message.into(),
            data: None,
        }
    }
}

/// History record in the shape the frontend reads.
#[derive(Debug, Serialize)]
pub struct HistoryDto {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(rename = "UserID")]
    pub user_id: Uuid,
    #[serde(rename = "FileName")]
    pub file_name: String,
    #[serde(rename = "Percentage")]
    pub percentage: f64,
    #[serde(rename = "ImageUrl")]
    pub image_url: String,
    #[serde(rename = "Features")]
    pub features: serde_json::Value,
    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl From<prediction_history::Model> for HistoryDto {
    fn from(entry: prediction_history::Model) -> Self {
        Self {
            id: entry.id,
            user_id: entry.user_id,
            file_name: entry.file_name,
            percentage: entry.percentage_weight_lose,
            image_url: entry.image_url,
            features: entry.features,
            timestamp: entry.created_at,
        }
    }
}
