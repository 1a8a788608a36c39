use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use super::ApiResponse;
use crate::services::{
    AuthError, PredictionError, ProfileError, TokenError, UploadError, VerificationError,
};

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),

    DatabaseError(String),

    ExternalApiError { service: String, message: String },

    ValidationError(String),

    Conflict(String),

    InternalError(String),

    Unauthorized(String),

    Forbidden(String),

    TooManyRequests(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(msg) => write!(f, "Not found: {msg}"),
            Self::DatabaseError(msg) => write!(f, "Database error: {msg}"),
            Self::ExternalApiError { service, message } => {
                write!(f, "{service} error: {message}")
            }
            Self::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            Self::Conflict(msg) => write!(f, "Conflict: {msg}"),
            Self::InternalError(msg) => write!(f, "Internal error: {msg}"),
            Self::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            Self::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
            Self::TooManyRequests(msg) => write!(f, "Too many requests: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                )
            }
            Self::ExternalApiError { service, message } => {
                tracing::warn!("{} API error: {}", service, message);
                (
                    StatusCode::BAD_GATEWAY,
                    format!("{service} service is unavailable"),
                )
            }
            Self::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::TooManyRequests(msg) => (StatusCode::TOO_MANY_REQUESTS, msg.clone()),
        };

        let body = ApiResponse::<()>::error(error_message);
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(err.to_string())
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        Self::ValidationError(err.to_string())
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::InvalidSignature | TokenError::Malformed(_) => {
                Self::Unauthorized("Invalid token".to_string())
            }
            TokenError::Expired => Self::Unauthorized("Token has expired".to_string()),
            TokenError::Revoked => Self::Unauthorized("Token has been revoked".to_string()),
            TokenError::Store(msg) => Self::DatabaseError(msg),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Self::Unauthorized(err.to_string()),
            AuthError::UserNotFound => Self::NotFound(err.to_string()),
            AuthError::UsernameTaken | AuthError::EmailTaken => Self::Conflict(err.to_string()),
            AuthError::Validation(msg) => Self::ValidationError(msg),
            AuthError::Token(e) => e.into(),
            AuthError::Mail(msg) => Self::mail_error(msg),
            AuthError::Database(msg) => Self::DatabaseError(msg),
            AuthError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

impl From<VerificationError> for ApiError {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::UserNotFound => Self::NotFound(err.to_string()),
            VerificationError::AlreadyVerified | VerificationError::CodeExpired => {
                Self::ValidationError(err.to_string())
            }
            VerificationError::EmailNotVerified => Self::Forbidden(err.to_string()),
            VerificationError::Cooldown => Self::TooManyRequests(err.to_string()),
            VerificationError::InvalidCode | VerificationError::NoVerifiedReset => {
                Self::Unauthorized(err.to_string())
            }
            VerificationError::Mail(msg) => Self::mail_error(msg),
            VerificationError::Database(msg) => Self::DatabaseError(msg),
        }
    }
}

impl From<ProfileError> for ApiError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::Forbidden => Self::Forbidden(err.to_string()),
            ProfileError::UserNotFound | ProfileError::FileNotFound => {
                Self::NotFound(err.to_string())
            }
            ProfileError::UsernameTaken => Self::Conflict(err.to_string()),
            ProfileError::Upload(e) => e.into(),
            ProfileError::Database(msg) => Self::DatabaseError(msg),
        }
    }
}

impl From<PredictionError> for ApiError {
    fn from(err: PredictionError) -> Self {
        match err {
            PredictionError::Upload(e) => e.into(),
            PredictionError::Upstream(message) => Self::ExternalApiError {
                service: "Prediction".to_string(),
                message,
            },
            PredictionError::Persistence(msg) => {
                tracing::error!("History insert failed: {}", msg);
                Self::InternalError("Failed to save prediction history".to_string())
            }
            PredictionError::Database(msg) => Self::DatabaseError(msg),
        }
    }
}

impl ApiError {
    pub fn mail_error(msg: impl Into<String>) -> Self {
        Self::ExternalApiError {
            service: "Mail".to_string(),
            message: msg.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }
}
