//! One-time code endpoints: email verification and password reset.

use axum::{Json, extract::State};
use serde::Deserialize;
use std::sync::Arc;

use super::validation::{validate_code, validate_email, validate_password};
use super::{ApiError, ApiResponse, AppState};

#[derive(Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeRequest {
    pub email: String,
    pub verification_code: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: String,
    pub new_password: String,
}

type MessageResult = Result<Json<ApiResponse<()>>, ApiError>;

/// POST /auth/verify-email
pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CodeRequest>,
) -> MessageResult {
    let email = validate_email(&payload.email)?;
    let code = validate_code(&payload.verification_code)?;

    state.verification_service().verify_email(&email, code).await?;

    Ok(Json(ApiResponse::message("Email verified successfully")))
}

/// POST /auth/resend-otp
pub async fn resend_verification(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EmailRequest>,
) -> MessageResult {
    let email = validate_email(&payload.email)?;

    state
        .verification_service()
        .resend_verification(&email)
        .await?;

    Ok(Json(ApiResponse::message(
        "Verification email resent successfully",
    )))
}

/// POST /auth/forgot-password
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EmailRequest>,
) -> MessageResult {
    let email = validate_email(&payload.email)?;

    state
        .verification_service()
        .request_password_reset(&email)
        .await?;

    Ok(Json(ApiResponse::message(
        "Password reset OTP sent. Please check your email.",
    )))
}

/// POST /auth/verify-reset-otp
pub async fn verify_reset_code(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CodeRequest>,
) -> MessageResult {
    let email = validate_email(&payload.email)?;
    let code = validate_code(&payload.verification_code)?;

    state
        .verification_service()
        .verify_reset_code(&email, code)
        .await?;

    Ok(Json(ApiResponse::message(
        "OTP verified successfully. You can now reset your password.",
    )))
}

/// POST /auth/resend-reset-otp
pub async fn resend_reset_code(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EmailRequest>,
) -> MessageResult {
    let email = validate_email(&payload.email)?;

    state
        .verification_service()
        .resend_reset_code(&email)
        .await?;

    Ok(Json(ApiResponse::message(
        "A new OTP has been sent to your email.",
    )))
}

/// POST /auth/reset-password
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ResetPasswordRequest>,
) -> MessageResult {
    let email = validate_email(&payload.email)?;
    let min_password = state.config().read().await.security.min_password_length;
    validate_password(&payload.new_password, min_password)?;

    state
        .verification_service()
        .reset_password(&email, &payload.new_password)
        .await?;

    Ok(Json(ApiResponse::message("Password reset successfully")))
}
