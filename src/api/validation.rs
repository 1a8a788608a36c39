use uuid::Uuid;

use super::ApiError;
pub use crate::services::auth_service::{MAX_USERNAME_LEN, is_email};

pub fn validate_email(email: &str) -> Result<String, ApiError> {
    let email = email.trim();
    if !is_email(email) {
        return Err(ApiError::validation("Invalid email address"));
    }
    Ok(email.to_string())
}

pub fn validate_username(username: &str) -> Result<String, ApiError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(ApiError::validation("Username is required"));
    }

    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(ApiError::validation(format!(
            "Username must be {MAX_USERNAME_LEN} characters or less"
        )));
    }

    if username.chars().any(char::is_control) {
        return Err(ApiError::validation(
            "Username contains invalid characters",
        ));
    }

    Ok(username.to_string())
}

pub fn validate_password(password: &str, min_len: usize) -> Result<&str, ApiError> {
    if password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    if password.chars().count() < min_len {
        return Err(ApiError::validation(format!(
            "Password must be at least {min_len} characters"
        )));
    }

    Ok(password)
}

pub fn validate_code(code: &str) -> Result<&str, ApiError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(ApiError::validation("Verification code is required"));
    }
    Ok(code)
}

pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::validation(format!("Invalid {what} ID format")))
}
