use std::path::Path;
use thiserror::Error;

use crate::config::UploadConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("No file uploaded")]
    Missing,

    #[error("File is empty")]
    Empty,

    #[error("File too large. Maximum size is {max_mb}MB")]
    TooLarge { max_mb: usize },

    #[error("Invalid file type. Allowed types: {allowed}")]
    InvalidType { allowed: String },
}

/// An accepted image upload, still only in memory.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub original_name: String,
    pub extension: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Checks size and extension before anything is persisted.
pub fn validate_image(
    file_name: &str,
    data: Vec<u8>,
    config: &UploadConfig,
) -> Result<ImageUpload, UploadError> {
    if data.is_empty() {
        return Err(UploadError::Empty);
    }

    if data.len() > config.max_file_bytes {
        return Err(UploadError::TooLarge {
            max_mb: config.max_file_bytes / (1024 * 1024),
        });
    }

    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|ext| config.allowed_extensions.iter().any(|a| a == ext))
        .ok_or_else(|| UploadError::InvalidType {
            allowed: config
                .allowed_extensions
                .iter()
                .map(|ext| format!(".{ext}"))
                .collect::<Vec<_>>()
                .join(", "),
        })?;

    let content_type = mime_guess::from_ext(&extension)
        .first_or_octet_stream()
        .essence_str()
        .to_string();

    Ok(ImageUpload {
        original_name: file_name.to_string(),
        extension,
        content_type,
        data,
    })
}
