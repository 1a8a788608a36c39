use axum::extract::Multipart;

use super::ApiError;
use crate::services::UploadError;

/// A file part pulled out of a multipart body.
pub struct UploadedFile {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// Reads the first part named `field`; other parts are skipped.
pub async fn read_file_field(
    multipart: &mut Multipart,
    field: &str,
) -> Result<UploadedFile, ApiError> {
    while let Some(part) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("Invalid multipart body: {e}")))?
    {
        if part.name() != Some(field) {
            continue;
        }

        let file_name = part.file_name().unwrap_or_default().to_string();
        let data = part
            .bytes()
            .await
            .map_err(|e| ApiError::validation(format!("Failed to read file: {e}")))?;

        return Ok(UploadedFile {
            file_name,
            data: data.to_vec(),
        });
    }

    Err(UploadError::Missing.into())
}
