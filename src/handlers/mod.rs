//! HTTP route handlers: parse input, resolve the acting admin, delegate to
//! the services, and translate service errors into the response envelope.

pub mod admin;
pub mod edit_record;
pub mod image_upload;
pub mod lab;
pub mod media;
pub mod member;
pub mod news;
pub mod paper;
pub mod project;
pub mod research_group;
pub mod resource;

use axum::extract::multipart::Multipart;
use sqlx::PgPool;

use crate::database::manager::DatabaseManager;
use crate::error::ApiError;
use crate::middleware::AuthAdmin;

/// Shared pool accessor for handlers.
pub async fn pool() -> Result<PgPool, ApiError> {
    Ok(DatabaseManager::pool().await?)
}

/// Route-level role check for the admins collection.
pub fn require_super(admin: &AuthAdmin) -> Result<(), ApiError> {
    if admin.is_super() {
        Ok(())
    } else {
        Err(ApiError::forbidden("super admin privileges required"))
    }
}

/// One file plus the text fields that accompanied it in a multipart form.
pub struct MultipartUpload {
    pub filename: String,
    pub data: Vec<u8>,
    pub fields: std::collections::HashMap<String, String>,
}

/// Drain a multipart request, keeping the first file part and collecting the
/// remaining parts as text fields.
pub async fn read_multipart(mut multipart: Multipart) -> Result<MultipartUpload, ApiError> {
    let mut filename = None;
    let mut data = None;
    let mut fields = std::collections::HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        if field.file_name().is_some() && data.is_none() {
            filename = field.file_name().map(String::from);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("failed to read upload: {}", e)))?;
            data = Some(bytes.to_vec());
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| ApiError::bad_request(format!("failed to read field: {}", e)))?;
            fields.insert(name, text);
        }
    }

    match (filename, data) {
        (Some(filename), Some(data)) => Ok(MultipartUpload {
            filename,
            data,
            fields,
        }),
        _ => Err(ApiError::bad_request("no file provided")),
    }
}
