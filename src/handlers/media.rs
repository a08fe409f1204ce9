//! Media upload and serving endpoints.

use axum::extract::{Multipart, Path, Query};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::api::{success_response, success_with_message};
use crate::error::ApiError;
use crate::middleware::AuthAdmin;
use crate::services::media_service::MediaService;

use super::{pool, read_multipart};

#[derive(Debug, Deserialize)]
pub struct MediaInfoQuery {
    pub path: String,
}

/// POST /api/media/upload — multipart body with a `file` part and an
/// optional `type` field (lab_logo, member_avatar, paper, other).
pub async fn upload(
    admin: AuthAdmin,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let upload = read_multipart(multipart).await?;
    let file_type = upload
        .fields
        .get("type")
        .cloned()
        .unwrap_or_else(|| "other".to_string());

    let service = MediaService::new(pool().await?);
    let result = service
        .upload(upload.data, &upload.filename, &file_type, Some(admin.admin_id))
        .await?;

    Ok(success_with_message(result, "file uploaded"))
}

/// GET /api/media/serve/{*path} — stream a stored file back to the client.
pub async fn serve(Path(path): Path<String>) -> Result<Response, ApiError> {
    let media_path = format!("/{}", path);
    let service = MediaService::new(pool().await?);
    let (full_path, mime_type) = service.serve(&media_path).await?;

    let bytes = tokio::fs::read(&full_path)
        .await
        .map_err(|_| ApiError::not_found("file not found"))?;

    Ok(([(header::CONTENT_TYPE, mime_type)], bytes).into_response())
}

/// GET /api/media/info?path=/media/...
pub async fn info(Query(query): Query<MediaInfoQuery>) -> Result<Json<Value>, ApiError> {
    let service = MediaService::new(pool().await?);
    let info = service.info(&query.path).await?;
    Ok(success_response(info))
}

/// GET /api/media/health
pub async fn health(_admin: AuthAdmin) -> Result<Json<Value>, ApiError> {
    let service = MediaService::new(pool().await?);
    let health = service.health_check().await?;
    Ok(success_response(health))
}
