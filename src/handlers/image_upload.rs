//! Description-image endpoints: upload, per-entity listing, deletion, and
//! the unused-image cleanup batch.

use axum::extract::{Multipart, Path, Query};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::api::{success_response, success_with_message};
use crate::error::ApiError;
use crate::middleware::AuthAdmin;
use crate::services::image_upload_service::ImageUploadService;

use super::{pool, read_multipart};

#[derive(Debug, Deserialize)]
pub struct CleanupRequest {
    /// Only uploads older than this many hours are removed
    #[serde(default = "default_cleanup_hours")]
    pub older_than_hours: i64,
}

fn default_cleanup_hours() -> i64 {
    24
}

#[derive(Debug, Deserialize)]
pub struct EntityImagesQuery {
    pub field_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MarkUsedRequest {
    pub content: String,
    pub entity_type: String,
    pub entity_id: i64,
    pub field_name: String,
}

/// POST /api/images/upload — multipart body with a `file` part and optional
/// `entity_type`/`entity_id`/`field_name` fields.
pub async fn upload(
    admin: AuthAdmin,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let upload = read_multipart(multipart).await?;

    let entity_type = upload.fields.get("entity_type").cloned();
    let entity_id = upload
        .fields
        .get("entity_id")
        .and_then(|v| v.parse::<i64>().ok());
    let field_name = upload.fields.get("field_name").cloned();

    let service = ImageUploadService::new(pool().await?);
    let image = service
        .upload(
            upload.data,
            &upload.filename,
            entity_type,
            entity_id,
            field_name,
            Some(admin.admin_id),
        )
        .await?;

    Ok(success_with_message(image, "image uploaded"))
}

/// POST /api/images/mark-used
pub async fn mark_used(
    _admin: AuthAdmin,
    Json(body): Json<MarkUsedRequest>,
) -> Result<Json<Value>, ApiError> {
    let service = ImageUploadService::new(pool().await?);
    let marked = service
        .mark_images_used(&body.content, &body.entity_type, body.entity_id, &body.field_name)
        .await?;
    Ok(success_response(serde_json::json!({ "marked_count": marked })))
}

/// POST /api/images/cleanup
pub async fn cleanup(
    admin: AuthAdmin,
    Json(body): Json<CleanupRequest>,
) -> Result<Json<Value>, ApiError> {
    let service = ImageUploadService::new(pool().await?);
    let report = service
        .cleanup_unused(body.older_than_hours, Some(admin.admin_id))
        .await?;
    Ok(success_with_message(report, "cleanup completed"))
}

/// GET /api/images/entity/{entity_type}/{entity_id}
pub async fn entity_images(
    _admin: AuthAdmin,
    Path((entity_type, entity_id)): Path<(String, i64)>,
    Query(query): Query<EntityImagesQuery>,
) -> Result<Json<Value>, ApiError> {
    let service = ImageUploadService::new(pool().await?);
    let images = service
        .entity_images(&entity_type, entity_id, query.field_name.as_deref())
        .await?;
    Ok(success_response(images))
}

/// DELETE /api/images/{id}
pub async fn delete_image(
    admin: AuthAdmin,
    Path(image_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let service = ImageUploadService::new(pool().await?);
    service.delete_image(image_id, Some(admin.admin_id)).await?;
    Ok(success_with_message(Value::Null, "image deleted"))
}
