//! Lab resource endpoints.

use axum::extract::{Path, Query};
use axum::Json;
use serde_json::Value;

use crate::api::{success_response, success_with_message, PageQuery, Pagination};
use crate::error::ApiError;
use crate::middleware::AuthAdmin;
use crate::services::resource_service::{ResourceFilters, ResourcePayload, ResourceService};

use super::pool;

/// GET /api/resources
pub async fn list_resources(
    Query(filters): Query<ResourceFilters>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    let service = ResourceService::new(pool().await?);
    let result = service.list(&filters, Pagination::resolve(&page)).await?;
    Ok(success_response(result))
}

/// GET /api/resources/{id}
pub async fn get_resource(Path(resource_id): Path<i64>) -> Result<Json<Value>, ApiError> {
    let service = ResourceService::new(pool().await?);
    let resource = service.get(resource_id).await?;
    Ok(success_response(resource))
}

/// POST /api/resources
pub async fn create_resource(
    admin: AuthAdmin,
    Json(payload): Json<ResourcePayload>,
) -> Result<Json<Value>, ApiError> {
    let service = ResourceService::new(pool().await?);
    let resource = service.create(payload, Some(admin.admin_id)).await?;
    Ok(success_with_message(resource, "resource created"))
}

/// PUT /api/resources/{id}
pub async fn update_resource(
    admin: AuthAdmin,
    Path(resource_id): Path<i64>,
    Json(payload): Json<ResourcePayload>,
) -> Result<Json<Value>, ApiError> {
    let service = ResourceService::new(pool().await?);
    let resource = service
        .update(resource_id, payload, Some(admin.admin_id))
        .await?;
    Ok(success_with_message(resource, "resource updated"))
}

/// DELETE /api/resources/{id}
pub async fn delete_resource(
    admin: AuthAdmin,
    Path(resource_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let service = ResourceService::new(pool().await?);
    service.delete(resource_id, Some(admin.admin_id)).await?;
    Ok(success_with_message(Value::Null, "resource deleted"))
}
