//! Research group endpoints.

use axum::extract::{Path, Query};
use axum::Json;
use serde_json::Value;

use crate::api::{success_response, success_with_message, PageQuery, Pagination};
use crate::error::ApiError;
use crate::middleware::AuthAdmin;
use crate::services::research_group_service::{GroupFilters, GroupPayload, ResearchGroupService};

use super::pool;

/// GET /api/research-groups
pub async fn list_groups(
    Query(filters): Query<GroupFilters>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    let service = ResearchGroupService::new(pool().await?);
    let result = service.list(&filters, Pagination::resolve(&page)).await?;
    Ok(success_response(result))
}

/// GET /api/research-groups/{id}
pub async fn get_group(Path(group_id): Path<i64>) -> Result<Json<Value>, ApiError> {
    let service = ResearchGroupService::new(pool().await?);
    let group = service.get(group_id).await?;
    Ok(success_response(group))
}

/// POST /api/research-groups
pub async fn create_group(
    admin: AuthAdmin,
    Json(payload): Json<GroupPayload>,
) -> Result<Json<Value>, ApiError> {
    let service = ResearchGroupService::new(pool().await?);
    let group = service.create(payload, Some(admin.admin_id)).await?;
    Ok(success_with_message(group, "research group created"))
}

/// PUT /api/research-groups/{id}
pub async fn update_group(
    admin: AuthAdmin,
    Path(group_id): Path<i64>,
    Json(payload): Json<GroupPayload>,
) -> Result<Json<Value>, ApiError> {
    let service = ResearchGroupService::new(pool().await?);
    let group = service.update(group_id, payload, Some(admin.admin_id)).await?;
    Ok(success_with_message(group, "research group updated"))
}

/// DELETE /api/research-groups/{id}
pub async fn delete_group(
    admin: AuthAdmin,
    Path(group_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let service = ResearchGroupService::new(pool().await?);
    service.delete(group_id, Some(admin.admin_id)).await?;
    Ok(success_with_message(Value::Null, "research group deleted"))
}
