//! Project endpoints.

use axum::extract::{Path, Query};
use axum::Json;
use serde_json::Value;

use crate::api::{success_response, success_with_message, PageQuery, Pagination};
use crate::error::ApiError;
use crate::middleware::AuthAdmin;
use crate::services::project_service::{ProjectFilters, ProjectPayload, ProjectService};

use super::pool;

/// GET /api/projects
pub async fn list_projects(
    Query(filters): Query<ProjectFilters>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    let service = ProjectService::new(pool().await?);
    let result = service.list(&filters, Pagination::resolve(&page)).await?;
    Ok(success_response(result))
}

/// GET /api/projects/{id}
pub async fn get_project(Path(project_id): Path<i64>) -> Result<Json<Value>, ApiError> {
    let service = ProjectService::new(pool().await?);
    let project = service.get(project_id).await?;
    Ok(success_response(project))
}

/// POST /api/projects
pub async fn create_project(
    admin: AuthAdmin,
    Json(payload): Json<ProjectPayload>,
) -> Result<Json<Value>, ApiError> {
    let service = ProjectService::new(pool().await?);
    let project = service.create(payload, Some(admin.admin_id)).await?;
    Ok(success_with_message(project, "project created"))
}

/// PUT /api/projects/{id}
pub async fn update_project(
    admin: AuthAdmin,
    Path(project_id): Path<i64>,
    Json(payload): Json<ProjectPayload>,
) -> Result<Json<Value>, ApiError> {
    let service = ProjectService::new(pool().await?);
    let project = service
        .update(project_id, payload, Some(admin.admin_id))
        .await?;
    Ok(success_with_message(project, "project updated"))
}

/// DELETE /api/projects/{id}
pub async fn delete_project(
    admin: AuthAdmin,
    Path(project_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let service = ProjectService::new(pool().await?);
    service.delete(project_id, Some(admin.admin_id)).await?;
    Ok(success_with_message(Value::Null, "project deleted"))
}
