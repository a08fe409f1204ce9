//! Member endpoints, including the batch operations.

use axum::extract::{Path, Query};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::api::{success_response, success_with_message, PageQuery, Pagination};
use crate::error::ApiError;
use crate::middleware::AuthAdmin;
use crate::services::member_service::{
    BatchUpdateFields, MemberFilters, MemberPayload, MemberService,
};

use super::pool;

#[derive(Debug, Deserialize)]
pub struct BatchDeleteRequest {
    pub member_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct BatchUpdateRequest {
    pub member_ids: Vec<i64>,
    pub updates: BatchUpdateFields,
}

/// GET /api/members
pub async fn list_members(
    Query(filters): Query<MemberFilters>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    let service = MemberService::new(pool().await?);
    let result = service.list(&filters, Pagination::resolve(&page)).await?;
    Ok(success_response(result))
}

/// GET /api/members/{id}
pub async fn get_member(Path(mem_id): Path<i64>) -> Result<Json<Value>, ApiError> {
    let service = MemberService::new(pool().await?);
    let member = service.get(mem_id).await?;
    Ok(success_response(member))
}

/// POST /api/members
pub async fn create_member(
    admin: AuthAdmin,
    Json(payload): Json<MemberPayload>,
) -> Result<Json<Value>, ApiError> {
    let service = MemberService::new(pool().await?);
    let member = service.create(payload, Some(admin.admin_id)).await?;
    Ok(success_with_message(member, "member created"))
}

/// PUT /api/members/{id}
pub async fn update_member(
    admin: AuthAdmin,
    Path(mem_id): Path<i64>,
    Json(payload): Json<MemberPayload>,
) -> Result<Json<Value>, ApiError> {
    let service = MemberService::new(pool().await?);
    let member = service.update(mem_id, payload, Some(admin.admin_id)).await?;
    Ok(success_with_message(member, "member updated"))
}

/// DELETE /api/members/{id}
pub async fn delete_member(
    admin: AuthAdmin,
    Path(mem_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let service = MemberService::new(pool().await?);
    service.delete(mem_id, Some(admin.admin_id)).await?;
    Ok(success_with_message(Value::Null, "member deleted"))
}

/// DELETE /api/members/batch
pub async fn batch_delete_members(
    admin: AuthAdmin,
    Json(body): Json<BatchDeleteRequest>,
) -> Result<Json<Value>, ApiError> {
    let service = MemberService::new(pool().await?);
    let report = service
        .batch_delete(body.member_ids, Some(admin.admin_id))
        .await?;
    Ok(success_with_message(report, "batch delete completed"))
}

/// PUT /api/members/batch
pub async fn batch_update_members(
    admin: AuthAdmin,
    Json(body): Json<BatchUpdateRequest>,
) -> Result<Json<Value>, ApiError> {
    let service = MemberService::new(pool().await?);
    let report = service
        .batch_update(body.member_ids, body.updates, Some(admin.admin_id))
        .await?;
    Ok(success_with_message(report, "batch update completed"))
}
