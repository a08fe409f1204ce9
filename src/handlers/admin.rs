//! Authentication endpoints and the (super-admin-only) admins collection.

use axum::extract::{Path, Query};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::api::{success_response, success_with_message, PageQuery, Pagination};
use crate::error::ApiError;
use crate::middleware::AuthAdmin;
use crate::services::admin_service::{AdminFilters, AdminPayload, AdminService};
use crate::services::auth_service::AuthService;

use super::{pool, require_super};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub admin_name: String,
    #[serde(default)]
    pub admin_pass: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
}

/// POST /api/admin/login
pub async fn login(Json(body): Json<LoginRequest>) -> Result<Json<Value>, ApiError> {
    let service = AuthService::new(pool().await?);
    let result = service.login(&body.admin_name, &body.admin_pass).await?;
    Ok(success_response(result))
}

/// POST /api/admin/logout
pub async fn logout(admin: AuthAdmin) -> Result<Json<Value>, ApiError> {
    let service = AuthService::new(pool().await?);
    service.logout(admin.admin_id).await?;
    Ok(success_with_message(Value::Null, "logged out"))
}

/// POST /api/admin/change-password
pub async fn change_password(
    admin: AuthAdmin,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    let service = AuthService::new(pool().await?);
    service
        .change_password(admin.admin_id, &body.old_password, &body.new_password)
        .await?;
    Ok(success_with_message(Value::Null, "password changed"))
}

/// GET /api/admin/profile
pub async fn profile(admin: AuthAdmin) -> Result<Json<Value>, ApiError> {
    let service = AuthService::new(pool().await?);
    let profile = service.get_profile(admin.admin_id).await?;
    Ok(success_response(profile))
}

/// GET /api/admins
pub async fn list_admins(
    admin: AuthAdmin,
    Query(filters): Query<AdminFilters>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    require_super(&admin)?;
    let service = AdminService::new(pool().await?);
    let result = service.list(&filters, Pagination::resolve(&page)).await?;
    Ok(success_response(result))
}

/// POST /api/admins
pub async fn create_admin(
    admin: AuthAdmin,
    Json(payload): Json<AdminPayload>,
) -> Result<Json<Value>, ApiError> {
    require_super(&admin)?;
    let service = AdminService::new(pool().await?);
    let created = service.create(payload, Some(admin.admin_id)).await?;
    Ok(success_with_message(created, "admin created"))
}

/// PUT /api/admins/{id}
pub async fn update_admin(
    admin: AuthAdmin,
    Path(admin_id): Path<i64>,
    Json(payload): Json<AdminPayload>,
) -> Result<Json<Value>, ApiError> {
    require_super(&admin)?;
    let service = AdminService::new(pool().await?);
    let updated = service.update(admin_id, payload, admin.admin_id).await?;
    Ok(success_with_message(updated, "admin updated"))
}

/// DELETE /api/admins/{id}
pub async fn delete_admin(
    admin: AuthAdmin,
    Path(admin_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    require_super(&admin)?;
    let service = AdminService::new(pool().await?);
    service.delete(admin_id, admin.admin_id).await?;
    Ok(success_with_message(Value::Null, "admin deleted"))
}
