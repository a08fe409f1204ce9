//! Audit trail endpoints (read-only, admin only).

use axum::extract::{Path, Query};
use axum::Json;
use serde_json::Value;

use crate::api::{success_response, PageQuery, Pagination};
use crate::error::ApiError;
use crate::middleware::AuthAdmin;
use crate::services::audit_service::{AuditFilters, AuditService};

use super::pool;

/// GET /api/edit-records
pub async fn list_records(
    _admin: AuthAdmin,
    Query(filters): Query<AuditFilters>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    let service = AuditService::new(pool().await?);
    let result = service.records(&filters, Pagination::resolve(&page)).await?;
    Ok(success_response(result))
}

/// GET /api/edit-records/{id}
pub async fn get_record(
    _admin: AuthAdmin,
    Path(edit_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let service = AuditService::new(pool().await?);
    let record = service.record(edit_id).await?;
    Ok(success_response(record))
}
