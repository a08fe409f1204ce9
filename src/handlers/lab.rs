//! Lab profile endpoints.

use axum::Json;
use serde_json::Value;

use crate::api::{success_response, success_with_message};
use crate::error::ApiError;
use crate::middleware::AuthAdmin;
use crate::services::lab_service::{LabPayload, LabService};

use super::pool;

/// GET /api/lab
pub async fn get_lab() -> Result<Json<Value>, ApiError> {
    let service = LabService::new(pool().await?);
    let info = service.get_info().await?;
    Ok(success_response(info))
}

/// PUT /api/lab
pub async fn update_lab(
    admin: AuthAdmin,
    Json(payload): Json<LabPayload>,
) -> Result<Json<Value>, ApiError> {
    let service = LabService::new(pool().await?);
    let lab = service.update_info(payload, Some(admin.admin_id)).await?;
    Ok(success_with_message(lab, "lab updated"))
}

/// DELETE /api/lab
pub async fn delete_lab(admin: AuthAdmin) -> Result<Json<Value>, ApiError> {
    let service = LabService::new(pool().await?);
    service.delete(Some(admin.admin_id)).await?;
    Ok(success_with_message(Value::Null, "lab deleted"))
}
