//! Paper endpoints.

use axum::extract::{Path, Query};
use axum::Json;
use serde_json::Value;

use crate::api::{success_response, success_with_message, PageQuery, Pagination};
use crate::error::ApiError;
use crate::middleware::AuthAdmin;
use crate::services::paper_service::{PaperFilters, PaperPayload, PaperService};

use super::pool;

/// GET /api/papers
pub async fn list_papers(
    Query(filters): Query<PaperFilters>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    let service = PaperService::new(pool().await?);
    let result = service.list(&filters, Pagination::resolve(&page)).await?;
    Ok(success_response(result))
}

/// GET /api/papers/{id}
pub async fn get_paper(Path(paper_id): Path<i64>) -> Result<Json<Value>, ApiError> {
    let service = PaperService::new(pool().await?);
    let paper = service.get(paper_id).await?;
    Ok(success_response(paper))
}

/// POST /api/papers
pub async fn create_paper(
    admin: AuthAdmin,
    Json(payload): Json<PaperPayload>,
) -> Result<Json<Value>, ApiError> {
    let service = PaperService::new(pool().await?);
    let paper = service.create(payload, Some(admin.admin_id)).await?;
    Ok(success_with_message(paper, "paper created"))
}

/// PUT /api/papers/{id}
pub async fn update_paper(
    admin: AuthAdmin,
    Path(paper_id): Path<i64>,
    Json(payload): Json<PaperPayload>,
) -> Result<Json<Value>, ApiError> {
    let service = PaperService::new(pool().await?);
    let paper = service.update(paper_id, payload, Some(admin.admin_id)).await?;
    Ok(success_with_message(paper, "paper updated"))
}

/// DELETE /api/papers/{id}
pub async fn delete_paper(
    admin: AuthAdmin,
    Path(paper_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let service = PaperService::new(pool().await?);
    service.delete(paper_id, Some(admin.admin_id)).await?;
    Ok(success_with_message(Value::Null, "paper deleted"))
}
