//! News endpoints.

use axum::extract::{Path, Query};
use axum::Json;
use serde_json::Value;

use crate::api::{success_response, success_with_message, PageQuery, Pagination};
use crate::error::ApiError;
use crate::middleware::AuthAdmin;
use crate::services::news_service::{NewsFilters, NewsPayload, NewsService};

use super::pool;

/// GET /api/news
pub async fn list_news(
    Query(filters): Query<NewsFilters>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    let service = NewsService::new(pool().await?);
    let result = service.list(&filters, Pagination::resolve(&page)).await?;
    Ok(success_response(result))
}

/// GET /api/news/{id}
pub async fn get_news(Path(news_id): Path<i64>) -> Result<Json<Value>, ApiError> {
    let service = NewsService::new(pool().await?);
    let news = service.get(news_id).await?;
    Ok(success_response(news))
}

/// POST /api/news
pub async fn create_news(
    admin: AuthAdmin,
    Json(payload): Json<NewsPayload>,
) -> Result<Json<Value>, ApiError> {
    let service = NewsService::new(pool().await?);
    let news = service.create(payload, Some(admin.admin_id)).await?;
    Ok(success_with_message(news, "news created"))
}

/// PUT /api/news/{id}
pub async fn update_news(
    admin: AuthAdmin,
    Path(news_id): Path<i64>,
    Json(payload): Json<NewsPayload>,
) -> Result<Json<Value>, ApiError> {
    let service = NewsService::new(pool().await?);
    let news = service.update(news_id, payload, Some(admin.admin_id)).await?;
    Ok(success_with_message(news, "news updated"))
}

/// DELETE /api/news/{id}
pub async fn delete_news(
    admin: AuthAdmin,
    Path(news_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let service = NewsService::new(pool().await?);
    service.delete(news_id, Some(admin.admin_id)).await?;
    Ok(success_with_message(Value::Null, "news deleted"))
}
