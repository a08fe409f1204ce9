//! Business-rule layer. Every domain service validates input, enforces
//! referential integrity, and funnels its mutations through
//! [`execute_with_audit`] so the change and its audit record commit or roll
//! back together.

use futures::future::BoxFuture;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;

pub mod admin_service;
pub mod audit_service;
pub mod auth_service;
pub mod image_upload_service;
pub mod lab_service;
pub mod media_service;
pub mod member_service;
pub mod news_service;
pub mod paper_service;
pub mod project_service;
pub mod research_group_service;
pub mod resource_service;
pub mod validate;

pub use audit_service::{AuditService, Module, OperationType};

/// Service-layer error taxonomy. The route layer maps each kind to a fixed
/// HTTP status and business code (see `crate::error`).
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed or out-of-range input (400 / 2000)
    #[error("{0}")]
    Validation(String),

    /// Referenced entity missing or soft-deleted (404 / 3000)
    #[error("{0}")]
    NotFound(String),

    /// Missing or invalid credentials (401 / 1000)
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but role-insufficient (403 / 1001)
    #[error("{0}")]
    Permission(String),

    /// Operation blocked by a referential-integrity rule (409 / 4000)
    #[error("{0}")]
    Conflict(String),

    /// Unexpected failure; message is logged, never sent to clients (500 / 5000)
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ServiceError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ServiceError::NotFound(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        ServiceError::Unauthorized(msg.into())
    }

    pub fn permission(msg: impl Into<String>) -> Self {
        ServiceError::Permission(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ServiceError::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ServiceError::Internal(msg.into())
    }

    /// Business error code grouped by category: 1000s auth, 2000s validation,
    /// 3000s not-found, 4000s conflict, 5000s internal.
    pub fn business_code(&self) -> i32 {
        match self {
            ServiceError::Validation(_) => 2000,
            ServiceError::NotFound(_) => 3000,
            ServiceError::Unauthorized(_) => 1000,
            ServiceError::Permission(_) => 1001,
            ServiceError::Conflict(_) => 4000,
            ServiceError::Internal(_) => 5000,
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ServiceError::NotFound("record not found".to_string()),
            other => {
                tracing::error!("database error: {}", other);
                ServiceError::Internal(other.to_string())
            }
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Runs `mutation` and the matching audit-record insert inside one
/// transaction. Exactly one audit row is committed per successful call;
/// any failure in the mutation, the audit insert, or the commit rolls the
/// whole transaction back and no partial state survives.
///
/// `actor_id` is the authenticated admin performing the change, or `None`
/// for system-initiated operations.
pub async fn execute_with_audit<T, F>(
    pool: &PgPool,
    module: Module,
    operation: OperationType,
    content: serde_json::Value,
    actor_id: Option<i64>,
    mutation: F,
) -> ServiceResult<T>
where
    F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, ServiceResult<T>>,
{
    let mut tx = pool.begin().await?;

    let result = match mutation(&mut tx).await {
        Ok(value) => value,
        Err(err) => {
            tx.rollback().await.ok();
            return Err(err);
        }
    };

    if let Err(err) = audit_service::insert_record(&mut tx, actor_id, operation, module, &content).await
    {
        tx.rollback().await.ok();
        return Err(err);
    }

    tx.commit().await?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_codes_follow_category_grouping() {
        assert_eq!(ServiceError::validation("x").business_code(), 2000);
        assert_eq!(ServiceError::not_found("x").business_code(), 3000);
        assert_eq!(ServiceError::unauthorized("x").business_code(), 1000);
        assert_eq!(ServiceError::permission("x").business_code(), 1001);
        assert_eq!(ServiceError::conflict("x").business_code(), 4000);
        assert_eq!(ServiceError::internal("x").business_code(), 5000);
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err: ServiceError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
