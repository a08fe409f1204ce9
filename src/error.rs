// HTTP API error type: maps the service-layer error taxonomy onto status
// codes and the uniform response envelope.
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::services::ServiceError;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: i32,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: i32, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, 1000, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, 1001, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, 2000, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, 3000, message)
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, 5000, "internal server error")
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn business_code(&self) -> i32 {
        self.code
    }

    pub fn to_json(&self) -> Value {
        json!({
            "code": self.code,
            "message": self.message,
            "data": Value::Null,
        })
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let code = err.business_code();
        match err {
            ServiceError::Validation(msg) => Self::new(StatusCode::BAD_REQUEST, code, msg),
            ServiceError::NotFound(msg) => Self::new(StatusCode::NOT_FOUND, code, msg),
            ServiceError::Unauthorized(msg) => Self::new(StatusCode::UNAUTHORIZED, code, msg),
            ServiceError::Permission(msg) => Self::new(StatusCode::FORBIDDEN, code, msg),
            ServiceError::Conflict(msg) => Self::new(StatusCode::CONFLICT, code, msg),
            ServiceError::Internal(msg) => {
                // Log the real cause but never leak it to clients
                tracing::error!("internal service error: {}", msg);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, code, "internal server error")
            }
        }
    }
}

impl From<crate::database::manager::DatabaseError> for ApiError {
    fn from(err: crate::database::manager::DatabaseError) -> Self {
        tracing::error!("database manager error: {}", err);
        Self::internal()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_kinds_map_to_fixed_statuses() {
        let cases = [
            (ServiceError::validation("bad"), StatusCode::BAD_REQUEST, 2000),
            (ServiceError::not_found("missing"), StatusCode::NOT_FOUND, 3000),
            (ServiceError::unauthorized("no token"), StatusCode::UNAUTHORIZED, 1000),
            (ServiceError::permission("denied"), StatusCode::FORBIDDEN, 1001),
            (ServiceError::conflict("in use"), StatusCode::CONFLICT, 4000),
        ];
        for (err, status, code) in cases {
            let api: ApiError = err.into();
            assert_eq!(api.status_code(), status);
            assert_eq!(api.business_code(), code);
        }
    }

    #[test]
    fn internal_errors_withhold_detail() {
        let api: ApiError = ServiceError::internal("connection refused to 10.0.0.5").into();
        assert_eq!(api.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.to_json()["message"], "internal server error");
    }
}
