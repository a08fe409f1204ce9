use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

/// Uniform response envelope: `{"code": 0, "message": "OK", "data": ...}`.
/// Nonzero codes are grouped by category (1000s auth, 2000s validation,
/// 3000s not-found, 4000s conflict, 5000s internal).
pub fn success_response<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({
        "code": 0,
        "message": "OK",
        "data": data,
    }))
}

pub fn success_with_message<T: Serialize>(data: T, message: &str) -> Json<Value> {
    Json(json!({
        "code": 0,
        "message": message,
        "data": data,
    }))
}

pub fn error_response(code: i32, message: &str) -> Json<Value> {
    Json(json!({
        "code": code,
        "message": message,
        "data": Value::Null,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_has_zero_code() {
        let Json(body) = success_response(json!({"x": 1}));
        assert_eq!(body["code"], 0);
        assert_eq!(body["message"], "OK");
        assert_eq!(body["data"]["x"], 1);
    }

    #[test]
    fn error_envelope_carries_null_data() {
        let Json(body) = error_response(3000, "member not found");
        assert_eq!(body["code"], 3000);
        assert!(body["data"].is_null());
    }
}
