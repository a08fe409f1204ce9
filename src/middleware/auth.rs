use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{request::Parts, HeaderMap};

use crate::auth::{self, Claims};
use crate::error::ApiError;

/// Authenticated admin context extracted from the bearer JWT. Protected
/// handlers take this as an extractor; public handlers simply omit it.
/// Services receive the actor id as an explicit parameter; nothing reads
/// this from ambient state.
#[derive(Clone, Debug)]
pub struct AuthAdmin {
    pub admin_id: i64,
    pub admin_name: String,
    pub is_super: i16,
}

impl AuthAdmin {
    pub fn is_super(&self) -> bool {
        self.is_super == 1
    }
}

impl From<Claims> for AuthAdmin {
    fn from(claims: Claims) -> Self {
        Self {
            admin_id: claims.admin_id,
            admin_name: claims.admin_name,
            is_super: claims.is_super,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthAdmin
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers).map_err(ApiError::unauthorized)?;

        let claims = auth::verify_jwt(&token)
            .map_err(|e| ApiError::unauthorized(format!("invalid token: {}", e)))?;

        Ok(AuthAdmin::from(claims))
    }
}

/// Extract the JWT from the Authorization header
fn extract_bearer_token(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get("authorization")
        .ok_or_else(|| "missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "invalid Authorization header format".to_string())?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.to_string()),
        Some(_) => Err("empty bearer token".to_string()),
        None => Err("Authorization header must use Bearer token format".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extracts_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn rejects_missing_header() {
        let headers = HeaderMap::new();
        assert!(extract_bearer_token(&headers).is_err());
    }

    #[test]
    fn rejects_non_bearer_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic dXNlcg=="));
        assert!(extract_bearer_token(&headers).is_err());
    }

    #[test]
    fn rejects_empty_token() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer   "));
        assert!(extract_bearer_token(&headers).is_err());
    }

    #[test]
    fn super_flag_maps_to_bool() {
        let admin = AuthAdmin {
            admin_id: 1,
            admin_name: "root".to_string(),
            is_super: 1,
        };
        assert!(admin.is_super());

        let admin = AuthAdmin { is_super: 0, ..admin };
        assert!(!admin.is_super());
    }
}
