use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config;

/// Claims embedded in an admin session token. Tokens are stateless and
/// signature-verified per request; there is no server-side revocation list,
/// so a token stays valid until `exp` even after logout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub admin_id: i64,
    pub admin_name: String,
    pub is_super: i16,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(admin_id: i64, admin_name: String, is_super: i16) -> Self {
        let now = Utc::now();
        let expiry_hours = config::config().security.jwt_expiry_hours;
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            admin_id,
            admin_name,
            is_super,
            exp,
            iat: now.timestamp(),
        }
    }

    pub fn expires_in_secs(&self) -> i64 {
        self.exp - self.iat
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),
    #[error("invalid JWT token: {0}")]
    TokenValidation(String),
    #[error("JWT secret not configured")]
    InvalidSecret,
}

pub fn generate_jwt(claims: &Claims) -> Result<String, JwtError> {
    let secret = &config::config().security.jwt_secret;

    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key)
        .map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

pub fn verify_jwt(token: &str) -> Result<Claims, JwtError> {
    let secret = &config::config().security.jwt_secret;

    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    // Clients may send the token with or without the Bearer prefix
    let token = token.strip_prefix("Bearer ").unwrap_or(token);

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    decode::<Claims>(token, &decoding_key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| JwtError::TokenValidation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_claims() {
        let claims = Claims::new(42, "admin".to_string(), 1);
        let token = generate_jwt(&claims).expect("generate");
        let decoded = verify_jwt(&token).expect("verify");
        assert_eq!(decoded.admin_id, 42);
        assert_eq!(decoded.admin_name, "admin");
        assert_eq!(decoded.is_super, 1);
    }

    #[test]
    fn accepts_bearer_prefixed_tokens() {
        let claims = Claims::new(7, "ops".to_string(), 0);
        let token = generate_jwt(&claims).expect("generate");
        let decoded = verify_jwt(&format!("Bearer {}", token)).expect("verify");
        assert_eq!(decoded.admin_id, 7);
    }

    #[test]
    fn rejects_tampered_tokens() {
        let claims = Claims::new(1, "admin".to_string(), 0);
        let mut token = generate_jwt(&claims).expect("generate");
        token.push('x');
        assert!(verify_jwt(&token).is_err());
    }
}
