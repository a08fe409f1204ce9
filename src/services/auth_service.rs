//! Admin authentication: credential checks, session token issuance, and the
//! LOGIN/LOGOUT/CHANGE_PASSWORD audit trail. Tokens are stateless; logout is
//! audit-only and does not invalidate an already-issued token before expiry.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use sqlx::{PgConnection, PgPool};

use crate::auth::{generate_jwt, Claims};
use crate::database::models::Admin;

use super::{execute_with_audit, Module, OperationType, ServiceError, ServiceResult};

/// Hash a plaintext password with Argon2id and a random salt.
pub fn hash_password(password: &str) -> ServiceResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::internal(format!("password hashing failed: {}", e)))
}

/// Verify a plaintext password against a stored Argon2id hash.
pub fn verify_password(password: &str, hash: &str) -> ServiceResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| ServiceError::internal(format!("invalid password hash: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(ServiceError::internal(format!(
            "password verification failed: {}",
            e
        ))),
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResult {
    pub access_token: String,
    pub expires_in: i64,
    pub admin: Admin,
}

pub struct AuthService {
    pool: PgPool,
}

impl AuthService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Validate credentials and issue a session token. The LOGIN audit record
    /// commits in the same transaction that completes the login.
    pub async fn login(&self, admin_name: &str, admin_pass: &str) -> ServiceResult<LoginResult> {
        if admin_name.is_empty() || admin_pass.is_empty() {
            return Err(ServiceError::validation("admin name and password are required"));
        }

        let admin = sqlx::query_as::<_, Admin>("SELECT * FROM admins WHERE admin_name = $1")
            .bind(admin_name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("admin name does not exist"))?;

        if admin.enable == 0 {
            return Err(ServiceError::permission("account is disabled"));
        }

        if !verify_password(admin_pass, &admin.admin_pass)? {
            return Err(ServiceError::permission("incorrect password"));
        }

        let claims = Claims::new(admin.admin_id, admin.admin_name.clone(), admin.is_super);
        let expires_in = claims.expires_in_secs();
        let token =
            generate_jwt(&claims).map_err(|e| ServiceError::internal(e.to_string()))?;

        let content = json!({
            "admin_name": admin.admin_name,
            "login_time": Utc::now().to_rfc3339(),
        });
        let admin_id = admin.admin_id;
        let pool = self.pool.clone();

        execute_with_audit(
            &pool,
            Module::Admin,
            OperationType::Login,
            content,
            Some(admin_id),
            move |_conn: &mut PgConnection| {
                Box::pin(async move {
                    Ok(LoginResult {
                        access_token: format!("Bearer {}", token),
                        expires_in,
                        admin,
                    })
                })
            },
        )
        .await
    }

    /// Logout writes an audit record only; the token remains valid until its
    /// expiry (accepted limitation of the stateless session design).
    pub async fn logout(&self, actor_id: i64) -> ServiceResult<()> {
        self.load(actor_id).await?;

        let content = json!({
            "admin_id": actor_id,
            "logout_time": Utc::now().to_rfc3339(),
        });
        let pool = self.pool.clone();

        execute_with_audit(
            &pool,
            Module::Admin,
            OperationType::Logout,
            content,
            Some(actor_id),
            move |_conn: &mut PgConnection| Box::pin(async move { Ok(()) }),
        )
        .await
    }

    pub async fn change_password(
        &self,
        actor_id: i64,
        old_password: &str,
        new_password: &str,
    ) -> ServiceResult<()> {
        if old_password.is_empty() || new_password.is_empty() {
            return Err(ServiceError::validation("old and new passwords are required"));
        }
        if new_password.len() < 8 {
            return Err(ServiceError::validation("new password must be at least 8 characters"));
        }

        let admin = self.load(actor_id).await?;

        if !verify_password(old_password, &admin.admin_pass)? {
            return Err(ServiceError::permission("incorrect old password"));
        }

        let new_hash = hash_password(new_password)?;
        let content = json!({
            "admin_id": actor_id,
            "change_time": Utc::now().to_rfc3339(),
        });
        let pool = self.pool.clone();

        execute_with_audit(
            &pool,
            Module::Admin,
            OperationType::ChangePassword,
            content,
            Some(actor_id),
            move |conn: &mut PgConnection| {
                Box::pin(async move {
                    update_password(conn, actor_id, &new_hash).await?;
                    Ok(())
                })
            },
        )
        .await
    }

    pub async fn get_profile(&self, admin_id: i64) -> ServiceResult<Admin> {
        self.load(admin_id).await
    }

    async fn load(&self, admin_id: i64) -> ServiceResult<Admin> {
        let admin = sqlx::query_as::<_, Admin>(
            "SELECT * FROM admins WHERE admin_id = $1 AND enable = 1",
        )
        .bind(admin_id)
        .fetch_optional(&self.pool)
        .await?;

        admin.ok_or_else(|| ServiceError::not_found("admin not found"))
    }
}

async fn update_password(conn: &mut PgConnection, admin_id: i64, hash: &str) -> ServiceResult<()> {
    sqlx::query("UPDATE admins SET admin_pass = $2, updated_at = now() WHERE admin_id = $1")
        .bind(admin_id)
        .bind(hash)
        .execute(conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip() {
        let hash = hash_password("correct horse battery staple").expect("hash");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse battery staple", &hash).unwrap());
        assert!(!verify_password("wrong password", &hash).unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("same-password").expect("hash");
        let b = hash_password("same-password").expect("hash");
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_hash_is_internal_error() {
        let err = verify_password("pw", "not-a-phc-string").unwrap_err();
        assert!(matches!(err, ServiceError::Internal(_)));
    }
}
