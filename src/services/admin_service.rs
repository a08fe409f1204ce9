//! Administrator account management. Only super admins reach these
//! operations (enforced at the route layer); the service additionally blocks
//! self-modification and edits to other super admins.

use serde::Deserialize;
use serde_json::{json, Map, Value};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use crate::api::{Page, Pagination};
use crate::database::models::{Admin, ENABLED};

use super::auth_service::hash_password;
use super::{execute_with_audit, validate, Module, OperationType, ServiceError, ServiceResult};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminFilters {
    pub q: Option<String>,
    #[serde(default)]
    pub show_all: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminPayload {
    pub admin_name: Option<String>,
    pub admin_pass: Option<String>,
    pub is_super: Option<i16>,
    pub enable: Option<i16>,
}

pub struct AdminService {
    pool: PgPool,
}

impl AdminService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        filters: &AdminFilters,
        pagination: Pagination,
    ) -> ServiceResult<Page<Admin>> {
        let mut count_qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM admins WHERE 1=1");
        Self::push_filters(&mut count_qb, filters);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM admins WHERE 1=1");
        Self::push_filters(&mut qb, filters);
        qb.push(" ORDER BY created_at DESC");
        if let Some((limit, offset)) = pagination.limit_offset() {
            qb.push(" LIMIT ").push_bind(limit);
            qb.push(" OFFSET ").push_bind(offset);
        }

        let items = qb.build_query_as::<Admin>().fetch_all(&self.pool).await?;
        Ok(Page::new(items, total, pagination))
    }

    pub async fn create(&self, payload: AdminPayload, actor: Option<i64>) -> ServiceResult<Admin> {
        self.validate_payload(&payload, true)?;

        let admin_name = payload.admin_name.clone().unwrap_or_default();
        let password = payload.admin_pass.clone().unwrap_or_default();
        let is_super = payload.is_super.unwrap_or(0);

        // Duplicate names conflict regardless of enable state; the column is
        // unique at the database level too
        let existing: Option<i64> =
            sqlx::query_scalar("SELECT admin_id FROM admins WHERE admin_name = $1")
                .bind(&admin_name)
                .fetch_optional(&self.pool)
                .await?;
        if existing.is_some() {
            return Err(ServiceError::conflict("admin name already exists"));
        }

        let password_hash = hash_password(&password)?;
        let content = json!({ "admin_name": admin_name, "is_super": is_super });
        let pool = self.pool.clone();

        execute_with_audit(
            &pool,
            Module::Admin,
            OperationType::Create,
            content,
            actor,
            move |conn: &mut PgConnection| {
                Box::pin(async move {
                    let admin = sqlx::query_as::<_, Admin>(
                        "INSERT INTO admins (admin_name, admin_pass, is_super, enable) \
                         VALUES ($1, $2, $3, 1) \
                         RETURNING *",
                    )
                    .bind(&admin_name)
                    .bind(&password_hash)
                    .bind(is_super)
                    .fetch_one(&mut *conn)
                    .await?;

                    Ok(admin)
                })
            },
        )
        .await
    }

    pub async fn update(
        &self,
        admin_id: i64,
        payload: AdminPayload,
        actor_id: i64,
    ) -> ServiceResult<Admin> {
        let mut admin = self.load(admin_id).await?;
        self.guard_mutation(&admin, admin_id, actor_id)?;
        self.validate_payload(&payload, false)?;

        let mut diff = Map::new();

        if let Some(new_name) = payload.admin_name.as_ref().filter(|n| !n.is_empty()) {
            let new_name = new_name.trim();
            if admin.admin_name != new_name {
                let taken: Option<i64> = sqlx::query_scalar(
                    "SELECT admin_id FROM admins WHERE admin_name = $1 AND admin_id <> $2",
                )
                .bind(new_name)
                .bind(admin_id)
                .fetch_optional(&self.pool)
                .await?;
                if taken.is_some() {
                    return Err(ServiceError::conflict("admin name already exists"));
                }

                diff.insert("admin_name".into(), json!({ "old": admin.admin_name, "new": new_name }));
                admin.admin_name = new_name.to_string();
            }
        }

        if let Some(is_super) = payload.is_super {
            if admin.is_super != is_super {
                diff.insert("is_super".into(), json!({ "old": admin.is_super, "new": is_super }));
                admin.is_super = is_super;
            }
        }

        if let Some(enable) = payload.enable {
            if admin.enable != enable {
                diff.insert("enable".into(), json!({ "old": admin.enable, "new": enable }));
                admin.enable = enable;
            }
        }

        let pool = self.pool.clone();
        execute_with_audit(
            &pool,
            Module::Admin,
            OperationType::Update,
            json!({ "admin_id": admin_id, "changes": Value::Object(diff) }),
            Some(actor_id),
            move |conn: &mut PgConnection| {
                Box::pin(async move {
                    let row = sqlx::query_as::<_, Admin>(
                        "UPDATE admins SET admin_name = $2, is_super = $3, enable = $4, \
                         updated_at = now() \
                         WHERE admin_id = $1 \
                         RETURNING *",
                    )
                    .bind(admin.admin_id)
                    .bind(&admin.admin_name)
                    .bind(admin.is_super)
                    .bind(admin.enable)
                    .fetch_one(&mut *conn)
                    .await?;

                    Ok(row)
                })
            },
        )
        .await
    }

    pub async fn delete(&self, admin_id: i64, actor_id: i64) -> ServiceResult<()> {
        let admin = self.load(admin_id).await?;
        self.guard_mutation(&admin, admin_id, actor_id)?;

        if admin.enable == 0 {
            return Err(ServiceError::not_found("admin not found"));
        }

        let pool = self.pool.clone();
        execute_with_audit(
            &pool,
            Module::Admin,
            OperationType::Delete,
            json!({ "deleted_admin_id": admin_id }),
            Some(actor_id),
            move |conn: &mut PgConnection| {
                Box::pin(async move {
                    sqlx::query(
                        "UPDATE admins SET enable = 0, updated_at = now() WHERE admin_id = $1",
                    )
                    .bind(admin_id)
                    .execute(&mut *conn)
                    .await?;
                    Ok(())
                })
            },
        )
        .await
    }

    async fn load(&self, admin_id: i64) -> ServiceResult<Admin> {
        let admin = sqlx::query_as::<_, Admin>("SELECT * FROM admins WHERE admin_id = $1")
            .bind(admin_id)
            .fetch_optional(&self.pool)
            .await?;

        admin.ok_or_else(|| ServiceError::not_found("admin not found"))
    }

    /// Admins cannot modify their own account through this surface, and
    /// super-admin accounts are immutable to everyone else.
    fn guard_mutation(&self, target: &Admin, admin_id: i64, actor_id: i64) -> ServiceResult<()> {
        if admin_id == actor_id {
            return Err(ServiceError::conflict("cannot modify your own account"));
        }
        if target.is_super == 1 {
            return Err(ServiceError::conflict("cannot modify another super admin account"));
        }
        Ok(())
    }

    fn validate_payload(&self, payload: &AdminPayload, is_create: bool) -> ServiceResult<()> {
        if is_create {
            let name = payload.admin_name.as_deref().unwrap_or("");
            let pass = payload.admin_pass.as_deref().unwrap_or("");
            if name.is_empty() || pass.is_empty() {
                return Err(ServiceError::validation(
                    "missing required fields: admin_name, admin_pass",
                ));
            }
            if pass.len() < 8 {
                return Err(ServiceError::validation("password must be at least 8 characters"));
            }
        }

        if let Some(name) = payload.admin_name.as_deref().filter(|n| !n.is_empty()) {
            if !validate::is_valid_admin_name(name.trim()) {
                return Err(ServiceError::validation(
                    "admin name must be 3-50 characters of letters, digits, underscores or hyphens",
                ));
            }
        }

        if let Some(is_super) = payload.is_super {
            validate::check_enum("is_super", is_super, &[0, 1])?;
        }
        if let Some(enable) = payload.enable {
            validate::check_enum("enable", enable, &[0, 1])?;
        }

        Ok(())
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filters: &AdminFilters) {
        if !filters.show_all {
            qb.push(" AND enable = ").push_bind(ENABLED);
        }
        if let Some(q) = filters.q.as_deref().filter(|q| !q.is_empty()) {
            qb.push(" AND admin_name ILIKE ").push_bind(format!("%{}%", q));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn service() -> AdminService {
        // `connect_lazy` spawns pool-maintenance tasks and therefore needs a
        // Tokio runtime context; provide one for the pool construction.
        let rt = Box::leak(Box::new(
            tokio::runtime::Runtime::new().expect("tokio runtime"),
        ));
        let pool = rt.block_on(async {
            sqlx::postgres::PgPoolOptions::new()
                .connect_lazy("postgres://localhost/unused")
                .expect("lazy pool")
        });
        AdminService::new(pool)
    }

    fn stored_admin(admin_id: i64, is_super: i16) -> Admin {
        Admin {
            admin_id,
            is_super,
            admin_name: "other".to_string(),
            admin_pass: "hash".to_string(),
            enable: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn create_requires_name_and_password() {
        let svc = service();
        assert!(svc.validate_payload(&AdminPayload::default(), true).is_err());
    }

    #[test]
    fn password_minimum_is_eight() {
        let svc = service();
        let payload = AdminPayload {
            admin_name: Some("newadmin".to_string()),
            admin_pass: Some("short".to_string()),
            ..Default::default()
        };
        assert!(svc.validate_payload(&payload, true).is_err());
    }

    #[test]
    fn name_format_is_enforced() {
        let svc = service();
        let payload = AdminPayload {
            admin_name: Some("bad name!".to_string()),
            admin_pass: Some("longenough".to_string()),
            ..Default::default()
        };
        assert!(svc.validate_payload(&payload, true).is_err());
    }

    #[test]
    fn cannot_modify_self_or_other_supers() {
        let svc = service();
        let err = svc.guard_mutation(&stored_admin(5, 0), 5, 5).unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let err = svc.guard_mutation(&stored_admin(6, 1), 6, 5).unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        assert!(svc.guard_mutation(&stored_admin(6, 0), 6, 5).is_ok());
    }
}
