//! Lab resource management (equipment, software, datasets).

use serde::Deserialize;
use serde_json::{json, Map, Value};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use crate::api::{Page, Pagination};
use crate::database::models::{Resource, ENABLED};

use super::{execute_with_audit, validate, Module, OperationType, ServiceError, ServiceResult};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceFilters {
    pub q: Option<String>,
    pub resource_type: Option<i16>,
    pub availability_status: Option<i16>,
    #[serde(default)]
    pub show_all: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourcePayload {
    pub resource_name_zh: Option<String>,
    pub resource_name_en: Option<String>,
    pub resource_description_zh: Option<String>,
    pub resource_description_en: Option<String>,
    pub resource_type: Option<i16>,
    pub resource_location_zh: Option<String>,
    pub resource_location_en: Option<String>,
    pub resource_url: Option<String>,
    pub resource_file: Option<String>,
    pub resource_image: Option<String>,
    pub availability_status: Option<i16>,
    pub contact_info: Option<String>,
}

pub struct ResourceService {
    pool: PgPool,
}

impl ResourceService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        filters: &ResourceFilters,
        pagination: Pagination,
    ) -> ServiceResult<Page<Resource>> {
        let mut count_qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM resources WHERE 1=1");
        Self::push_filters(&mut count_qb, filters);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM resources WHERE 1=1");
        Self::push_filters(&mut qb, filters);
        qb.push(" ORDER BY created_at DESC");
        if let Some((limit, offset)) = pagination.limit_offset() {
            qb.push(" LIMIT ").push_bind(limit);
            qb.push(" OFFSET ").push_bind(offset);
        }

        let items = qb.build_query_as::<Resource>().fetch_all(&self.pool).await?;
        Ok(Page::new(items, total, pagination))
    }

    pub async fn get(&self, resource_id: i64) -> ServiceResult<Resource> {
        self.load_active(resource_id).await
    }

    pub async fn create(&self, payload: ResourcePayload, actor: Option<i64>) -> ServiceResult<Resource> {
        self.validate_payload(&payload, true)?;

        let name_zh = payload
            .resource_name_zh
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ServiceError::validation("missing required field: resource_name_zh"))?;

        let content = json!({
            "resource_name_zh": name_zh,
            "resource_type": payload.resource_type,
            "availability_status": payload.availability_status,
        });
        let pool = self.pool.clone();

        execute_with_audit(
            &pool,
            Module::Resource,
            OperationType::Create,
            content,
            actor,
            move |conn: &mut PgConnection| {
                Box::pin(async move {
                    let resource = sqlx::query_as::<_, Resource>(
                        "INSERT INTO resources \
                         (resource_name_zh, resource_name_en, resource_description_zh, \
                          resource_description_en, resource_type, resource_location_zh, \
                          resource_location_en, resource_url, resource_file, resource_image, \
                          availability_status, contact_info, enable) \
                         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 1) \
                         RETURNING *",
                    )
                    .bind(&name_zh)
                    .bind(&payload.resource_name_en)
                    .bind(&payload.resource_description_zh)
                    .bind(&payload.resource_description_en)
                    .bind(payload.resource_type.unwrap_or(0))
                    .bind(&payload.resource_location_zh)
                    .bind(&payload.resource_location_en)
                    .bind(&payload.resource_url)
                    .bind(&payload.resource_file)
                    .bind(&payload.resource_image)
                    .bind(payload.availability_status.unwrap_or(1))
                    .bind(&payload.contact_info)
                    .fetch_one(&mut *conn)
                    .await?;

                    Ok(resource)
                })
            },
        )
        .await
    }

    pub async fn update(
        &self,
        resource_id: i64,
        payload: ResourcePayload,
        actor: Option<i64>,
    ) -> ServiceResult<Resource> {
        let mut resource = self.load_active(resource_id).await?;
        self.validate_payload(&payload, false)?;

        let mut diff = Map::new();

        if let Some(name_zh) = payload.resource_name_zh.as_ref().filter(|s| !s.is_empty()) {
            if &resource.resource_name_zh != name_zh {
                diff.insert(
                    "resource_name_zh".into(),
                    json!({ "old": resource.resource_name_zh, "new": name_zh }),
                );
                resource.resource_name_zh = name_zh.clone();
            }
        }

        set_field(&mut diff, "resource_name_en", &mut resource.resource_name_en, &payload.resource_name_en);
        set_field(
            &mut diff,
            "resource_description_zh",
            &mut resource.resource_description_zh,
            &payload.resource_description_zh,
        );
        set_field(
            &mut diff,
            "resource_description_en",
            &mut resource.resource_description_en,
            &payload.resource_description_en,
        );
        set_field(
            &mut diff,
            "resource_location_zh",
            &mut resource.resource_location_zh,
            &payload.resource_location_zh,
        );
        set_field(
            &mut diff,
            "resource_location_en",
            &mut resource.resource_location_en,
            &payload.resource_location_en,
        );
        set_field(&mut diff, "resource_url", &mut resource.resource_url, &payload.resource_url);
        set_field(&mut diff, "resource_file", &mut resource.resource_file, &payload.resource_file);
        set_field(&mut diff, "resource_image", &mut resource.resource_image, &payload.resource_image);
        set_field(&mut diff, "contact_info", &mut resource.contact_info, &payload.contact_info);

        if let Some(resource_type) = payload.resource_type {
            if resource.resource_type != resource_type {
                diff.insert(
                    "resource_type".into(),
                    json!({ "old": resource.resource_type, "new": resource_type }),
                );
                resource.resource_type = resource_type;
            }
        }
        if let Some(status) = payload.availability_status {
            if resource.availability_status != status {
                diff.insert(
                    "availability_status".into(),
                    json!({ "old": resource.availability_status, "new": status }),
                );
                resource.availability_status = status;
            }
        }

        let pool = self.pool.clone();
        execute_with_audit(
            &pool,
            Module::Resource,
            OperationType::Update,
            Value::Object(diff),
            actor,
            move |conn: &mut PgConnection| {
                Box::pin(async move {
                    let row = sqlx::query_as::<_, Resource>(
                        "UPDATE resources SET resource_name_zh = $2, resource_name_en = $3, \
                         resource_description_zh = $4, resource_description_en = $5, \
                         resource_type = $6, resource_location_zh = $7, resource_location_en = $8, \
                         resource_url = $9, resource_file = $10, resource_image = $11, \
                         availability_status = $12, contact_info = $13, updated_at = now() \
                         WHERE resource_id = $1 AND enable = 1 \
                         RETURNING *",
                    )
                    .bind(resource.resource_id)
                    .bind(&resource.resource_name_zh)
                    .bind(&resource.resource_name_en)
                    .bind(&resource.resource_description_zh)
                    .bind(&resource.resource_description_en)
                    .bind(resource.resource_type)
                    .bind(&resource.resource_location_zh)
                    .bind(&resource.resource_location_en)
                    .bind(&resource.resource_url)
                    .bind(&resource.resource_file)
                    .bind(&resource.resource_image)
                    .bind(resource.availability_status)
                    .bind(&resource.contact_info)
                    .fetch_one(&mut *conn)
                    .await?;

                    Ok(row)
                })
            },
        )
        .await
    }

    pub async fn delete(&self, resource_id: i64, actor: Option<i64>) -> ServiceResult<()> {
        self.load_active(resource_id).await?;

        let pool = self.pool.clone();
        execute_with_audit(
            &pool,
            Module::Resource,
            OperationType::Delete,
            json!({ "deleted_resource_id": resource_id }),
            actor,
            move |conn: &mut PgConnection| {
                Box::pin(async move {
                    sqlx::query(
                        "UPDATE resources SET enable = 0, updated_at = now() WHERE resource_id = $1",
                    )
                    .bind(resource_id)
                    .execute(&mut *conn)
                    .await?;
                    Ok(())
                })
            },
        )
        .await
    }

    async fn load_active(&self, resource_id: i64) -> ServiceResult<Resource> {
        let resource = sqlx::query_as::<_, Resource>(
            "SELECT * FROM resources WHERE resource_id = $1 AND enable = 1",
        )
        .bind(resource_id)
        .fetch_optional(&self.pool)
        .await?;

        resource.ok_or_else(|| ServiceError::not_found("resource not found"))
    }

    fn validate_payload(&self, payload: &ResourcePayload, is_create: bool) -> ServiceResult<()> {
        if is_create && payload.resource_name_zh.as_deref().unwrap_or("").is_empty() {
            return Err(ServiceError::validation("missing required field: resource_name_zh"));
        }

        if let Some(resource_type) = payload.resource_type {
            validate::check_enum("resource_type", resource_type, &[0, 1, 2, 3])?;
        }
        if let Some(status) = payload.availability_status {
            validate::check_enum("availability_status", status, &[0, 1, 2])?;
        }

        for (field, value, max) in [
            ("resource_name_zh", &payload.resource_name_zh, 200),
            ("resource_name_en", &payload.resource_name_en, 200),
            ("resource_location_zh", &payload.resource_location_zh, 300),
            ("resource_location_en", &payload.resource_location_en, 300),
            ("resource_url", &payload.resource_url, 500),
            ("contact_info", &payload.contact_info, 200),
        ] {
            if let Some(value) = value {
                validate::check_length(field, value, max)?;
            }
        }

        Ok(())
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filters: &ResourceFilters) {
        if !filters.show_all {
            qb.push(" AND enable = ").push_bind(ENABLED);
        }
        if let Some(q) = filters.q.as_deref().filter(|q| !q.is_empty()) {
            let pattern = format!("%{}%", q);
            qb.push(" AND (resource_name_zh ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR resource_name_en ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR resource_description_zh ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR resource_description_en ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(resource_type) = filters.resource_type {
            qb.push(" AND resource_type = ").push_bind(resource_type);
        }
        if let Some(status) = filters.availability_status {
            qb.push(" AND availability_status = ").push_bind(status);
        }
    }
}

fn set_field(
    diff: &mut Map<String, Value>,
    field: &str,
    target: &mut Option<String>,
    incoming: &Option<String>,
) {
    if let Some(new_value) = incoming {
        if target.as_deref() != Some(new_value) {
            let old = target.replace(new_value.clone());
            diff.insert(field.to_string(), json!({ "old": old, "new": new_value }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> ResourceService {
        let rt = Box::leak(Box::new(
            tokio::runtime::Runtime::new().expect("tokio runtime"),
        ));
        let pool = rt.block_on(async {
            sqlx::postgres::PgPoolOptions::new()
                .connect_lazy("postgres://localhost/unused")
                .expect("lazy pool")
        });
        ResourceService::new(pool)
    }

    #[test]
    fn create_requires_chinese_name() {
        let svc = service();
        assert!(svc.validate_payload(&ResourcePayload::default(), true).is_err());
    }

    #[test]
    fn type_and_availability_ranges() {
        let svc = service();
        let bad_type = ResourcePayload {
            resource_name_zh: Some("伺服器".to_string()),
            resource_type: Some(4),
            ..Default::default()
        };
        assert!(svc.validate_payload(&bad_type, true).is_err());

        let bad_status = ResourcePayload {
            resource_name_zh: Some("伺服器".to_string()),
            availability_status: Some(3),
            ..Default::default()
        };
        assert!(svc.validate_payload(&bad_status, true).is_err());
    }
}
