//! Project management.

use serde::Deserialize;
use serde_json::{json, Map, Value};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use crate::api::{Page, Pagination};
use crate::database::models::{Project, ENABLED};

use super::{execute_with_audit, validate, Module, OperationType, ServiceError, ServiceResult};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectFilters {
    pub q: Option<String>,
    pub is_end: Option<i16>,
    #[serde(default)]
    pub show_all: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectPayload {
    pub project_url: Option<String>,
    pub project_name_zh: Option<String>,
    pub project_name_en: Option<String>,
    pub project_desc_zh: Option<String>,
    pub project_desc_en: Option<String>,
    /// `YYYY-MM-DD`, or a unix timestamp in seconds/milliseconds
    pub project_date_start: Option<String>,
    pub is_end: Option<i16>,
}

pub struct ProjectService {
    pool: PgPool,
}

impl ProjectService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        filters: &ProjectFilters,
        pagination: Pagination,
    ) -> ServiceResult<Page<Project>> {
        let mut count_qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM projects WHERE 1=1");
        Self::push_filters(&mut count_qb, filters);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM projects WHERE 1=1");
        Self::push_filters(&mut qb, filters);
        qb.push(" ORDER BY project_date_start DESC NULLS LAST");
        if let Some((limit, offset)) = pagination.limit_offset() {
            qb.push(" LIMIT ").push_bind(limit);
            qb.push(" OFFSET ").push_bind(offset);
        }

        let items = qb.build_query_as::<Project>().fetch_all(&self.pool).await?;
        Ok(Page::new(items, total, pagination))
    }

    pub async fn get(&self, project_id: i64) -> ServiceResult<Project> {
        self.load_active(project_id).await
    }

    pub async fn create(&self, payload: ProjectPayload, actor: Option<i64>) -> ServiceResult<Project> {
        self.validate_payload(&payload, true)?;

        let start_date = match payload.project_date_start.as_deref().filter(|s| !s.is_empty()) {
            Some(raw) => Some(validate::parse_date("project_date_start", raw)?),
            None => None,
        };

        let content = json!({
            "project_name_zh": payload.project_name_zh,
            "project_name_en": payload.project_name_en,
            "project_url": payload.project_url,
            "is_end": payload.is_end,
        });
        let pool = self.pool.clone();

        execute_with_audit(
            &pool,
            Module::Project,
            OperationType::Create,
            content,
            actor,
            move |conn: &mut PgConnection| {
                Box::pin(async move {
                    let project = sqlx::query_as::<_, Project>(
                        "INSERT INTO projects \
                         (project_url, project_name_zh, project_name_en, project_desc_zh, \
                          project_desc_en, project_date_start, is_end, enable) \
                         VALUES ($1, $2, $3, $4, $5, $6, $7, 1) \
                         RETURNING *",
                    )
                    .bind(&payload.project_url)
                    .bind(&payload.project_name_zh)
                    .bind(&payload.project_name_en)
                    .bind(&payload.project_desc_zh)
                    .bind(&payload.project_desc_en)
                    .bind(start_date)
                    .bind(payload.is_end.unwrap_or(0))
                    .fetch_one(&mut *conn)
                    .await?;

                    Ok(project)
                })
            },
        )
        .await
    }

    pub async fn update(
        &self,
        project_id: i64,
        payload: ProjectPayload,
        actor: Option<i64>,
    ) -> ServiceResult<Project> {
        let mut project = self.load_active(project_id).await?;
        self.validate_payload(&payload, false)?;

        let mut diff = Map::new();

        set_field(&mut diff, "project_url", &mut project.project_url, &payload.project_url);
        set_field(&mut diff, "project_name_zh", &mut project.project_name_zh, &payload.project_name_zh);
        set_field(&mut diff, "project_name_en", &mut project.project_name_en, &payload.project_name_en);
        set_field(&mut diff, "project_desc_zh", &mut project.project_desc_zh, &payload.project_desc_zh);
        set_field(&mut diff, "project_desc_en", &mut project.project_desc_en, &payload.project_desc_en);

        if let Some(is_end) = payload.is_end {
            if project.is_end != is_end {
                diff.insert("is_end".into(), json!({ "old": project.is_end, "new": is_end }));
                project.is_end = is_end;
            }
        }

        if let Some(raw) = payload.project_date_start.as_deref().filter(|s| !s.is_empty()) {
            let new_date = validate::parse_date("project_date_start", raw)?;
            if project.project_date_start != Some(new_date) {
                diff.insert(
                    "project_date_start".into(),
                    json!({
                        "old": project.project_date_start.map(|d| d.to_string()),
                        "new": new_date.to_string(),
                    }),
                );
                project.project_date_start = Some(new_date);
            }
        }

        let pool = self.pool.clone();
        execute_with_audit(
            &pool,
            Module::Project,
            OperationType::Update,
            Value::Object(diff),
            actor,
            move |conn: &mut PgConnection| {
                Box::pin(async move {
                    let row = sqlx::query_as::<_, Project>(
                        "UPDATE projects SET project_url = $2, project_name_zh = $3, \
                         project_name_en = $4, project_desc_zh = $5, project_desc_en = $6, \
                         project_date_start = $7, is_end = $8, updated_at = now() \
                         WHERE project_id = $1 AND enable = 1 \
                         RETURNING *",
                    )
                    .bind(project.project_id)
                    .bind(&project.project_url)
                    .bind(&project.project_name_zh)
                    .bind(&project.project_name_en)
                    .bind(&project.project_desc_zh)
                    .bind(&project.project_desc_en)
                    .bind(project.project_date_start)
                    .bind(project.is_end)
                    .fetch_one(&mut *conn)
                    .await?;

                    Ok(row)
                })
            },
        )
        .await
    }

    pub async fn delete(&self, project_id: i64, actor: Option<i64>) -> ServiceResult<()> {
        self.load_active(project_id).await?;

        let pool = self.pool.clone();
        execute_with_audit(
            &pool,
            Module::Project,
            OperationType::Delete,
            json!({ "deleted_project_id": project_id }),
            actor,
            move |conn: &mut PgConnection| {
                Box::pin(async move {
                    sqlx::query(
                        "UPDATE projects SET enable = 0, updated_at = now() WHERE project_id = $1",
                    )
                    .bind(project_id)
                    .execute(&mut *conn)
                    .await?;
                    Ok(())
                })
            },
        )
        .await
    }

    async fn load_active(&self, project_id: i64) -> ServiceResult<Project> {
        let project = sqlx::query_as::<_, Project>(
            "SELECT * FROM projects WHERE project_id = $1 AND enable = 1",
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;

        project.ok_or_else(|| ServiceError::not_found("project not found"))
    }

    fn validate_payload(&self, payload: &ProjectPayload, is_create: bool) -> ServiceResult<()> {
        if is_create && payload.project_name_zh.as_deref().unwrap_or("").is_empty() {
            return Err(ServiceError::validation("missing required field: project_name_zh"));
        }

        if let Some(is_end) = payload.is_end {
            validate::check_enum("is_end", is_end, &[0, 1])?;
        }

        for (field, value, max) in [
            ("project_url", &payload.project_url, 500),
            ("project_name_zh", &payload.project_name_zh, 500),
            ("project_name_en", &payload.project_name_en, 500),
            ("project_desc_zh", &payload.project_desc_zh, 10000),
            ("project_desc_en", &payload.project_desc_en, 10000),
        ] {
            if let Some(value) = value {
                validate::check_length(field, value, max)?;
            }
        }

        if let Some(raw) = payload.project_date_start.as_deref().filter(|s| !s.is_empty()) {
            validate::parse_date("project_date_start", raw)?;
        }

        Ok(())
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filters: &ProjectFilters) {
        if !filters.show_all {
            qb.push(" AND enable = ").push_bind(ENABLED);
        }
        if let Some(q) = filters.q.as_deref().filter(|q| !q.is_empty()) {
            let pattern = format!("%{}%", q);
            qb.push(" AND (project_name_zh ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR project_name_en ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR project_desc_zh ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(is_end) = filters.is_end {
            qb.push(" AND is_end = ").push_bind(is_end);
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

    fn service() -> ProjectService {
        let rt = Box::leak(Box::new(
            tokio::runtime::Runtime::new().expect("tokio runtime"),
        ));
        let pool = rt.block_on(async {
            sqlx::postgres::PgPoolOptions::new()
                .connect_lazy("postgres://localhost/unused")
                .expect("lazy pool")
        });
        ProjectService::new(pool)
    }

    #[test]
    fn create_requires_chinese_name() {
        let svc = service();
        assert!(svc.validate_payload(&ProjectPayload::default(), true).is_err());
    }

    #[test]
    fn is_end_must_be_binary() {
        let svc = service();
        let payload = ProjectPayload {
            project_name_zh: Some("項目".to_string()),
            is_end: Some(2),
            ..Default::default()
        };
        assert!(svc.validate_payload(&payload, true).is_err());
    }

    #[test]
    fn start_date_format_is_checked() {
        let svc = service();
        let payload = ProjectPayload {
            project_name_zh: Some("項目".to_string()),
            project_date_start: Some("Jan 1 2024".to_string()),
            ..Default::default()
        };
        assert!(svc.validate_payload(&payload, true).is_err());
    }
}
