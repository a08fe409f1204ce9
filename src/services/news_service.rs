//! News management.

use serde::Deserialize;
use serde_json::{json, Map, Value};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use crate::api::{Page, Pagination};
use crate::database::models::{News, ENABLED};

use super::{execute_with_audit, validate, Module, OperationType, ServiceError, ServiceResult};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewsFilters {
    pub q: Option<String>,
    pub news_type: Option<i16>,
    pub start_date: Option<chrono::NaiveDate>,
    pub end_date: Option<chrono::NaiveDate>,
    #[serde(default)]
    pub show_all: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewsPayload {
    pub news_type: Option<i16>,
    pub news_content_zh: Option<String>,
    pub news_content_en: Option<String>,
    /// `YYYY-MM-DD`, or a unix timestamp in seconds/milliseconds
    pub news_date: Option<String>,
}

pub struct NewsService {
    pool: PgPool,
}

impl NewsService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        filters: &NewsFilters,
        pagination: Pagination,
    ) -> ServiceResult<Page<News>> {
        let mut count_qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM news WHERE 1=1");
        Self::push_filters(&mut count_qb, filters);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM news WHERE 1=1");
        Self::push_filters(&mut qb, filters);
        qb.push(" ORDER BY news_date DESC");
        if let Some((limit, offset)) = pagination.limit_offset() {
            qb.push(" LIMIT ").push_bind(limit);
            qb.push(" OFFSET ").push_bind(offset);
        }

        let items = qb.build_query_as::<News>().fetch_all(&self.pool).await?;
        Ok(Page::new(items, total, pagination))
    }

    pub async fn get(&self, news_id: i64) -> ServiceResult<News> {
        self.load_active(news_id).await
    }

    pub async fn create(&self, payload: NewsPayload, actor: Option<i64>) -> ServiceResult<News> {
        self.validate_payload(&payload, true)?;

        let news_type = payload
            .news_type
            .ok_or_else(|| ServiceError::validation("missing required field: news_type"))?;
        let news_date = match &payload.news_date {
            Some(raw) => validate::parse_date("news_date", raw)?,
            None => return Err(ServiceError::validation("missing required field: news_date")),
        };

        let content = json!({
            "news_type": news_type,
            "news_content_zh": payload.news_content_zh,
            "news_date": news_date.to_string(),
        });
        let pool = self.pool.clone();

        execute_with_audit(
            &pool,
            Module::News,
            OperationType::Create,
            content,
            actor,
            move |conn: &mut PgConnection| {
                Box::pin(async move {
                    let news = sqlx::query_as::<_, News>(
                        "INSERT INTO news (news_type, news_content_zh, news_content_en, news_date, enable) \
                         VALUES ($1, $2, $3, $4, 1) \
                         RETURNING *",
                    )
                    .bind(news_type)
                    .bind(&payload.news_content_zh)
                    .bind(payload.news_content_en.as_deref().unwrap_or(""))
                    .bind(news_date)
                    .fetch_one(&mut *conn)
                    .await?;

                    Ok(news)
                })
            },
        )
        .await
    }

    pub async fn update(
        &self,
        news_id: i64,
        payload: NewsPayload,
        actor: Option<i64>,
    ) -> ServiceResult<News> {
        let mut news = self.load_active(news_id).await?;
        self.validate_payload(&payload, false)?;

        let mut diff = Map::new();

        if let Some(news_type) = payload.news_type {
            if news.news_type != news_type {
                diff.insert("news_type".into(), json!({ "old": news.news_type, "new": news_type }));
                news.news_type = news_type;
            }
        }
        if let Some(content_zh) = &payload.news_content_zh {
            if news.news_content_zh.as_deref() != Some(content_zh) {
                let old = news.news_content_zh.replace(content_zh.clone());
                diff.insert("news_content_zh".into(), json!({ "old": old, "new": content_zh }));
            }
        }
        if let Some(content_en) = &payload.news_content_en {
            if news.news_content_en.as_deref() != Some(content_en) {
                let old = news.news_content_en.replace(content_en.clone());
                diff.insert("news_content_en".into(), json!({ "old": old, "new": content_en }));
            }
        }
        if let Some(raw) = &payload.news_date {
            let new_date = validate::parse_date("news_date", raw)?;
            if news.news_date != Some(new_date) {
                diff.insert(
                    "news_date".into(),
                    json!({
                        "old": news.news_date.map(|d| d.to_string()),
                        "new": new_date.to_string(),
                    }),
                );
                news.news_date = Some(new_date);
            }
        }

        let pool = self.pool.clone();
        execute_with_audit(
            &pool,
            Module::News,
            OperationType::Update,
            Value::Object(diff),
            actor,
            move |conn: &mut PgConnection| {
                Box::pin(async move {
                    let row = sqlx::query_as::<_, News>(
                        "UPDATE news SET news_type = $2, news_content_zh = $3, \
                         news_content_en = $4, news_date = $5, updated_at = now() \
                         WHERE news_id = $1 AND enable = 1 \
                         RETURNING *",
                    )
                    .bind(news.news_id)
                    .bind(news.news_type)
                    .bind(&news.news_content_zh)
                    .bind(&news.news_content_en)
                    .bind(news.news_date)
                    .fetch_one(&mut *conn)
                    .await?;

                    Ok(row)
                })
            },
        )
        .await
    }

    pub async fn delete(&self, news_id: i64, actor: Option<i64>) -> ServiceResult<()> {
        self.load_active(news_id).await?;

        let pool = self.pool.clone();
        execute_with_audit(
            &pool,
            Module::News,
            OperationType::Delete,
            json!({ "deleted_news_id": news_id }),
            actor,
            move |conn: &mut PgConnection| {
                Box::pin(async move {
                    sqlx::query("UPDATE news SET enable = 0, updated_at = now() WHERE news_id = $1")
                        .bind(news_id)
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            },
        )
        .await
    }

    async fn load_active(&self, news_id: i64) -> ServiceResult<News> {
        let news = sqlx::query_as::<_, News>("SELECT * FROM news WHERE news_id = $1 AND enable = 1")
            .bind(news_id)
            .fetch_optional(&self.pool)
            .await?;

        news.ok_or_else(|| ServiceError::not_found("news not found"))
    }

    fn validate_payload(&self, payload: &NewsPayload, is_create: bool) -> ServiceResult<()> {
        if is_create {
            let mut missing = Vec::new();
            if payload.news_type.is_none() {
                missing.push("news_type");
            }
            if payload.news_content_zh.as_deref().unwrap_or("").is_empty() {
                missing.push("news_content_zh");
            }
            if payload.news_date.as_deref().unwrap_or("").is_empty() {
                missing.push("news_date");
            }
            if !missing.is_empty() {
                return Err(ServiceError::validation(format!(
                    "missing required fields: {}",
                    missing.join(", ")
                )));
            }
        }

        if let Some(news_type) = payload.news_type {
            validate::check_enum("news_type", news_type, &[0, 1, 2])?;
        }

        for (field, value) in [
            ("news_content_zh", &payload.news_content_zh),
            ("news_content_en", &payload.news_content_en),
        ] {
            if let Some(value) = value {
                validate::check_length(field, value, 10000)?;
            }
        }

        if let Some(raw) = &payload.news_date {
            if !raw.is_empty() {
                validate::parse_date("news_date", raw)?;
            }
        }

        Ok(())
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filters: &NewsFilters) {
        if !filters.show_all {
            qb.push(" AND enable = ").push_bind(ENABLED);
        }
        if let Some(q) = filters.q.as_deref().filter(|q| !q.is_empty()) {
            let pattern = format!("%{}%", q);
            qb.push(" AND (news_content_zh ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR news_content_en ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(news_type) = filters.news_type {
            qb.push(" AND news_type = ").push_bind(news_type);
        }
        if let Some(start) = filters.start_date {
            qb.push(" AND news_date >= ").push_bind(start);
        }
        if let Some(end) = filters.end_date {
            qb.push(" AND news_date <= ").push_bind(end);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> NewsService {
        let rt = Box::leak(Box::new(
            tokio::runtime::Runtime::new().expect("tokio runtime"),
        ));
        let pool = rt.block_on(async {
            sqlx::postgres::PgPoolOptions::new()
                .connect_lazy("postgres://localhost/unused")
                .expect("lazy pool")
        });
        NewsService::new(pool)
    }

    #[test]
    fn create_requires_type_content_and_date() {
        let svc = service();
        let err = svc.validate_payload(&NewsPayload::default(), true).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(msg)
            if msg.contains("news_type") && msg.contains("news_content_zh") && msg.contains("news_date")));
    }

    #[test]
    fn news_type_must_be_known() {
        let svc = service();
        let payload = NewsPayload {
            news_type: Some(3),
            news_content_zh: Some("新聞".to_string()),
            news_date: Some("2024-01-01".to_string()),
            ..Default::default()
        };
        assert!(svc.validate_payload(&payload, true).is_err());
    }

    #[test]
    fn content_capped_at_10000() {
        let svc = service();
        let payload = NewsPayload {
            news_type: Some(0),
            news_content_zh: Some("字".repeat(10001)),
            news_date: Some("2024-01-01".to_string()),
            ..Default::default()
        };
        assert!(svc.validate_payload(&payload, true).is_err());
    }
}
