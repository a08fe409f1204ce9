//! Paper management, including the ordered author list kept in
//! `paper_authors`. Author rows are replaced wholesale whenever a paper's
//! author list changes.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use crate::api::{Page, Pagination};
use crate::database::models::{Lab, Member, Paper, PaperAuthor, ResearchGroup, ENABLED};
use crate::files;

use super::{execute_with_audit, validate, Module, OperationType, ServiceError, ServiceResult};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaperFilters {
    pub q: Option<String>,
    pub paper_type: Option<i16>,
    pub paper_accept: Option<i16>,
    pub start_date: Option<chrono::NaiveDate>,
    pub end_date: Option<chrono::NaiveDate>,
    #[serde(default)]
    pub show_all: bool,
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorEntry {
    pub mem_id: i64,
    #[serde(default)]
    pub is_corresponding: i16,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaperPayload {
    pub paper_title_zh: Option<String>,
    pub paper_title_en: Option<String>,
    pub paper_desc_zh: Option<String>,
    pub paper_desc_en: Option<String>,
    pub paper_venue: Option<String>,
    pub paper_url: Option<String>,
    pub paper_type: Option<i16>,
    pub paper_accept: Option<i16>,
    /// `YYYY-MM-DD`, or a unix timestamp in seconds/milliseconds
    pub paper_date: Option<String>,
    pub research_group_id: Option<i64>,
    /// Path previously returned by the media upload endpoint
    pub paper_file_path: Option<String>,
    #[serde(default)]
    pub paper_file_delete: bool,
    /// Replacement author list; order is the list position
    pub authors: Option<Vec<AuthorEntry>>,
}

/// Author row joined with its member record, ordered by `author_order`.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorDetail {
    #[serde(flatten)]
    pub author: PaperAuthor,
    pub member: Option<Member>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaperDetail {
    #[serde(flatten)]
    pub paper: Paper,
    pub authors: Vec<AuthorDetail>,
}

pub struct PaperService {
    pool: PgPool,
}

impl PaperService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        filters: &PaperFilters,
        pagination: Pagination,
    ) -> ServiceResult<Page<PaperDetail>> {
        let mut count_qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM papers WHERE 1=1");
        Self::push_filters(&mut count_qb, filters);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM papers WHERE 1=1");
        Self::push_filters(&mut qb, filters);

        let sort_column = Self::sort_column(filters.sort_by.as_deref());
        let descending = !matches!(filters.order.as_deref(), Some(o) if o.eq_ignore_ascii_case("asc"));
        qb.push(" ORDER BY ")
            .push(sort_column)
            .push(if descending { " DESC" } else { " ASC" });

        if let Some((limit, offset)) = pagination.limit_offset() {
            qb.push(" LIMIT ").push_bind(limit);
            qb.push(" OFFSET ").push_bind(offset);
        }

        let papers = qb.build_query_as::<Paper>().fetch_all(&self.pool).await?;
        let items = self.attach_authors(papers).await?;

        Ok(Page::new(items, total, pagination))
    }

    pub async fn get(&self, paper_id: i64) -> ServiceResult<PaperDetail> {
        let paper = self.load_active(paper_id).await?;
        let mut items = self.attach_authors(vec![paper]).await?;
        Ok(items.remove(0))
    }

    pub async fn create(&self, payload: PaperPayload, actor: Option<i64>) -> ServiceResult<PaperDetail> {
        self.validate_payload(&payload, true)?;

        let paper_date = match &payload.paper_date {
            Some(raw) => validate::parse_date("paper_date", raw)?,
            None => return Err(ServiceError::validation("missing required field: paper_date")),
        };

        // Papers default onto the active lab and, failing an explicit group,
        // the first active research group
        let lab: Lab = sqlx::query_as("SELECT * FROM lab WHERE enable = 1 LIMIT 1")
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::validation("set up the lab profile first"))?;

        let group_id = match payload.research_group_id {
            Some(id) => {
                let group: Option<ResearchGroup> = sqlx::query_as(
                    "SELECT * FROM research_groups WHERE research_group_id = $1 AND enable = 1",
                )
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
                group.map(|g| g.research_group_id)
            }
            None => {
                let group: Option<ResearchGroup> =
                    sqlx::query_as("SELECT * FROM research_groups WHERE enable = 1 LIMIT 1")
                        .fetch_optional(&self.pool)
                        .await?;
                group.map(|g| g.research_group_id)
            }
        };

        let authors = payload.authors.clone().unwrap_or_default();
        let content = json!({
            "paper_title_zh": payload.paper_title_zh,
            "paper_title_en": payload.paper_title_en,
            "paper_type": payload.paper_type,
            "paper_date": paper_date.to_string(),
            "authors": authors.iter().map(|a| a.mem_id).collect::<Vec<_>>(),
        });

        let pool = self.pool.clone();
        let paper = execute_with_audit(
            &pool,
            Module::Paper,
            OperationType::Create,
            content,
            actor,
            move |conn: &mut PgConnection| {
                Box::pin(async move {
                    let paper = sqlx::query_as::<_, Paper>(
                        "INSERT INTO papers \
                         (research_group_id, lab_id, paper_date, paper_title_zh, paper_title_en, \
                          paper_desc_zh, paper_desc_en, paper_type, paper_venue, paper_accept, \
                          paper_file_path, paper_url, enable) \
                         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 1) \
                         RETURNING *",
                    )
                    .bind(group_id)
                    .bind(lab.lab_id)
                    .bind(paper_date)
                    .bind(&payload.paper_title_zh)
                    .bind(&payload.paper_title_en)
                    .bind(&payload.paper_desc_zh)
                    .bind(&payload.paper_desc_en)
                    .bind(payload.paper_type.unwrap_or(0))
                    .bind(&payload.paper_venue)
                    .bind(payload.paper_accept.unwrap_or(0))
                    .bind(&payload.paper_file_path)
                    .bind(&payload.paper_url)
                    .fetch_one(&mut *conn)
                    .await?;

                    replace_authors(&mut *conn, paper.paper_id, &authors).await?;

                    Ok(paper)
                })
            },
        )
        .await?;

        self.get(paper.paper_id).await
    }

    pub async fn update(
        &self,
        paper_id: i64,
        payload: PaperPayload,
        actor: Option<i64>,
    ) -> ServiceResult<PaperDetail> {
        let mut paper = self.load_active(paper_id).await?;
        self.validate_payload(&payload, false)?;

        let mut diff = Map::new();
        let mut stale_file = None;

        set_field(&mut diff, "paper_title_zh", &mut paper.paper_title_zh, &payload.paper_title_zh);
        set_field(&mut diff, "paper_title_en", &mut paper.paper_title_en, &payload.paper_title_en);
        set_field(&mut diff, "paper_desc_zh", &mut paper.paper_desc_zh, &payload.paper_desc_zh);
        set_field(&mut diff, "paper_desc_en", &mut paper.paper_desc_en, &payload.paper_desc_en);
        set_field(&mut diff, "paper_venue", &mut paper.paper_venue, &payload.paper_venue);
        set_field(&mut diff, "paper_url", &mut paper.paper_url, &payload.paper_url);

        if let Some(paper_type) = payload.paper_type {
            if paper.paper_type != paper_type {
                diff.insert("paper_type".into(), json!({ "old": paper.paper_type, "new": paper_type }));
                paper.paper_type = paper_type;
            }
        }
        if let Some(paper_accept) = payload.paper_accept {
            if paper.paper_accept != paper_accept {
                diff.insert(
                    "paper_accept".into(),
                    json!({ "old": paper.paper_accept, "new": paper_accept }),
                );
                paper.paper_accept = paper_accept;
            }
        }

        if let Some(raw) = &payload.paper_date {
            let new_date = validate::parse_date("paper_date", raw)?;
            if paper.paper_date != new_date {
                diff.insert(
                    "paper_date".into(),
                    json!({ "old": paper.paper_date.to_string(), "new": new_date.to_string() }),
                );
                paper.paper_date = new_date;
            }
        }

        if payload.paper_file_delete {
            if let Some(old) = paper.paper_file_path.take() {
                diff.insert("paper_file_path".into(), json!({ "old": old, "new": Value::Null }));
                stale_file = Some(old);
            }
        } else if let Some(new_path) = &payload.paper_file_path {
            if paper.paper_file_path.as_deref() != Some(new_path) {
                let old = paper.paper_file_path.replace(new_path.clone());
                diff.insert("paper_file_path".into(), json!({ "old": old, "new": new_path }));
                stale_file = old;
            }
        }

        if let Some(new_group_id) = payload.research_group_id {
            if paper.research_group_id != Some(new_group_id) {
                let group: Option<ResearchGroup> = sqlx::query_as(
                    "SELECT * FROM research_groups WHERE research_group_id = $1 AND enable = 1",
                )
                .bind(new_group_id)
                .fetch_optional(&self.pool)
                .await?;
                if group.is_some() {
                    diff.insert(
                        "research_group_id".into(),
                        json!({ "old": paper.research_group_id, "new": new_group_id }),
                    );
                    paper.research_group_id = Some(new_group_id);
                }
            }
        }

        let authors = payload.authors.clone();
        if let Some(authors) = &authors {
            diff.insert(
                "authors".into(),
                Value::Array(authors.iter().map(|a| json!(a.mem_id)).collect()),
            );
        }

        let pool = self.pool.clone();
        execute_with_audit(
            &pool,
            Module::Paper,
            OperationType::Update,
            Value::Object(diff),
            actor,
            move |conn: &mut PgConnection| {
                Box::pin(async move {
                    sqlx::query(
                        "UPDATE papers SET \
                         research_group_id = $2, paper_date = $3, paper_title_zh = $4, \
                         paper_title_en = $5, paper_desc_zh = $6, paper_desc_en = $7, \
                         paper_type = $8, paper_venue = $9, paper_accept = $10, \
                         paper_file_path = $11, paper_url = $12, updated_at = now() \
                         WHERE paper_id = $1 AND enable = 1",
                    )
                    .bind(paper.paper_id)
                    .bind(paper.research_group_id)
                    .bind(paper.paper_date)
                    .bind(&paper.paper_title_zh)
                    .bind(&paper.paper_title_en)
                    .bind(&paper.paper_desc_zh)
                    .bind(&paper.paper_desc_en)
                    .bind(paper.paper_type)
                    .bind(&paper.paper_venue)
                    .bind(paper.paper_accept)
                    .bind(&paper.paper_file_path)
                    .bind(&paper.paper_url)
                    .execute(&mut *conn)
                    .await?;

                    if let Some(authors) = &authors {
                        replace_authors(&mut *conn, paper.paper_id, authors).await?;
                    }

                    Ok(())
                })
            },
        )
        .await?;

        if let Some(path) = stale_file {
            files::delete_file(&path).await;
        }

        self.get(paper_id).await
    }

    pub async fn delete(&self, paper_id: i64, actor: Option<i64>) -> ServiceResult<()> {
        self.load_active(paper_id).await?;

        let pool = self.pool.clone();
        execute_with_audit(
            &pool,
            Module::Paper,
            OperationType::Delete,
            json!({ "deleted_paper_id": paper_id }),
            actor,
            move |conn: &mut PgConnection| {
                Box::pin(async move {
                    sqlx::query("UPDATE papers SET enable = 0, updated_at = now() WHERE paper_id = $1")
                        .bind(paper_id)
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            },
        )
        .await
    }

    async fn load_active(&self, paper_id: i64) -> ServiceResult<Paper> {
        let paper =
            sqlx::query_as::<_, Paper>("SELECT * FROM papers WHERE paper_id = $1 AND enable = 1")
                .bind(paper_id)
                .fetch_optional(&self.pool)
                .await?;

        paper.ok_or_else(|| ServiceError::not_found("paper not found"))
    }

    fn validate_payload(&self, payload: &PaperPayload, is_create: bool) -> ServiceResult<()> {
        if is_create
            && payload.paper_title_zh.as_deref().unwrap_or("").is_empty()
            && payload.paper_title_en.as_deref().unwrap_or("").is_empty()
        {
            return Err(ServiceError::validation("a paper title is required"));
        }

        if let Some(paper_type) = payload.paper_type {
            validate::check_enum("paper_type", paper_type, &[0, 1, 2, 3, 4])?;
        }
        if let Some(paper_accept) = payload.paper_accept {
            validate::check_enum("paper_accept", paper_accept, &[0, 1])?;
        }

        for (field, value, max) in [
            ("paper_title_zh", &payload.paper_title_zh, 500),
            ("paper_title_en", &payload.paper_title_en, 500),
            ("paper_desc_zh", &payload.paper_desc_zh, 1000),
            ("paper_desc_en", &payload.paper_desc_en, 1000),
            ("paper_venue", &payload.paper_venue, 500),
            ("paper_url", &payload.paper_url, 1000),
        ] {
            if let Some(value) = value {
                validate::check_length(field, value, max)?;
            }
        }

        if let Some(raw) = &payload.paper_date {
            validate::parse_date("paper_date", raw)?;
        }

        Ok(())
    }

    async fn attach_authors(&self, papers: Vec<Paper>) -> ServiceResult<Vec<PaperDetail>> {
        let paper_ids: Vec<i64> = papers.iter().map(|p| p.paper_id).collect();
        if paper_ids.is_empty() {
            return Ok(Vec::new());
        }

        let author_rows: Vec<PaperAuthor> = sqlx::query_as(
            "SELECT * FROM paper_authors WHERE paper_id = ANY($1) ORDER BY author_order",
        )
        .bind(&paper_ids)
        .fetch_all(&self.pool)
        .await?;

        let member_ids: Vec<i64> = author_rows.iter().map(|a| a.mem_id).collect();
        let members: Vec<Member> = if member_ids.is_empty() {
            Vec::new()
        } else {
            sqlx::query_as("SELECT * FROM members WHERE mem_id = ANY($1)")
                .bind(&member_ids)
                .fetch_all(&self.pool)
                .await?
        };

        Ok(papers
            .into_iter()
            .map(|paper| {
                let authors = author_rows
                    .iter()
                    .filter(|a| a.paper_id == paper.paper_id)
                    .map(|a| AuthorDetail {
                        author: a.clone(),
                        member: members.iter().find(|m| m.mem_id == a.mem_id).cloned(),
                    })
                    .collect();
                PaperDetail { paper, authors }
            })
            .collect())
    }

    fn sort_column(requested: Option<&str>) -> &'static str {
        match requested {
            Some("created_at") => "created_at",
            Some("updated_at") => "updated_at",
            Some("paper_title_zh") => "paper_title_zh",
            Some("paper_title_en") => "paper_title_en",
            Some("paper_type") => "paper_type",
            _ => "paper_date",
        }
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filters: &PaperFilters) {
        if !filters.show_all {
            qb.push(" AND enable = ").push_bind(ENABLED);
        }
        if let Some(q) = filters.q.as_deref().filter(|q| !q.is_empty()) {
            let pattern = format!("%{}%", q);
            qb.push(" AND (paper_title_zh ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR paper_title_en ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR paper_venue ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(paper_type) = filters.paper_type {
            qb.push(" AND paper_type = ").push_bind(paper_type);
        }
        if let Some(paper_accept) = filters.paper_accept {
            qb.push(" AND paper_accept = ").push_bind(paper_accept);
        }
        if let Some(start) = filters.start_date {
            qb.push(" AND paper_date >= ").push_bind(start);
        }
        if let Some(end) = filters.end_date {
            qb.push(" AND paper_date <= ").push_bind(end);
        }
    }
}

/// Replace the full author set for a paper. Unknown or disabled members are
/// skipped rather than failing the write; order is the list position.
async fn replace_authors(
    conn: &mut PgConnection,
    paper_id: i64,
    authors: &[AuthorEntry],
) -> ServiceResult<()> {
    sqlx::query("DELETE FROM paper_authors WHERE paper_id = $1")
        .bind(paper_id)
        .execute(&mut *conn)
        .await?;

    let mut order = 1i32;
    for entry in authors {
        let exists: Option<i64> =
            sqlx::query_scalar("SELECT mem_id FROM members WHERE mem_id = $1 AND enable = 1")
                .bind(entry.mem_id)
                .fetch_optional(&mut *conn)
                .await?;
        if exists.is_none() {
            continue;
        }

        sqlx::query(
            "INSERT INTO paper_authors (paper_id, mem_id, author_order, is_corresponding) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(paper_id)
        .bind(entry.mem_id)
        .bind(order)
        .bind(if entry.is_corresponding == 1 { 1i16 } else { 0i16 })
        .execute(&mut *conn)
        .await?;
        order += 1;
    }

    Ok(())
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

    fn service() -> PaperService {
        let rt = Box::leak(Box::new(
            tokio::runtime::Runtime::new().expect("tokio runtime"),
        ));
        let pool = rt.block_on(async {
            sqlx::postgres::PgPoolOptions::new()
                .connect_lazy("postgres://localhost/unused")
                .expect("lazy pool")
        });
        PaperService::new(pool)
    }

    #[test]
    fn create_requires_some_title() {
        let svc = service();
        assert!(svc.validate_payload(&PaperPayload::default(), true).is_err());

        let with_en = PaperPayload {
            paper_title_en: Some("A Study".to_string()),
            ..Default::default()
        };
        assert!(svc.validate_payload(&with_en, true).is_ok());
    }

    #[test]
    fn paper_type_range_is_enforced() {
        let svc = service();
        let payload = PaperPayload {
            paper_title_zh: Some("研究".to_string()),
            paper_type: Some(5),
            ..Default::default()
        };
        assert!(svc.validate_payload(&payload, true).is_err());
    }

    #[test]
    fn malformed_date_is_rejected() {
        let svc = service();
        let payload = PaperPayload {
            paper_title_zh: Some("研究".to_string()),
            paper_date: Some("2024/01/01".to_string()),
            ..Default::default()
        };
        assert!(svc.validate_payload(&payload, true).is_err());
    }

    #[test]
    fn sort_column_is_whitelisted() {
        assert_eq!(PaperService::sort_column(Some("paper_title_zh")), "paper_title_zh");
        assert_eq!(PaperService::sort_column(Some("paper_id; --")), "paper_date");
        assert_eq!(PaperService::sort_column(None), "paper_date");
    }
}
