//! Member management: CRUD, batch operations, and the referential-integrity
//! guards that keep group leaders and paper authors from disappearing.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use crate::api::{Page, Pagination};
use crate::database::models::member::{MEM_TYPE_STUDENT, MEM_TYPE_TEACHER};
use crate::database::models::{Member, ResearchGroup, ENABLED};
use crate::files;

use super::audit_service::batch_content;
use super::{execute_with_audit, validate, Module, OperationType, ServiceError, ServiceResult};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberFilters {
    pub q: Option<String>,
    #[serde(rename = "type")]
    pub mem_type: Option<i16>,
    pub research_group_id: Option<i64>,
    pub lab_id: Option<i64>,
    #[serde(default)]
    pub show_all: bool,
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

/// Create/update payload. Every field is optional so updates can re-validate
/// changed fields only; `create` enforces its own required set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberPayload {
    pub mem_name_zh: Option<String>,
    pub mem_name_en: Option<String>,
    pub mem_email: Option<String>,
    pub mem_type: Option<i16>,
    pub job_type: Option<i16>,
    pub student_type: Option<i16>,
    pub student_grade: Option<i16>,
    pub mem_desc_zh: Option<String>,
    pub mem_desc_en: Option<String>,
    pub destination_zh: Option<String>,
    pub destination_en: Option<String>,
    pub research_group_id: Option<i64>,
    /// Path previously returned by the media upload endpoint
    pub mem_avatar_path: Option<String>,
    /// Clear the stored avatar (and delete the file) on update
    #[serde(default)]
    pub mem_avatar_delete: bool,
}

/// Member plus its (active) research group, the shape list/detail reads return.
#[derive(Debug, Clone, Serialize)]
pub struct MemberDetail {
    #[serde(flatten)]
    pub member: Member,
    pub research_group: Option<ResearchGroup>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchDeleteResult {
    pub deleted_count: usize,
    pub total_requested: usize,
    pub failed_members: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchUpdateResult {
    pub updated_count: usize,
    pub total_requested: usize,
    pub failed_members: Vec<String>,
}

/// Fields admins may change through batch update. Anything else is rejected
/// before the transaction starts.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchUpdateFields {
    pub enable: Option<i16>,
    pub mem_type: Option<i16>,
    pub research_group_id: Option<i64>,
    pub job_type: Option<i16>,
    pub student_type: Option<i16>,
}

pub struct MemberService {
    pool: PgPool,
}

impl MemberService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        filters: &MemberFilters,
        pagination: Pagination,
    ) -> ServiceResult<Page<MemberDetail>> {
        let mut count_qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM members WHERE 1=1");
        Self::push_filters(&mut count_qb, filters);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM members WHERE 1=1");
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

        let members = qb.build_query_as::<Member>().fetch_all(&self.pool).await?;
        let items = self.attach_groups(members).await?;

        Ok(Page::new(items, total, pagination))
    }

    pub async fn get(&self, mem_id: i64) -> ServiceResult<MemberDetail> {
        let member = self.load_active(mem_id).await?;
        let mut items = self.attach_groups(vec![member]).await?;
        Ok(items.remove(0))
    }

    pub async fn create(&self, payload: MemberPayload, actor: Option<i64>) -> ServiceResult<Member> {
        self.validate_payload(&payload, true, None)?;

        // Resolve the research group before touching the row; lab follows group
        let group_id = payload
            .research_group_id
            .ok_or_else(|| ServiceError::validation("missing required field: research_group_id"))?;
        let group = self.load_active_group(group_id).await?;

        let content = Self::payload_content(&payload);
        let pool = self.pool.clone();

        execute_with_audit(
            &pool,
            Module::Member,
            OperationType::Create,
            content,
            actor,
            move |conn: &mut PgConnection| {
                Box::pin(async move {
                    let member = sqlx::query_as::<_, Member>(
                        "INSERT INTO members \
                         (mem_avatar_path, mem_name_zh, mem_name_en, mem_desc_zh, mem_desc_en, \
                          mem_email, mem_type, job_type, student_type, student_grade, \
                          destination_zh, destination_en, research_group_id, lab_id, enable) \
                         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, 1) \
                         RETURNING *",
                    )
                    .bind(&payload.mem_avatar_path)
                    .bind(&payload.mem_name_zh)
                    .bind(&payload.mem_name_en)
                    .bind(&payload.mem_desc_zh)
                    .bind(&payload.mem_desc_en)
                    .bind(&payload.mem_email)
                    .bind(payload.mem_type.unwrap_or(MEM_TYPE_TEACHER))
                    .bind(payload.job_type)
                    .bind(payload.student_type)
                    .bind(payload.student_grade)
                    .bind(&payload.destination_zh)
                    .bind(&payload.destination_en)
                    .bind(group.research_group_id)
                    .bind(group.lab_id)
                    .fetch_one(&mut *conn)
                    .await?;

                    Ok(member)
                })
            },
        )
        .await
    }

    pub async fn update(
        &self,
        mem_id: i64,
        payload: MemberPayload,
        actor: Option<i64>,
    ) -> ServiceResult<Member> {
        let current = self.load_active(mem_id).await?;
        self.validate_payload(&payload, false, Some(&current))?;

        let (updated, diff, old_avatar) = self.apply_update(current, &payload).await?;

        let pool = self.pool.clone();
        let row = execute_with_audit(
            &pool,
            Module::Member,
            OperationType::Update,
            Value::Object(diff),
            actor,
            move |conn: &mut PgConnection| Box::pin(async move { persist_member(conn, &updated).await }),
        )
        .await?;

        // Replaced or cleared avatar files go away only after the commit
        if let Some(path) = old_avatar {
            files::delete_file(&path).await;
        }

        Ok(row)
    }

    pub async fn delete(&self, mem_id: i64, actor: Option<i64>) -> ServiceResult<()> {
        let member = self.load_active(mem_id).await?;
        {
            let mut conn = self.pool.acquire().await?;
            check_member_deletable(&mut conn, &member).await?;
        }

        let avatar = member.mem_avatar_path.clone();
        let pool = self.pool.clone();

        execute_with_audit(
            &pool,
            Module::Member,
            OperationType::Delete,
            json!({ "deleted_member_id": mem_id }),
            actor,
            move |conn: &mut PgConnection| {
                Box::pin(async move {
                    soft_delete_member(conn, mem_id).await?;
                    Ok(())
                })
            },
        )
        .await?;

        if let Some(path) = avatar {
            files::delete_file(&path).await;
        }

        Ok(())
    }

    /// Soft-delete a list of members inside one audited transaction. Items
    /// that fail their integrity checks are reported, not fatal; the rest of
    /// the batch still commits.
    pub async fn batch_delete(
        &self,
        member_ids: Vec<i64>,
        actor: Option<i64>,
    ) -> ServiceResult<BatchDeleteResult> {
        if member_ids.is_empty() {
            return Err(ServiceError::validation("no members selected for deletion"));
        }

        let content = batch_content(&member_ids, "delete", json!({}));
        let pool = self.pool.clone();

        let (result, avatars) = execute_with_audit(
            &pool,
            Module::Member,
            OperationType::BatchDelete,
            content,
            actor,
            move |conn: &mut PgConnection| {
                Box::pin(async move {
                    let mut deleted_count = 0;
                    let mut failed_members = Vec::new();
                    let mut avatars = Vec::new();

                    for mem_id in &member_ids {
                        let member = match load_active_member(&mut *conn, *mem_id).await {
                            Ok(m) => m,
                            Err(ServiceError::NotFound(_)) => {
                                failed_members.push(format!("member {} not found", mem_id));
                                continue;
                            }
                            Err(e) => return Err(e),
                        };

                        match check_member_deletable(&mut *conn, &member).await {
                            Ok(()) => {
                                soft_delete_member(&mut *conn, *mem_id).await?;
                                if let Some(path) = member.mem_avatar_path {
                                    avatars.push(path);
                                }
                                deleted_count += 1;
                            }
                            Err(ServiceError::Conflict(reason)) => {
                                failed_members.push(format!("member {}: {}", mem_id, reason));
                            }
                            Err(e) => return Err(e),
                        }
                    }

                    Ok((
                        BatchDeleteResult {
                            deleted_count,
                            total_requested: member_ids.len(),
                            failed_members,
                        },
                        avatars,
                    ))
                })
            },
        )
        .await?;

        for path in avatars {
            files::delete_file(&path).await;
        }

        Ok(result)
    }

    pub async fn batch_update(
        &self,
        member_ids: Vec<i64>,
        fields: BatchUpdateFields,
        actor: Option<i64>,
    ) -> ServiceResult<BatchUpdateResult> {
        if member_ids.is_empty() {
            return Err(ServiceError::validation("no members selected for update"));
        }
        Self::validate_batch_fields(&fields)?;

        let content = batch_content(
            &member_ids,
            "update",
            json!({ "update_fields": Self::batch_fields_content(&fields) }),
        );
        let pool = self.pool.clone();

        execute_with_audit(
            &pool,
            Module::Member,
            OperationType::BatchUpdate,
            content,
            actor,
            move |conn: &mut PgConnection| {
                Box::pin(async move {
                    let mut updated_count = 0;
                    let mut failed_members = Vec::new();

                    for mem_id in &member_ids {
                        match load_active_member(&mut *conn, *mem_id).await {
                            Ok(_) => {
                                apply_batch_fields(&mut *conn, *mem_id, &fields).await?;
                                updated_count += 1;
                            }
                            Err(ServiceError::NotFound(_)) => {
                                failed_members.push(format!("member {} not found", mem_id));
                            }
                            Err(e) => return Err(e),
                        }
                    }

                    Ok(BatchUpdateResult {
                        updated_count,
                        total_requested: member_ids.len(),
                        failed_members,
                    })
                })
            },
        )
        .await
    }

    async fn load_active(&self, mem_id: i64) -> ServiceResult<Member> {
        let member = sqlx::query_as::<_, Member>(
            "SELECT * FROM members WHERE mem_id = $1 AND enable = 1",
        )
        .bind(mem_id)
        .fetch_optional(&self.pool)
        .await?;

        member.ok_or_else(|| ServiceError::not_found("member not found"))
    }

    async fn load_active_group(&self, group_id: i64) -> ServiceResult<ResearchGroup> {
        let group = sqlx::query_as::<_, ResearchGroup>(
            "SELECT * FROM research_groups WHERE research_group_id = $1 AND enable = 1",
        )
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await?;

        group.ok_or_else(|| ServiceError::validation("the specified research group does not exist"))
    }

    async fn attach_groups(&self, members: Vec<Member>) -> ServiceResult<Vec<MemberDetail>> {
        let group_ids: Vec<i64> = members
            .iter()
            .filter_map(|m| m.research_group_id)
            .collect();

        let groups: Vec<ResearchGroup> = if group_ids.is_empty() {
            Vec::new()
        } else {
            sqlx::query_as(
                "SELECT * FROM research_groups WHERE research_group_id = ANY($1) AND enable = 1",
            )
            .bind(&group_ids)
            .fetch_all(&self.pool)
            .await?
        };

        Ok(members
            .into_iter()
            .map(|member| {
                let research_group = member
                    .research_group_id
                    .and_then(|id| groups.iter().find(|g| g.research_group_id == id).cloned());
                MemberDetail {
                    member,
                    research_group,
                }
            })
            .collect())
    }

    /// Apply the payload to a loaded member, collecting `{field: {old, new}}`
    /// diffs for the audit payload. Returns the new row image, the diff, and
    /// an avatar path whose file should be removed after commit.
    async fn apply_update(
        &self,
        mut member: Member,
        payload: &MemberPayload,
    ) -> ServiceResult<(Member, Map<String, Value>, Option<String>)> {
        let mut diff = Map::new();
        let mut stale_avatar = None;

        // Explicit field table: payload field -> member column
        set_string(&mut diff, "mem_name_zh", &mut member.mem_name_zh, &payload.mem_name_zh);
        set_string(&mut diff, "mem_name_en", &mut member.mem_name_en, &payload.mem_name_en);
        set_string(&mut diff, "mem_email", &mut member.mem_email, &payload.mem_email);
        set_string(&mut diff, "mem_desc_zh", &mut member.mem_desc_zh, &payload.mem_desc_zh);
        set_string(&mut diff, "mem_desc_en", &mut member.mem_desc_en, &payload.mem_desc_en);
        set_string(&mut diff, "destination_zh", &mut member.destination_zh, &payload.destination_zh);
        set_string(&mut diff, "destination_en", &mut member.destination_en, &payload.destination_en);
        set_i16(&mut diff, "mem_type", &mut member.mem_type, payload.mem_type);
        set_opt_i16(&mut diff, "job_type", &mut member.job_type, payload.job_type);
        set_opt_i16(&mut diff, "student_type", &mut member.student_type, payload.student_type);
        set_opt_i16(&mut diff, "student_grade", &mut member.student_grade, payload.student_grade);

        if payload.mem_avatar_delete {
            if let Some(old) = member.mem_avatar_path.take() {
                diff.insert("mem_avatar_path".into(), json!({ "old": old, "new": Value::Null }));
                stale_avatar = Some(old);
            }
        } else if let Some(new_path) = &payload.mem_avatar_path {
            if member.mem_avatar_path.as_deref() != Some(new_path) {
                let old = member.mem_avatar_path.replace(new_path.clone());
                diff.insert(
                    "mem_avatar_path".into(),
                    json!({ "old": old, "new": new_path }),
                );
                stale_avatar = old;
            }
        }

        if let Some(new_group_id) = payload.research_group_id {
            if member.research_group_id != Some(new_group_id) {
                let group = self.load_active_group(new_group_id).await?;
                let old_group = member.research_group_id;
                let old_lab = member.lab_id;
                member.research_group_id = Some(new_group_id);
                member.lab_id = Some(group.lab_id);
                diff.insert(
                    "research_group_id".into(),
                    json!({ "old": old_group, "new": new_group_id }),
                );
                diff.insert("lab_id".into(), json!({ "old": old_lab, "new": group.lab_id }));
            }
        }

        Ok((member, diff, stale_avatar))
    }

    fn validate_payload(
        &self,
        payload: &MemberPayload,
        is_create: bool,
        current: Option<&Member>,
    ) -> ServiceResult<()> {
        if is_create {
            let mut missing = Vec::new();
            if payload.mem_name_zh.as_deref().unwrap_or("").is_empty() {
                missing.push("mem_name_zh");
            }
            if payload.mem_name_en.as_deref().unwrap_or("").is_empty() {
                missing.push("mem_name_en");
            }
            if payload.mem_email.as_deref().unwrap_or("").is_empty() {
                missing.push("mem_email");
            }
            if payload.mem_type.is_none() {
                missing.push("mem_type");
            }
            if payload.research_group_id.is_none() {
                missing.push("research_group_id");
            }
            if !missing.is_empty() {
                return Err(ServiceError::validation(format!(
                    "missing required fields: {}",
                    missing.join(", ")
                )));
            }
        }

        if let Some(email) = &payload.mem_email {
            validate::check_email(email)?;
        }

        if let Some(mem_type) = payload.mem_type {
            validate::check_enum("mem_type", mem_type, &[0, 1, 2])?;
        }

        // Cross-field rules resolve against the effective member type
        let effective_type = payload
            .mem_type
            .or(current.map(|m| m.mem_type))
            .unwrap_or(MEM_TYPE_TEACHER);

        if let Some(job_type) = payload.job_type {
            if effective_type != MEM_TYPE_TEACHER {
                return Err(ServiceError::validation("job_type is only valid for teachers"));
            }
            validate::check_enum("job_type", job_type, &[0, 1, 2, 3, 4])?;
        }

        if let Some(student_type) = payload.student_type {
            if effective_type != MEM_TYPE_STUDENT {
                return Err(ServiceError::validation("student_type is only valid for students"));
            }
            validate::check_enum("student_type", student_type, &[0, 1, 2])?;
        }

        for (field, value, max) in [
            ("mem_name_zh", &payload.mem_name_zh, 100),
            ("mem_name_en", &payload.mem_name_en, 100),
            ("mem_desc_zh", &payload.mem_desc_zh, 1000),
            ("mem_desc_en", &payload.mem_desc_en, 1000),
        ] {
            if let Some(value) = value {
                validate::check_length(field, value, max)?;
            }
        }

        Ok(())
    }

    fn validate_batch_fields(fields: &BatchUpdateFields) -> ServiceResult<()> {
        if fields.enable.is_none()
            && fields.mem_type.is_none()
            && fields.research_group_id.is_none()
            && fields.job_type.is_none()
            && fields.student_type.is_none()
        {
            return Err(ServiceError::validation("no fields specified for batch update"));
        }

        if let Some(enable) = fields.enable {
            validate::check_enum("enable", enable, &[0, 1])?;
        }
        if let Some(mem_type) = fields.mem_type {
            validate::check_enum("mem_type", mem_type, &[0, 1, 2])?;
        }
        if let Some(job_type) = fields.job_type {
            validate::check_enum("job_type", job_type, &[0, 1, 2, 3, 4])?;
        }
        if let Some(student_type) = fields.student_type {
            validate::check_enum("student_type", student_type, &[0, 1, 2])?;
        }
        Ok(())
    }

    fn batch_fields_content(fields: &BatchUpdateFields) -> Value {
        let mut map = Map::new();
        if let Some(v) = fields.enable {
            map.insert("enable".into(), v.into());
        }
        if let Some(v) = fields.mem_type {
            map.insert("mem_type".into(), v.into());
        }
        if let Some(v) = fields.research_group_id {
            map.insert("research_group_id".into(), v.into());
        }
        if let Some(v) = fields.job_type {
            map.insert("job_type".into(), v.into());
        }
        if let Some(v) = fields.student_type {
            map.insert("student_type".into(), v.into());
        }
        Value::Object(map)
    }

    fn payload_content(payload: &MemberPayload) -> Value {
        json!({
            "mem_name_zh": payload.mem_name_zh,
            "mem_name_en": payload.mem_name_en,
            "mem_email": payload.mem_email,
            "mem_type": payload.mem_type,
            "job_type": payload.job_type,
            "student_type": payload.student_type,
            "student_grade": payload.student_grade,
            "research_group_id": payload.research_group_id,
        })
    }

    fn sort_column(requested: Option<&str>) -> &'static str {
        match requested {
            Some("mem_name_zh") => "mem_name_zh",
            Some("mem_name_en") => "mem_name_en",
            Some("mem_type") => "mem_type",
            Some("student_grade") => "student_grade",
            Some("updated_at") => "updated_at",
            _ => "created_at",
        }
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filters: &MemberFilters) {
        if !filters.show_all {
            qb.push(" AND enable = ").push_bind(ENABLED);
        }
        if let Some(q) = filters.q.as_deref().filter(|q| !q.is_empty()) {
            let pattern = format!("%{}%", q);
            qb.push(" AND (mem_name_zh ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR mem_name_en ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR mem_email ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(mem_type) = filters.mem_type {
            qb.push(" AND mem_type = ").push_bind(mem_type);
        }
        if let Some(group_id) = filters.research_group_id {
            qb.push(" AND research_group_id = ").push_bind(group_id);
        }
        if let Some(lab_id) = filters.lab_id {
            qb.push(" AND lab_id = ").push_bind(lab_id);
        }
    }
}

/// Deletion guards: an active group led by this member, or any paper
/// authorship, blocks the delete.
async fn check_member_deletable(conn: &mut PgConnection, member: &Member) -> ServiceResult<()> {
    let leading: Option<ResearchGroup> = sqlx::query_as(
        "SELECT * FROM research_groups WHERE mem_id = $1 AND enable = 1 LIMIT 1",
    )
    .bind(member.mem_id)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(group) = leading {
        return Err(ServiceError::conflict(format!(
            "member leads research group \"{}\" and cannot be deleted",
            group.research_group_name_zh.as_deref().unwrap_or("(unnamed)")
        )));
    }

    let paper_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM paper_authors WHERE mem_id = $1")
            .bind(member.mem_id)
            .fetch_one(&mut *conn)
            .await?;

    if paper_count > 0 {
        return Err(ServiceError::conflict(format!(
            "member is an author on {} paper(s) and cannot be deleted",
            paper_count
        )));
    }

    Ok(())
}

async fn load_active_member(conn: &mut PgConnection, mem_id: i64) -> ServiceResult<Member> {
    let member =
        sqlx::query_as::<_, Member>("SELECT * FROM members WHERE mem_id = $1 AND enable = 1")
            .bind(mem_id)
            .fetch_optional(conn)
            .await?;

    member.ok_or_else(|| ServiceError::not_found("member not found"))
}

async fn soft_delete_member(conn: &mut PgConnection, mem_id: i64) -> ServiceResult<()> {
    sqlx::query("UPDATE members SET enable = 0, updated_at = now() WHERE mem_id = $1")
        .bind(mem_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Apply the allow-listed batch fields to one member row.
async fn apply_batch_fields(
    conn: &mut PgConnection,
    mem_id: i64,
    fields: &BatchUpdateFields,
) -> ServiceResult<()> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE members SET updated_at = now()");
    if let Some(enable) = fields.enable {
        qb.push(", enable = ").push_bind(enable);
    }
    if let Some(mem_type) = fields.mem_type {
        qb.push(", mem_type = ").push_bind(mem_type);
    }
    if let Some(group_id) = fields.research_group_id {
        qb.push(", research_group_id = ").push_bind(group_id);
    }
    if let Some(job_type) = fields.job_type {
        qb.push(", job_type = ").push_bind(job_type);
    }
    if let Some(student_type) = fields.student_type {
        qb.push(", student_type = ").push_bind(student_type);
    }
    qb.push(" WHERE mem_id = ").push_bind(mem_id);

    qb.build().execute(conn).await?;
    Ok(())
}

async fn persist_member(conn: &mut PgConnection, member: &Member) -> ServiceResult<Member> {
    let row = sqlx::query_as::<_, Member>(
        "UPDATE members SET \
         mem_avatar_path = $2, mem_name_zh = $3, mem_name_en = $4, mem_desc_zh = $5, \
         mem_desc_en = $6, mem_email = $7, mem_type = $8, job_type = $9, student_type = $10, \
         student_grade = $11, destination_zh = $12, destination_en = $13, \
         research_group_id = $14, lab_id = $15, updated_at = now() \
         WHERE mem_id = $1 AND enable = 1 \
         RETURNING *",
    )
    .bind(member.mem_id)
    .bind(&member.mem_avatar_path)
    .bind(&member.mem_name_zh)
    .bind(&member.mem_name_en)
    .bind(&member.mem_desc_zh)
    .bind(&member.mem_desc_en)
    .bind(&member.mem_email)
    .bind(member.mem_type)
    .bind(member.job_type)
    .bind(member.student_type)
    .bind(member.student_grade)
    .bind(&member.destination_zh)
    .bind(&member.destination_en)
    .bind(member.research_group_id)
    .bind(member.lab_id)
    .fetch_one(conn)
    .await?;

    Ok(row)
}

fn set_string(
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

fn set_i16(diff: &mut Map<String, Value>, field: &str, target: &mut i16, incoming: Option<i16>) {
    if let Some(new_value) = incoming {
        if *target != new_value {
            let old = *target;
            *target = new_value;
            diff.insert(field.to_string(), json!({ "old": old, "new": new_value }));
        }
    }
}

fn set_opt_i16(
    diff: &mut Map<String, Value>,
    field: &str,
    target: &mut Option<i16>,
    incoming: Option<i16>,
) {
    if let Some(new_value) = incoming {
        if *target != Some(new_value) {
            let old = target.replace(new_value);
            diff.insert(field.to_string(), json!({ "old": old, "new": new_value }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn teacher_payload() -> MemberPayload {
        MemberPayload {
            mem_name_zh: Some("張三".to_string()),
            mem_name_en: Some("Zhang San".to_string()),
            mem_email: Some("zhang@lab.example.edu".to_string()),
            mem_type: Some(0),
            research_group_id: Some(1),
            ..Default::default()
        }
    }

    fn service() -> MemberService {
        // Lazy pool: never connects unless a query runs, so validation-only
        // tests can construct the service without a database.
        let rt = Box::leak(Box::new(
            tokio::runtime::Runtime::new().expect("tokio runtime"),
        ));
        let pool = rt.block_on(async {
            sqlx::postgres::PgPoolOptions::new()
                .connect_lazy("postgres://localhost/unused")
                .expect("lazy pool")
        });
        MemberService::new(pool)
    }

    #[test]
    fn create_requires_core_fields() {
        let svc = service();
        let err = svc
            .validate_payload(&MemberPayload::default(), true, None)
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(msg) if msg.contains("mem_name_zh")));
    }

    #[test]
    fn student_cannot_carry_job_type() {
        let svc = service();
        let payload = MemberPayload {
            mem_type: Some(1),
            job_type: Some(0),
            ..teacher_payload()
        };
        let err = svc.validate_payload(&payload, true, None).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(msg) if msg.contains("job_type")));
    }

    #[test]
    fn teacher_cannot_carry_student_type() {
        let svc = service();
        let payload = MemberPayload {
            student_type: Some(0),
            ..teacher_payload()
        };
        assert!(svc.validate_payload(&payload, true, None).is_err());
    }

    #[test]
    fn update_validates_against_existing_type() {
        let svc = service();
        // job_type alone is fine when the stored member is a teacher
        let stored = Member {
            mem_id: 1,
            mem_avatar_path: None,
            mem_name_zh: None,
            mem_name_en: None,
            mem_desc_zh: None,
            mem_desc_en: None,
            mem_email: None,
            mem_type: 0,
            job_type: None,
            student_type: None,
            student_grade: None,
            destination_zh: None,
            destination_en: None,
            research_group_id: None,
            lab_id: None,
            enable: 1,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let payload = MemberPayload {
            job_type: Some(2),
            ..Default::default()
        };
        assert!(svc.validate_payload(&payload, false, Some(&stored)).is_ok());
    }

    #[test]
    fn invalid_email_rejected() {
        let svc = service();
        let payload = MemberPayload {
            mem_email: Some("nope".to_string()),
            ..teacher_payload()
        };
        assert!(svc.validate_payload(&payload, true, None).is_err());
    }

    #[test]
    fn name_length_capped_at_100_chars() {
        let svc = service();
        let payload = MemberPayload {
            mem_name_zh: Some("名".repeat(101)),
            ..teacher_payload()
        };
        assert!(svc.validate_payload(&payload, true, None).is_err());
    }

    #[test]
    fn batch_fields_must_be_allow_listed_values() {
        assert!(MemberService::validate_batch_fields(&BatchUpdateFields::default()).is_err());
        assert!(MemberService::validate_batch_fields(&BatchUpdateFields {
            enable: Some(2),
            ..Default::default()
        })
        .is_err());
        assert!(MemberService::validate_batch_fields(&BatchUpdateFields {
            enable: Some(0),
            mem_type: Some(2),
            ..Default::default()
        })
        .is_ok());
    }

    #[test]
    fn sort_column_is_whitelisted() {
        assert_eq!(MemberService::sort_column(Some("mem_name_zh")), "mem_name_zh");
        assert_eq!(
            MemberService::sort_column(Some("mem_id; DROP TABLE members")),
            "created_at"
        );
        assert_eq!(MemberService::sort_column(None), "created_at");
    }

    #[test]
    fn diff_setters_record_old_and_new() {
        let mut diff = Map::new();
        let mut value = Some("old".to_string());
        set_string(&mut diff, "mem_name_zh", &mut value, &Some("new".to_string()));
        assert_eq!(value.as_deref(), Some("new"));
        assert_eq!(diff["mem_name_zh"]["old"], "old");
        assert_eq!(diff["mem_name_zh"]["new"], "new");

        // Unchanged values leave no diff entry
        let mut diff = Map::new();
        set_string(&mut diff, "mem_name_zh", &mut value, &Some("new".to_string()));
        assert!(diff.is_empty());
    }
}
