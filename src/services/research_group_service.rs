//! Research group management. Groups belong to the lab; a group's lab
//! follows its leader's lab when a leader is set.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use crate::api::{Page, Pagination};
use crate::database::models::{Lab, Member, ResearchGroup, ENABLED};

use super::{execute_with_audit, validate, Module, OperationType, ServiceError, ServiceResult};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupFilters {
    pub q: Option<String>,
    pub lab_id: Option<i64>,
    #[serde(default)]
    pub show_all: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupPayload {
    pub research_group_name_zh: Option<String>,
    pub research_group_name_en: Option<String>,
    pub research_group_desc_zh: Option<String>,
    pub research_group_desc_en: Option<String>,
    /// Leader member id; explicit null clears the leader on update
    pub mem_id: Option<Option<i64>>,
    pub lab_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupDetail {
    #[serde(flatten)]
    pub group: ResearchGroup,
    pub leader: Option<Member>,
}

pub struct ResearchGroupService {
    pool: PgPool,
}

impl ResearchGroupService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        filters: &GroupFilters,
        pagination: Pagination,
    ) -> ServiceResult<Page<GroupDetail>> {
        let mut count_qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM research_groups WHERE 1=1");
        Self::push_filters(&mut count_qb, filters);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM research_groups WHERE 1=1");
        Self::push_filters(&mut qb, filters);
        qb.push(" ORDER BY created_at DESC");
        if let Some((limit, offset)) = pagination.limit_offset() {
            qb.push(" LIMIT ").push_bind(limit);
            qb.push(" OFFSET ").push_bind(offset);
        }

        let groups = qb
            .build_query_as::<ResearchGroup>()
            .fetch_all(&self.pool)
            .await?;
        let items = self.attach_leaders(groups).await?;

        Ok(Page::new(items, total, pagination))
    }

    pub async fn get(&self, group_id: i64) -> ServiceResult<GroupDetail> {
        let group = self.load_active(group_id).await?;
        let mut items = self.attach_leaders(vec![group]).await?;
        Ok(items.remove(0))
    }

    pub async fn create(&self, payload: GroupPayload, actor: Option<i64>) -> ServiceResult<ResearchGroup> {
        self.validate_payload(&payload, true)?;

        let name_zh = payload
            .research_group_name_zh
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ServiceError::validation("missing required field: research_group_name_zh")
            })?;

        // Leader (if any) determines the lab; otherwise the payload's lab or
        // the active lab is used
        let (leader_id, lab_id) = self.resolve_associations(&payload).await?;

        let content = json!({
            "research_group_name_zh": name_zh,
            "research_group_name_en": payload.research_group_name_en,
            "mem_id": leader_id,
            "lab_id": lab_id,
        });
        let pool = self.pool.clone();

        execute_with_audit(
            &pool,
            Module::ResearchGroup,
            OperationType::Create,
            content,
            actor,
            move |conn: &mut PgConnection| {
                Box::pin(async move {
                    let group = sqlx::query_as::<_, ResearchGroup>(
                        "INSERT INTO research_groups \
                         (lab_id, research_group_name_zh, research_group_name_en, \
                          research_group_desc_zh, research_group_desc_en, mem_id, enable) \
                         VALUES ($1, $2, $3, $4, $5, $6, 1) \
                         RETURNING *",
                    )
                    .bind(lab_id)
                    .bind(&name_zh)
                    .bind(payload.research_group_name_en.as_deref().unwrap_or(""))
                    .bind(payload.research_group_desc_zh.as_deref().unwrap_or(""))
                    .bind(payload.research_group_desc_en.as_deref().unwrap_or(""))
                    .bind(leader_id)
                    .fetch_one(&mut *conn)
                    .await?;

                    Ok(group)
                })
            },
        )
        .await
    }

    pub async fn update(
        &self,
        group_id: i64,
        payload: GroupPayload,
        actor: Option<i64>,
    ) -> ServiceResult<ResearchGroup> {
        let mut group = self.load_active(group_id).await?;
        self.validate_payload(&payload, false)?;

        let mut diff = Map::new();

        set_field(
            &mut diff,
            "research_group_name_zh",
            &mut group.research_group_name_zh,
            &payload.research_group_name_zh,
        );
        set_field(
            &mut diff,
            "research_group_name_en",
            &mut group.research_group_name_en,
            &payload.research_group_name_en,
        );
        set_field(
            &mut diff,
            "research_group_desc_zh",
            &mut group.research_group_desc_zh,
            &payload.research_group_desc_zh,
        );
        set_field(
            &mut diff,
            "research_group_desc_en",
            &mut group.research_group_desc_en,
            &payload.research_group_desc_en,
        );

        // Leader change: validate the new leader and move the group to the
        // leader's lab
        if let Some(new_leader) = payload.mem_id {
            if group.mem_id != new_leader {
                let old_leader = group.mem_id;
                match new_leader {
                    Some(mem_id) => {
                        let member = self.load_active_member(mem_id).await?;
                        group.mem_id = Some(mem_id);
                        if let Some(lab_id) = member.lab_id {
                            if group.lab_id != lab_id {
                                diff.insert(
                                    "lab_id".into(),
                                    json!({ "old": group.lab_id, "new": lab_id }),
                                );
                                group.lab_id = lab_id;
                            }
                        }
                    }
                    None => group.mem_id = None,
                }
                diff.insert("mem_id".into(), json!({ "old": old_leader, "new": new_leader }));
            }
        }

        let pool = self.pool.clone();
        execute_with_audit(
            &pool,
            Module::ResearchGroup,
            OperationType::Update,
            Value::Object(diff),
            actor,
            move |conn: &mut PgConnection| {
                Box::pin(async move {
                    let row = sqlx::query_as::<_, ResearchGroup>(
                        "UPDATE research_groups SET \
                         lab_id = $2, research_group_name_zh = $3, research_group_name_en = $4, \
                         research_group_desc_zh = $5, research_group_desc_en = $6, mem_id = $7, \
                         updated_at = now() \
                         WHERE research_group_id = $1 AND enable = 1 \
                         RETURNING *",
                    )
                    .bind(group.research_group_id)
                    .bind(group.lab_id)
                    .bind(&group.research_group_name_zh)
                    .bind(&group.research_group_name_en)
                    .bind(&group.research_group_desc_zh)
                    .bind(&group.research_group_desc_en)
                    .bind(group.mem_id)
                    .fetch_one(&mut *conn)
                    .await?;

                    Ok(row)
                })
            },
        )
        .await
    }

    pub async fn delete(&self, group_id: i64, actor: Option<i64>) -> ServiceResult<()> {
        let group = self.load_active(group_id).await?;

        // Referential-integrity guard: count active members before delete
        let member_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM members WHERE research_group_id = $1 AND enable = 1",
        )
        .bind(group.research_group_id)
        .fetch_one(&self.pool)
        .await?;

        if member_count > 0 {
            return Err(ServiceError::conflict(format!(
                "research group still has {} active member(s) and cannot be deleted",
                member_count
            )));
        }

        let pool = self.pool.clone();
        execute_with_audit(
            &pool,
            Module::ResearchGroup,
            OperationType::Delete,
            json!({ "deleted_group_id": group_id }),
            actor,
            move |conn: &mut PgConnection| {
                Box::pin(async move {
                    sqlx::query(
                        "UPDATE research_groups SET enable = 0, updated_at = now() \
                         WHERE research_group_id = $1",
                    )
                    .bind(group_id)
                    .execute(&mut *conn)
                    .await?;
                    Ok(())
                })
            },
        )
        .await
    }

    async fn load_active(&self, group_id: i64) -> ServiceResult<ResearchGroup> {
        let group = sqlx::query_as::<_, ResearchGroup>(
            "SELECT * FROM research_groups WHERE research_group_id = $1 AND enable = 1",
        )
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await?;

        group.ok_or_else(|| ServiceError::not_found("research group not found"))
    }

    async fn load_active_member(&self, mem_id: i64) -> ServiceResult<Member> {
        let member =
            sqlx::query_as::<_, Member>("SELECT * FROM members WHERE mem_id = $1 AND enable = 1")
                .bind(mem_id)
                .fetch_optional(&self.pool)
                .await?;

        member.ok_or_else(|| ServiceError::validation("the specified group leader does not exist"))
    }

    async fn resolve_associations(
        &self,
        payload: &GroupPayload,
    ) -> ServiceResult<(Option<i64>, i64)> {
        if let Some(Some(mem_id)) = payload.mem_id {
            let member = self.load_active_member(mem_id).await?;
            if let Some(lab_id) = member.lab_id {
                return Ok((Some(mem_id), lab_id));
            }
        }

        if let Some(lab_id) = payload.lab_id {
            let lab: Option<Lab> =
                sqlx::query_as("SELECT * FROM lab WHERE lab_id = $1 AND enable = 1")
                    .bind(lab_id)
                    .fetch_optional(&self.pool)
                    .await?;
            if lab.is_none() {
                return Err(ServiceError::validation("the specified lab does not exist"));
            }
            return Ok((None, lab_id));
        }

        // Fall back to the active lab
        let lab: Option<Lab> = sqlx::query_as("SELECT * FROM lab WHERE enable = 1 LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;

        match lab {
            Some(lab) => Ok((None, lab.lab_id)),
            None => Err(ServiceError::validation(
                "a lab or a group leader is required to create a research group",
            )),
        }
    }

    fn validate_payload(&self, payload: &GroupPayload, is_create: bool) -> ServiceResult<()> {
        if is_create && payload.research_group_name_zh.as_deref().unwrap_or("").is_empty() {
            return Err(ServiceError::validation(
                "missing required field: research_group_name_zh",
            ));
        }

        for (field, value, max) in [
            ("research_group_name_zh", &payload.research_group_name_zh, 200),
            ("research_group_name_en", &payload.research_group_name_en, 200),
            ("research_group_desc_zh", &payload.research_group_desc_zh, 10000),
            ("research_group_desc_en", &payload.research_group_desc_en, 10000),
        ] {
            if let Some(value) = value {
                validate::check_length(field, value, max)?;
            }
        }

        Ok(())
    }

    async fn attach_leaders(&self, groups: Vec<ResearchGroup>) -> ServiceResult<Vec<GroupDetail>> {
        let leader_ids: Vec<i64> = groups.iter().filter_map(|g| g.mem_id).collect();

        let leaders: Vec<Member> = if leader_ids.is_empty() {
            Vec::new()
        } else {
            sqlx::query_as("SELECT * FROM members WHERE mem_id = ANY($1) AND enable = 1")
                .bind(&leader_ids)
                .fetch_all(&self.pool)
                .await?
        };

        Ok(groups
            .into_iter()
            .map(|group| {
                let leader = group
                    .mem_id
                    .and_then(|id| leaders.iter().find(|m| m.mem_id == id).cloned());
                GroupDetail { group, leader }
            })
            .collect())
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filters: &GroupFilters) {
        if !filters.show_all {
            qb.push(" AND enable = ").push_bind(ENABLED);
        }
        if let Some(q) = filters.q.as_deref().filter(|q| !q.is_empty()) {
            let pattern = format!("%{}%", q);
            qb.push(" AND (research_group_name_zh ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR research_group_name_en ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR research_group_desc_zh ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR research_group_desc_en ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(lab_id) = filters.lab_id {
            qb.push(" AND lab_id = ").push_bind(lab_id);
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

    fn service() -> ResearchGroupService {
        let rt = Box::leak(Box::new(
            tokio::runtime::Runtime::new().expect("tokio runtime"),
        ));
        let pool = rt.block_on(async {
            sqlx::postgres::PgPoolOptions::new()
                .connect_lazy("postgres://localhost/unused")
                .expect("lazy pool")
        });
        ResearchGroupService::new(pool)
    }

    #[test]
    fn create_requires_chinese_name() {
        let svc = service();
        let err = svc
            .validate_payload(&GroupPayload::default(), true)
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn update_does_not_require_name() {
        let svc = service();
        assert!(svc.validate_payload(&GroupPayload::default(), false).is_ok());
    }

    #[test]
    fn description_capped_at_10000_chars() {
        let svc = service();
        let payload = GroupPayload {
            research_group_name_zh: Some("系統組".to_string()),
            research_group_desc_zh: Some("描".repeat(10001)),
            ..Default::default()
        };
        assert!(svc.validate_payload(&payload, true).is_err());
    }
}
