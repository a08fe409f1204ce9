//! Audit log: one immutable record per successful mutating service call,
//! tagged by module and operation type. Records are written inside the
//! caller's transaction by [`insert_record`]; they are never updated or
//! deleted through the application.

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use crate::api::{Page, Pagination};
use crate::database::models::EditRecord;

use super::{ServiceError, ServiceResult};

/// Fixed integer enumeration identifying which entity type an audit record
/// or permission check pertains to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Module {
    Admin,
    Lab,
    ResearchGroup,
    Member,
    Paper,
    News,
    Project,
    Media,
    ImageUpload,
    Resource,
}

impl Module {
    pub fn id(self) -> i32 {
        match self {
            Module::Admin => 0,
            Module::Lab => 1,
            Module::ResearchGroup => 2,
            Module::Member => 3,
            Module::Paper => 4,
            Module::News => 5,
            Module::Project => 6,
            Module::Media => 7,
            Module::ImageUpload => 8,
            Module::Resource => 9,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Module::Admin => "admin",
            Module::Lab => "lab",
            Module::ResearchGroup => "research_group",
            Module::Member => "member",
            Module::Paper => "paper",
            Module::News => "news",
            Module::Project => "project",
            Module::Media => "media",
            Module::ImageUpload => "image_upload",
            Module::Resource => "resource",
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            0 => Some(Module::Admin),
            1 => Some(Module::Lab),
            2 => Some(Module::ResearchGroup),
            3 => Some(Module::Member),
            4 => Some(Module::Paper),
            5 => Some(Module::News),
            6 => Some(Module::Project),
            7 => Some(Module::Media),
            8 => Some(Module::ImageUpload),
            9 => Some(Module::Resource),
            _ => None,
        }
    }
}

/// Operation tags stored in `edit_records.edit_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    Create,
    Update,
    Delete,
    Login,
    Logout,
    ChangePassword,
    BatchCreate,
    BatchUpdate,
    BatchDelete,
    Upload,
    Download,
    Export,
}

impl OperationType {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationType::Create => "CREATE",
            OperationType::Update => "UPDATE",
            OperationType::Delete => "DELETE",
            OperationType::Login => "LOGIN",
            OperationType::Logout => "LOGOUT",
            OperationType::ChangePassword => "CHANGE_PASSWORD",
            OperationType::BatchCreate => "BATCH_CREATE",
            OperationType::BatchUpdate => "BATCH_UPDATE",
            OperationType::BatchDelete => "BATCH_DELETE",
            OperationType::Upload => "UPLOAD",
            OperationType::Download => "DOWNLOAD",
            OperationType::Export => "EXPORT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "CREATE" => Some(OperationType::Create),
            "UPDATE" => Some(OperationType::Update),
            "DELETE" => Some(OperationType::Delete),
            "LOGIN" => Some(OperationType::Login),
            "LOGOUT" => Some(OperationType::Logout),
            "CHANGE_PASSWORD" => Some(OperationType::ChangePassword),
            "BATCH_CREATE" => Some(OperationType::BatchCreate),
            "BATCH_UPDATE" => Some(OperationType::BatchUpdate),
            "BATCH_DELETE" => Some(OperationType::BatchDelete),
            "UPLOAD" => Some(OperationType::Upload),
            "DOWNLOAD" => Some(OperationType::Download),
            "EXPORT" => Some(OperationType::Export),
            _ => None,
        }
    }
}

/// Append one audit record on the caller's transaction connection. Called by
/// `execute_with_audit`; failure here rolls the whole transaction back.
pub async fn insert_record(
    conn: &mut PgConnection,
    admin_id: Option<i64>,
    operation: OperationType,
    module: Module,
    content: &Value,
) -> ServiceResult<()> {
    sqlx::query(
        "INSERT INTO edit_records (admin_id, edit_type, edit_module, edit_content) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(admin_id)
    .bind(operation.as_str())
    .bind(module.id())
    .bind(content)
    .execute(conn)
    .await?;

    Ok(())
}

/// Cap on how many item ids a batch audit payload records verbatim.
pub const BATCH_CONTENT_LIMIT: usize = 50;

/// Build the content payload for a batch operation, truncating the item list
/// so a huge batch does not bloat the log.
pub fn batch_content(ids: &[i64], operation: &str, extra: Value) -> Value {
    let mut content = serde_json::json!({
        "batch_operation": true,
        "operation": operation,
        "items_count": ids.len(),
        "items": &ids[..ids.len().min(BATCH_CONTENT_LIMIT)],
    });
    if ids.len() > BATCH_CONTENT_LIMIT {
        content["total_items"] = Value::from(ids.len());
    }
    if let (Some(obj), Value::Object(extra)) = (content.as_object_mut(), extra) {
        obj.extend(extra);
    }
    content
}

/// Filters accepted by the audit record listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditFilters {
    pub admin_id: Option<i64>,
    pub edit_module: Option<i32>,
    pub edit_type: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

pub struct AuditService {
    pool: PgPool,
}

impl AuditService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List audit records, newest first.
    pub async fn records(
        &self,
        filters: &AuditFilters,
        pagination: Pagination,
    ) -> ServiceResult<Page<EditRecord>> {
        if let Some(edit_type) = &filters.edit_type {
            if OperationType::parse(edit_type).is_none() {
                return Err(ServiceError::validation("unknown operation type"));
            }
        }

        let mut count_qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM edit_records WHERE 1=1");
        Self::push_filters(&mut count_qb, filters);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM edit_records WHERE 1=1");
        Self::push_filters(&mut qb, filters);
        qb.push(" ORDER BY edit_date DESC");
        if let Some((limit, offset)) = pagination.limit_offset() {
            qb.push(" LIMIT ").push_bind(limit);
            qb.push(" OFFSET ").push_bind(offset);
        }

        let items = qb
            .build_query_as::<EditRecord>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(items, total, pagination))
    }

    pub async fn record(&self, edit_id: i64) -> ServiceResult<EditRecord> {
        let record = sqlx::query_as::<_, EditRecord>(
            "SELECT * FROM edit_records WHERE edit_id = $1",
        )
        .bind(edit_id)
        .fetch_optional(&self.pool)
        .await?;

        record.ok_or_else(|| ServiceError::not_found("audit record not found"))
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filters: &AuditFilters) {
        if let Some(admin_id) = filters.admin_id {
            qb.push(" AND admin_id = ").push_bind(admin_id);
        }
        if let Some(module) = filters.edit_module {
            qb.push(" AND edit_module = ").push_bind(module);
        }
        if let Some(edit_type) = &filters.edit_type {
            qb.push(" AND edit_type = ")
                .push_bind(edit_type.to_ascii_uppercase());
        }
        if let Some(start) = filters.start_date {
            qb.push(" AND edit_date >= ")
                .push_bind(start.and_hms_opt(0, 0, 0).unwrap().and_utc());
        }
        if let Some(end) = filters.end_date {
            // Inclusive of the entire end day
            qb.push(" AND edit_date < ")
                .push_bind((end + chrono::Days::new(1)).and_hms_opt(0, 0, 0).unwrap().and_utc());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_ids_are_stable() {
        assert_eq!(Module::Admin.id(), 0);
        assert_eq!(Module::Lab.id(), 1);
        assert_eq!(Module::ResearchGroup.id(), 2);
        assert_eq!(Module::Member.id(), 3);
        assert_eq!(Module::Paper.id(), 4);
        assert_eq!(Module::News.id(), 5);
        assert_eq!(Module::Project.id(), 6);
        assert_eq!(Module::Media.id(), 7);
        assert_eq!(Module::ImageUpload.id(), 8);
        assert_eq!(Module::Resource.id(), 9);
    }

    #[test]
    fn module_round_trips_through_id() {
        for id in 0..10 {
            let module = Module::from_id(id).expect("known id");
            assert_eq!(module.id(), id);
        }
        assert!(Module::from_id(10).is_none());
    }

    #[test]
    fn operation_tags_round_trip() {
        let ops = [
            OperationType::Create,
            OperationType::Update,
            OperationType::Delete,
            OperationType::Login,
            OperationType::Logout,
            OperationType::ChangePassword,
            OperationType::BatchCreate,
            OperationType::BatchUpdate,
            OperationType::BatchDelete,
            OperationType::Upload,
            OperationType::Download,
            OperationType::Export,
        ];
        for op in ops {
            assert_eq!(OperationType::parse(op.as_str()), Some(op));
        }
        assert_eq!(OperationType::parse("delete"), Some(OperationType::Delete));
        assert!(OperationType::parse("DROP").is_none());
    }

    #[test]
    fn batch_content_truncates_large_id_lists() {
        let ids: Vec<i64> = (0..120).collect();
        let content = batch_content(&ids, "delete", serde_json::json!({}));
        assert_eq!(content["items_count"], 120);
        assert_eq!(content["items"].as_array().unwrap().len(), BATCH_CONTENT_LIMIT);
        assert_eq!(content["total_items"], 120);

        let few: Vec<i64> = vec![1, 2];
        let content = batch_content(&few, "update", serde_json::json!({"fields": ["enable"]}));
        assert_eq!(content["items"].as_array().unwrap().len(), 2);
        assert!(content.get("total_items").is_none());
        assert_eq!(content["fields"][0], "enable");
    }
}
