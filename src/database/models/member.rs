use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Member kind: 0 = teacher, 1 = student, 2 = alumni.
pub const MEM_TYPE_TEACHER: i16 = 0;
pub const MEM_TYPE_STUDENT: i16 = 1;
pub const MEM_TYPE_ALUMNI: i16 = 2;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Member {
    pub mem_id: i64,
    pub mem_avatar_path: Option<String>,
    pub mem_name_zh: Option<String>,
    pub mem_name_en: Option<String>,
    pub mem_desc_zh: Option<String>,
    pub mem_desc_en: Option<String>,
    pub mem_email: Option<String>,
    pub mem_type: i16,
    /// Teachers only: 0 professor, 1 associate professor, 2 lecturer,
    /// 3 assistant researcher, 4 postdoc
    pub job_type: Option<i16>,
    /// Students only: 0 PhD, 1 master, 2 undergraduate
    pub student_type: Option<i16>,
    pub student_grade: Option<i16>,
    pub destination_zh: Option<String>,
    pub destination_en: Option<String>,
    pub research_group_id: Option<i64>,
    pub lab_id: Option<i64>,
    pub enable: i16,
    #[serde(skip_serializing)]
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub updated_at: DateTime<Utc>,
}
