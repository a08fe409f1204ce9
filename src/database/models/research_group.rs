use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ResearchGroup {
    pub research_group_id: i64,
    pub lab_id: i64,
    pub research_group_name_zh: Option<String>,
    pub research_group_name_en: Option<String>,
    pub research_group_desc_zh: Option<String>,
    pub research_group_desc_en: Option<String>,
    /// Group leader; nullable back-reference to members
    pub mem_id: Option<i64>,
    pub enable: i16,
    #[serde(skip_serializing)]
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub updated_at: DateTime<Utc>,
}
