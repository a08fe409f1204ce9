use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Project {
    pub project_id: i64,
    pub project_url: Option<String>,
    pub project_name_zh: Option<String>,
    pub project_name_en: Option<String>,
    pub project_desc_zh: Option<String>,
    pub project_desc_en: Option<String>,
    pub project_date_start: Option<NaiveDate>,
    pub is_end: i16,
    pub enable: i16,
    #[serde(skip_serializing)]
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub updated_at: DateTime<Utc>,
}
