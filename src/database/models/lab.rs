use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Laboratory profile. The site manages a single active lab row; the first
/// update creates it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Lab {
    pub lab_id: i64,
    pub lab_logo_path: Option<String>,
    pub lab_zh: Option<String>,
    pub lab_en: Option<String>,
    pub lab_desc_zh: Option<String>,
    pub lab_desc_en: Option<String>,
    pub lab_address_zh: Option<String>,
    pub lab_address_en: Option<String>,
    pub lab_email: Option<String>,
    pub lab_phone: Option<String>,
    pub enable: i16,
    #[serde(skip_serializing)]
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub updated_at: DateTime<Utc>,
}
