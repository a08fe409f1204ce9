use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// News kind: 0 publication, 1 award, 2 academic activity.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct News {
    pub news_id: i64,
    pub news_type: i16,
    pub news_content_zh: Option<String>,
    pub news_content_en: Option<String>,
    pub news_date: Option<NaiveDate>,
    pub enable: i16,
    #[serde(skip_serializing)]
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub updated_at: DateTime<Utc>,
}
