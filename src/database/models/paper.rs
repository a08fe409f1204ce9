use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Paper kind: 0 journal, 1 conference, 2 thesis, 3 monograph, 4 other.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Paper {
    pub paper_id: i64,
    pub research_group_id: Option<i64>,
    pub lab_id: Option<i64>,
    pub paper_date: NaiveDate,
    pub paper_title_zh: Option<String>,
    pub paper_title_en: Option<String>,
    pub paper_desc_zh: Option<String>,
    pub paper_desc_en: Option<String>,
    pub paper_type: i16,
    pub paper_venue: Option<String>,
    pub paper_accept: i16,
    pub paper_file_path: Option<String>,
    pub paper_url: Option<String>,
    pub enable: i16,
    #[serde(skip_serializing)]
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub updated_at: DateTime<Utc>,
}

/// Authorship link with explicit ordering and corresponding-author flag.
/// Rows are replaced wholesale when a paper's author list changes.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PaperAuthor {
    pub paper_id: i64,
    pub mem_id: i64,
    pub author_order: i32,
    pub is_corresponding: i16,
}
