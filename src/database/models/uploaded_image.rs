use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Tracking row for an image uploaded into a markdown description field.
/// Starts unused; flipped to used once its URL appears in saved content.
/// Unused rows past the cleanup cutoff are hard-deleted together with the
/// file on disk.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UploadedImage {
    pub image_id: i64,
    pub filename: String,
    pub file_path: String,
    pub file_url: String,
    pub file_size: i64,
    pub mime_type: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<i64>,
    pub field_name: Option<String>,
    pub is_used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub uploaded_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub updated_at: DateTime<Utc>,
}
