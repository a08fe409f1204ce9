use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Shared lab resource. Type: 0 equipment, 1 software, 2 database, 3 other.
/// Availability: 0 unavailable, 1 available, 2 under maintenance.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Resource {
    pub resource_id: i64,
    pub resource_name_zh: String,
    pub resource_name_en: Option<String>,
    pub resource_description_zh: Option<String>,
    pub resource_description_en: Option<String>,
    pub resource_type: i16,
    pub resource_location_zh: Option<String>,
    pub resource_location_en: Option<String>,
    pub resource_url: Option<String>,
    pub resource_file: Option<String>,
    pub resource_image: Option<String>,
    pub availability_status: i16,
    pub contact_info: Option<String>,
    pub enable: i16,
    #[serde(skip_serializing)]
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub updated_at: DateTime<Utc>,
}
