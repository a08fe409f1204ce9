use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Administrator account. The password hash never leaves the server; it is
/// skipped during serialization.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Admin {
    pub admin_id: i64,
    pub is_super: i16,
    pub admin_name: String,
    #[serde(skip_serializing)]
    pub admin_pass: String,
    pub enable: i16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
