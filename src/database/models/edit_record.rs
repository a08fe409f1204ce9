use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Append-only audit record: who changed what, when, tagged by module and
/// operation type. Never updated or deleted through the application.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct EditRecord {
    pub edit_id: i64,
    /// Nullable for system-initiated operations
    pub admin_id: Option<i64>,
    pub edit_type: String,
    pub edit_module: i32,
    pub edit_content: Option<serde_json::Value>,
    pub edit_date: DateTime<Utc>,
}
