//! Lab profile management. The site keeps a single active lab row; the first
//! update creates it, and deletion is blocked while groups or members still
//! reference it.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sqlx::{PgConnection, PgPool};

use crate::database::models::Lab;
use crate::files;

use super::{execute_with_audit, validate, Module, OperationType, ServiceError, ServiceResult};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabPayload {
    pub lab_zh: Option<String>,
    pub lab_en: Option<String>,
    pub lab_desc_zh: Option<String>,
    pub lab_desc_en: Option<String>,
    pub lab_address_zh: Option<String>,
    pub lab_address_en: Option<String>,
    pub lab_email: Option<String>,
    pub lab_phone: Option<String>,
    /// Path previously returned by the media upload endpoint
    pub lab_logo_path: Option<String>,
    #[serde(default)]
    pub lab_logo_delete: bool,
}

/// Placeholder profile served before the lab row exists.
#[derive(Debug, Clone, Serialize)]
pub struct DefaultLabInfo {
    pub lab_id: Option<i64>,
    pub lab_logo_path: Option<String>,
    pub lab_zh: String,
    pub lab_en: String,
    pub lab_desc_zh: String,
    pub lab_desc_en: String,
    pub lab_address_zh: String,
    pub lab_address_en: String,
    pub lab_email: String,
    pub lab_phone: String,
    pub enable: i16,
}

impl Default for DefaultLabInfo {
    fn default() -> Self {
        Self {
            lab_id: None,
            lab_logo_path: None,
            lab_zh: "實驗室".to_string(),
            lab_en: "Laboratory".to_string(),
            lab_desc_zh: "請在管理後台設置實驗室信息".to_string(),
            lab_desc_en: "Please set lab information in the admin panel".to_string(),
            lab_address_zh: String::new(),
            lab_address_en: String::new(),
            lab_email: String::new(),
            lab_phone: String::new(),
            enable: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum LabInfo {
    Stored(Lab),
    Default(DefaultLabInfo),
}

pub struct LabService {
    pool: PgPool,
}

impl LabService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_info(&self) -> ServiceResult<LabInfo> {
        match self.load_active().await? {
            Some(lab) => Ok(LabInfo::Stored(lab)),
            None => Ok(LabInfo::Default(DefaultLabInfo::default())),
        }
    }

    /// Update the lab profile; creates the row on first write. Audited as
    /// CREATE or UPDATE accordingly.
    pub async fn update_info(&self, payload: LabPayload, actor: Option<i64>) -> ServiceResult<Lab> {
        self.validate_payload(&payload)?;

        let current = self.load_active().await?;
        let is_create = current.is_none();

        let (lab, diff, stale_logo) = match current {
            Some(lab) => Self::apply_update(lab, &payload),
            None => {
                let content = Self::creation_content(&payload);
                (Self::fresh_lab(&payload), content, None)
            }
        };

        let operation = if is_create {
            OperationType::Create
        } else {
            OperationType::Update
        };

        let pool = self.pool.clone();
        let row = execute_with_audit(
            &pool,
            Module::Lab,
            operation,
            Value::Object(diff),
            actor,
            move |conn: &mut PgConnection| {
                Box::pin(async move {
                    let row = if is_create {
                        sqlx::query_as::<_, Lab>(
                            "INSERT INTO lab \
                             (lab_logo_path, lab_zh, lab_en, lab_desc_zh, lab_desc_en, \
                              lab_address_zh, lab_address_en, lab_email, lab_phone, enable) \
                             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 1) \
                             RETURNING *",
                        )
                        .bind(&lab.lab_logo_path)
                        .bind(&lab.lab_zh)
                        .bind(&lab.lab_en)
                        .bind(&lab.lab_desc_zh)
                        .bind(&lab.lab_desc_en)
                        .bind(&lab.lab_address_zh)
                        .bind(&lab.lab_address_en)
                        .bind(&lab.lab_email)
                        .bind(&lab.lab_phone)
                        .fetch_one(&mut *conn)
                        .await?
                    } else {
                        sqlx::query_as::<_, Lab>(
                            "UPDATE lab SET \
                             lab_logo_path = $2, lab_zh = $3, lab_en = $4, lab_desc_zh = $5, \
                             lab_desc_en = $6, lab_address_zh = $7, lab_address_en = $8, \
                             lab_email = $9, lab_phone = $10, updated_at = now() \
                             WHERE lab_id = $1 AND enable = 1 \
                             RETURNING *",
                        )
                        .bind(lab.lab_id)
                        .bind(&lab.lab_logo_path)
                        .bind(&lab.lab_zh)
                        .bind(&lab.lab_en)
                        .bind(&lab.lab_desc_zh)
                        .bind(&lab.lab_desc_en)
                        .bind(&lab.lab_address_zh)
                        .bind(&lab.lab_address_en)
                        .bind(&lab.lab_email)
                        .bind(&lab.lab_phone)
                        .fetch_one(&mut *conn)
                        .await?
                    };

                    Ok(row)
                })
            },
        )
        .await?;

        if let Some(path) = stale_logo {
            files::delete_file(&path).await;
        }

        Ok(row)
    }

    pub async fn delete(&self, actor: Option<i64>) -> ServiceResult<()> {
        let lab = self
            .load_active()
            .await?
            .ok_or_else(|| ServiceError::not_found("lab not found"))?;

        // Guards run before the transaction: active groups first, then members
        let group_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM research_groups WHERE lab_id = $1 AND enable = 1",
        )
        .bind(lab.lab_id)
        .fetch_one(&self.pool)
        .await?;
        if group_count > 0 {
            return Err(ServiceError::conflict(format!(
                "lab still has {} active research group(s) and cannot be deleted",
                group_count
            )));
        }

        let member_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM members WHERE lab_id = $1 AND enable = 1")
                .bind(lab.lab_id)
                .fetch_one(&self.pool)
                .await?;
        if member_count > 0 {
            return Err(ServiceError::conflict(format!(
                "lab still has {} active member(s) and cannot be deleted",
                member_count
            )));
        }

        let lab_id = lab.lab_id;
        let logo = lab.lab_logo_path.clone();
        let pool = self.pool.clone();

        execute_with_audit(
            &pool,
            Module::Lab,
            OperationType::Delete,
            json!({ "deleted_lab_id": lab_id }),
            actor,
            move |conn: &mut PgConnection| {
                Box::pin(async move {
                    sqlx::query("UPDATE lab SET enable = 0, updated_at = now() WHERE lab_id = $1")
                        .bind(lab_id)
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            },
        )
        .await?;

        if let Some(path) = logo {
            files::delete_file(&path).await;
        }

        Ok(())
    }

    async fn load_active(&self) -> ServiceResult<Option<Lab>> {
        let lab = sqlx::query_as::<_, Lab>("SELECT * FROM lab WHERE enable = 1 LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(lab)
    }

    fn validate_payload(&self, payload: &LabPayload) -> ServiceResult<()> {
        if let Some(email) = &payload.lab_email {
            validate::check_email(email)?;
        }

        for (field, value, max) in [
            ("lab_zh", &payload.lab_zh, 500),
            ("lab_en", &payload.lab_en, 500),
            ("lab_desc_zh", &payload.lab_desc_zh, 1000),
            ("lab_desc_en", &payload.lab_desc_en, 1000),
            ("lab_address_zh", &payload.lab_address_zh, 500),
            ("lab_address_en", &payload.lab_address_en, 500),
            ("lab_email", &payload.lab_email, 500),
            ("lab_phone", &payload.lab_phone, 500),
        ] {
            if let Some(value) = value {
                validate::check_length(field, value, max)?;
            }
        }

        Ok(())
    }

    fn apply_update(mut lab: Lab, payload: &LabPayload) -> (Lab, Map<String, Value>, Option<String>) {
        let mut diff = Map::new();
        let mut stale_logo = None;

        set_field(&mut diff, "lab_zh", &mut lab.lab_zh, &payload.lab_zh);
        set_field(&mut diff, "lab_en", &mut lab.lab_en, &payload.lab_en);
        set_field(&mut diff, "lab_desc_zh", &mut lab.lab_desc_zh, &payload.lab_desc_zh);
        set_field(&mut diff, "lab_desc_en", &mut lab.lab_desc_en, &payload.lab_desc_en);
        set_field(&mut diff, "lab_address_zh", &mut lab.lab_address_zh, &payload.lab_address_zh);
        set_field(&mut diff, "lab_address_en", &mut lab.lab_address_en, &payload.lab_address_en);
        set_field(&mut diff, "lab_email", &mut lab.lab_email, &payload.lab_email);
        set_field(&mut diff, "lab_phone", &mut lab.lab_phone, &payload.lab_phone);

        if payload.lab_logo_delete {
            if let Some(old) = lab.lab_logo_path.take() {
                diff.insert("lab_logo_path".into(), json!({ "old": old, "new": Value::Null }));
                stale_logo = Some(old);
            }
        } else if let Some(new_path) = &payload.lab_logo_path {
            if lab.lab_logo_path.as_deref() != Some(new_path) {
                let old = lab.lab_logo_path.replace(new_path.clone());
                diff.insert("lab_logo_path".into(), json!({ "old": old, "new": new_path }));
                stale_logo = old;
            }
        }

        (lab, diff, stale_logo)
    }

    fn fresh_lab(payload: &LabPayload) -> Lab {
        Lab {
            lab_id: 0,
            lab_logo_path: payload.lab_logo_path.clone(),
            lab_zh: payload.lab_zh.clone(),
            lab_en: payload.lab_en.clone(),
            lab_desc_zh: payload.lab_desc_zh.clone(),
            lab_desc_en: payload.lab_desc_en.clone(),
            lab_address_zh: payload.lab_address_zh.clone(),
            lab_address_en: payload.lab_address_en.clone(),
            lab_email: payload.lab_email.clone(),
            lab_phone: payload.lab_phone.clone(),
            enable: 1,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    fn creation_content(payload: &LabPayload) -> Map<String, Value> {
        let mut content = Map::new();
        for (field, value) in [
            ("lab_zh", &payload.lab_zh),
            ("lab_en", &payload.lab_en),
            ("lab_desc_zh", &payload.lab_desc_zh),
            ("lab_desc_en", &payload.lab_desc_en),
            ("lab_address_zh", &payload.lab_address_zh),
            ("lab_address_en", &payload.lab_address_en),
            ("lab_email", &payload.lab_email),
            ("lab_phone", &payload.lab_phone),
        ] {
            if let Some(value) = value {
                content.insert(field.to_string(), Value::String(value.clone()));
            }
        }
        if let Some(logo) = &payload.lab_logo_path {
            content.insert("lab_logo_path".into(), Value::String(logo.clone()));
        }
        content
    }
}

fn set_field(
    diff: &mut Map<String, Value>,
    field: &str,
    target: &mut Option<String>,
    incoming: &Option<String>,
) {
    if let Some(new_value) = incoming {
        let trimmed = new_value.trim();
        if target.as_deref() != Some(trimmed) {
            let old = target.replace(trimmed.to_string());
            diff.insert(field.to_string(), json!({ "old": old, "new": trimmed }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> LabService {
        let rt = Box::leak(Box::new(
            tokio::runtime::Runtime::new().expect("tokio runtime"),
        ));
        let pool = rt.block_on(async {
            sqlx::postgres::PgPoolOptions::new()
                .connect_lazy("postgres://localhost/unused")
                .expect("lazy pool")
        });
        LabService::new(pool)
    }

    #[test]
    fn email_format_is_checked() {
        let svc = service();
        let payload = LabPayload {
            lab_email: Some("not-an-email".to_string()),
            ..Default::default()
        };
        assert!(svc.validate_payload(&payload).is_err());
    }

    #[test]
    fn description_cap_is_1000() {
        let svc = service();
        let payload = LabPayload {
            lab_desc_zh: Some("述".repeat(1001)),
            ..Default::default()
        };
        assert!(svc.validate_payload(&payload).is_err());
    }

    #[test]
    fn update_diff_trims_and_tracks_changes() {
        let lab = LabService::fresh_lab(&LabPayload {
            lab_zh: Some("舊名".to_string()),
            ..Default::default()
        });
        let payload = LabPayload {
            lab_zh: Some("  新名  ".to_string()),
            ..Default::default()
        };
        let (updated, diff, _) = LabService::apply_update(lab, &payload);
        assert_eq!(updated.lab_zh.as_deref(), Some("新名"));
        assert_eq!(diff["lab_zh"]["old"], "舊名");
        assert_eq!(diff["lab_zh"]["new"], "新名");
    }

    #[test]
    fn logo_delete_reports_stale_file() {
        let mut lab = LabService::fresh_lab(&LabPayload::default());
        lab.lab_logo_path = Some("/media/lab_logo/202401/x.png".to_string());
        let payload = LabPayload {
            lab_logo_delete: true,
            ..Default::default()
        };
        let (updated, diff, stale) = LabService::apply_update(lab, &payload);
        assert!(updated.lab_logo_path.is_none());
        assert_eq!(stale.as_deref(), Some("/media/lab_logo/202401/x.png"));
        assert!(diff.contains_key("lab_logo_path"));
    }

    #[test]
    fn default_info_is_served_without_a_row() {
        let info = DefaultLabInfo::default();
        assert_eq!(info.lab_id, None);
        assert_eq!(info.enable, 1);
    }
}
