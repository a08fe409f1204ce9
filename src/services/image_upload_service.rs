//! Images embedded in markdown description fields. Uploads start unused;
//! saving an entity marks the URLs found in its content as used, and an
//! admin-triggered cleanup removes stale unused files and rows.

use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::json;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use crate::config;
use crate::database::models::UploadedImage;
use crate::files::{self, DESCRIPTION_IMAGE_EXTENSIONS};

use super::audit_service::batch_content;
use super::{execute_with_audit, Module, OperationType, ServiceError, ServiceResult};

static MD_IMAGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[.*?\]\((.*?)\)").unwrap());
static HTML_IMAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<img[^>]+src=["']([^"']+)["'][^>]*>"#).unwrap());

#[derive(Debug, Clone, Serialize)]
pub struct CleanupReport {
    pub deleted_count: usize,
    pub deleted_files: Vec<String>,
    pub cutoff_time: String,
}

pub struct ImageUploadService {
    pool: PgPool,
}

impl ImageUploadService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Store a description-field image and its tracking row (initially
    /// unused).
    pub async fn upload(
        &self,
        data: Vec<u8>,
        filename: &str,
        entity_type: Option<String>,
        entity_id: Option<i64>,
        field_name: Option<String>,
        actor: Option<i64>,
    ) -> ServiceResult<UploadedImage> {
        if filename.is_empty() {
            return Err(ServiceError::validation("no file selected"));
        }
        if !files::is_allowed(filename, DESCRIPTION_IMAGE_EXTENSIONS) {
            return Err(ServiceError::validation("unsupported file type"));
        }

        let max_size = config::config().upload.max_image_bytes;
        let file_size = data.len() as i64;
        let file_path = files::save_file(
            &data,
            filename,
            "description_image",
            DESCRIPTION_IMAGE_EXTENSIONS,
            max_size,
        )
        .await?;
        let file_url = format!("/api/media/serve{}", file_path);
        let mime_type = files::mime_type_for(filename).to_string();

        let content = json!({
            "filename": filename,
            "entity_type": entity_type,
            "entity_id": entity_id,
            "field_name": field_name,
            "file_size": file_size,
        });
        let filename = filename.to_string();
        let pool = self.pool.clone();

        execute_with_audit(
            &pool,
            Module::ImageUpload,
            OperationType::Upload,
            content,
            actor,
            move |conn: &mut PgConnection| {
                Box::pin(async move {
                    let image = sqlx::query_as::<_, UploadedImage>(
                        "INSERT INTO uploaded_images \
                         (filename, file_path, file_url, file_size, mime_type, \
                          entity_type, entity_id, field_name, is_used, uploaded_by) \
                         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, FALSE, $9) \
                         RETURNING *",
                    )
                    .bind(&filename)
                    .bind(&file_path)
                    .bind(&file_url)
                    .bind(file_size)
                    .bind(&mime_type)
                    .bind(&entity_type)
                    .bind(entity_id)
                    .bind(&field_name)
                    .bind(actor)
                    .fetch_one(&mut *conn)
                    .await?;

                    Ok(image)
                })
            },
        )
        .await
    }

    /// Mark the images referenced by saved markdown content as used by the
    /// given entity. Unreferenced uploads stay unused and eventually fall to
    /// cleanup.
    pub async fn mark_images_used(
        &self,
        content: &str,
        entity_type: &str,
        entity_id: i64,
        field_name: &str,
    ) -> ServiceResult<usize> {
        let paths: Vec<String> = extract_image_urls(content)
            .iter()
            .filter_map(|url| file_path_from_url(url))
            .collect();

        if paths.is_empty() {
            return Ok(0);
        }

        let updated = sqlx::query(
            "UPDATE uploaded_images SET is_used = TRUE, used_at = now(), \
             entity_type = $2, entity_id = $3, field_name = $4, updated_at = now() \
             WHERE file_path = ANY($1)",
        )
        .bind(&paths)
        .bind(entity_type)
        .bind(entity_id)
        .bind(field_name)
        .execute(&self.pool)
        .await?;

        Ok(updated.rows_affected() as usize)
    }

    /// Admin-triggered batch cleanup: hard-delete unused images older than
    /// the cutoff, file and row together.
    pub async fn cleanup_unused(
        &self,
        older_than_hours: i64,
        actor: Option<i64>,
    ) -> ServiceResult<CleanupReport> {
        let cutoff = Utc::now() - Duration::hours(older_than_hours.max(1));

        let stale: Vec<UploadedImage> = sqlx::query_as(
            "SELECT * FROM uploaded_images WHERE is_used = FALSE AND created_at < $1",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<i64> = stale.iter().map(|i| i.image_id).collect();
        let content = batch_content(&ids, "cleanup", json!({ "cutoff_time": cutoff.to_rfc3339() }));
        let pool = self.pool.clone();
        let cutoff_for_delete = cutoff;

        let deleted = execute_with_audit(
            &pool,
            Module::ImageUpload,
            OperationType::BatchDelete,
            content,
            actor,
            move |conn: &mut PgConnection| {
                Box::pin(async move {
                    let deleted: Vec<UploadedImage> = sqlx::query_as(
                        "DELETE FROM uploaded_images \
                         WHERE is_used = FALSE AND created_at < $1 \
                         RETURNING *",
                    )
                    .bind(cutoff_for_delete)
                    .fetch_all(&mut *conn)
                    .await?;

                    Ok(deleted)
                })
            },
        )
        .await?;

        let mut deleted_files = Vec::with_capacity(deleted.len());
        for image in &deleted {
            files::delete_file(&image.file_path).await;
            deleted_files.push(image.filename.clone());
        }

        Ok(CleanupReport {
            deleted_count: deleted.len(),
            deleted_files,
            cutoff_time: cutoff.to_rfc3339(),
        })
    }

    pub async fn entity_images(
        &self,
        entity_type: &str,
        entity_id: i64,
        field_name: Option<&str>,
    ) -> ServiceResult<Vec<UploadedImage>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM uploaded_images WHERE entity_type = ");
        qb.push_bind(entity_type);
        qb.push(" AND entity_id = ").push_bind(entity_id);
        if let Some(field_name) = field_name {
            qb.push(" AND field_name = ").push_bind(field_name);
        }
        qb.push(" ORDER BY created_at DESC");

        let images = qb
            .build_query_as::<UploadedImage>()
            .fetch_all(&self.pool)
            .await?;
        Ok(images)
    }

    pub async fn delete_image(&self, image_id: i64, actor: Option<i64>) -> ServiceResult<()> {
        let image = sqlx::query_as::<_, UploadedImage>(
            "SELECT * FROM uploaded_images WHERE image_id = $1",
        )
        .bind(image_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ServiceError::not_found("image not found"))?;

        let content = json!({ "deleted_image_id": image_id, "filename": image.filename });
        let file_path = image.file_path.clone();
        let pool = self.pool.clone();

        execute_with_audit(
            &pool,
            Module::ImageUpload,
            OperationType::Delete,
            content,
            actor,
            move |conn: &mut PgConnection| {
                Box::pin(async move {
                    sqlx::query("DELETE FROM uploaded_images WHERE image_id = $1")
                        .bind(image_id)
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            },
        )
        .await?;

        files::delete_file(&file_path).await;

        Ok(())
    }
}

/// Pull image URLs out of markdown (and inline HTML), keeping only the ones
/// that point at this site's media storage.
fn extract_image_urls(content: &str) -> Vec<String> {
    let mut urls = Vec::new();

    for captures in MD_IMAGE_RE.captures_iter(content) {
        urls.push(captures[1].to_string());
    }
    for captures in HTML_IMAGE_RE.captures_iter(content) {
        urls.push(captures[1].to_string());
    }

    urls.retain(|url| url.starts_with("/api/media/serve") || url.starts_with("/media/"));
    urls
}

fn file_path_from_url(url: &str) -> Option<String> {
    if let Some(path) = url.strip_prefix("/api/media/serve") {
        Some(path.to_string())
    } else if url.starts_with("/media/") {
        Some(url.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_local_markdown_images() {
        let content = "intro ![fig](/api/media/serve/media/description_image/202401/a.png) \
                       and ![ext](https://example.com/b.png) \
                       <img src=\"/media/description_image/202401/c.jpg\" alt=\"\">";
        let urls = extract_image_urls(content);
        assert_eq!(urls.len(), 2);
        assert!(urls[0].starts_with("/api/media/serve"));
        assert!(urls[1].starts_with("/media/"));
    }

    #[test]
    fn url_to_path_strips_serve_prefix() {
        assert_eq!(
            file_path_from_url("/api/media/serve/media/x/a.png").as_deref(),
            Some("/media/x/a.png")
        );
        assert_eq!(
            file_path_from_url("/media/x/a.png").as_deref(),
            Some("/media/x/a.png")
        );
        assert!(file_path_from_url("https://example.com/a.png").is_none());
    }

    #[test]
    fn empty_content_yields_no_urls() {
        assert!(extract_image_urls("").is_empty());
        assert!(extract_image_urls("plain text, no images").is_empty());
    }
}
