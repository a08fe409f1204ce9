//! Media file uploads and serving. Size ceilings and allowed extensions
//! depend on the declared file type; every stored upload writes an UPLOAD
//! audit record.

use serde::Serialize;
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use std::path::PathBuf;

use crate::config;
use crate::files::{self, FileInfo, DOCUMENT_EXTENSIONS, IMAGE_EXTENSIONS};

use super::{execute_with_audit, Module, OperationType, ServiceError, ServiceResult};

#[derive(Debug, Clone, Serialize)]
pub struct UploadResult {
    pub path: String,
    pub url: String,
    pub filename: String,
    #[serde(rename = "type")]
    pub file_type: String,
    pub category: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaHealth {
    pub status: &'static str,
    pub upload_dir: String,
    pub writable: bool,
}

pub struct MediaService {
    pool: PgPool,
}

impl MediaService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist an uploaded file under the directory for its declared type.
    pub async fn upload(
        &self,
        data: Vec<u8>,
        filename: &str,
        file_type: &str,
        actor: Option<i64>,
    ) -> ServiceResult<UploadResult> {
        if filename.is_empty() {
            return Err(ServiceError::validation("no file selected"));
        }

        let upload = &config::config().upload;
        let (max_size, category, allowed): (usize, &'static str, &[&str]) = match file_type {
            "lab_logo" | "member_avatar" => (upload.max_image_bytes, "image", IMAGE_EXTENSIONS),
            "paper" => (upload.max_document_bytes, "document", DOCUMENT_EXTENSIONS),
            _ => (10 * 1024 * 1024, "image", IMAGE_EXTENSIONS),
        };

        let file_size = data.len();
        let path = files::save_file(&data, filename, file_type, allowed, max_size).await?;

        let result = UploadResult {
            url: format!("/api/media/serve{}", path),
            path,
            filename: filename.to_string(),
            file_type: file_type.to_string(),
            category,
        };

        let content = json!({
            "filename": filename,
            "file_type": file_type,
            "file_size": file_size,
        });
        let pool = self.pool.clone();

        // The audit record is the only database state an upload produces
        execute_with_audit(
            &pool,
            Module::Media,
            OperationType::Upload,
            content,
            actor,
            move |_conn: &mut PgConnection| Box::pin(async move { Ok(result) }),
        )
        .await
    }

    /// Resolve a `/media/...` path for serving, rejecting traversal attempts
    /// and missing files.
    pub async fn serve(&self, media_path: &str) -> ServiceResult<(PathBuf, &'static str)> {
        let full_path = files::resolve_media_path(media_path)
            .ok_or_else(|| ServiceError::validation("invalid file path"))?;

        let meta = tokio::fs::metadata(&full_path)
            .await
            .map_err(|_| ServiceError::not_found("file not found"))?;

        if !meta.is_file() {
            return Err(ServiceError::validation("path is not a file"));
        }

        Ok((full_path, files::mime_type_for(media_path)))
    }

    pub async fn info(&self, media_path: &str) -> ServiceResult<FileInfo> {
        files::file_info(media_path)
            .await
            .ok_or_else(|| ServiceError::not_found("file not found"))
    }

    /// Verify the upload directory exists and is writable.
    pub async fn health_check(&self) -> ServiceResult<MediaHealth> {
        let dir = config::config().upload.dir.clone();

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ServiceError::internal(format!("upload dir unavailable: {}", e)))?;

        let probe = PathBuf::from(&dir).join(".health_check");
        tokio::fs::write(&probe, b"ok")
            .await
            .map_err(|e| ServiceError::internal(format!("upload dir not writable: {}", e)))?;
        tokio::fs::remove_file(&probe).await.ok();

        Ok(MediaHealth {
            status: "healthy",
            upload_dir: dir,
            writable: true,
        })
    }
}
