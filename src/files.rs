//! Local-disk media storage. Files land under the configured upload root in
//! `<file_type>/<YYYYMM>/<uuid>.<ext>` and are referenced everywhere by their
//! `/media/...` relative path.

use chrono::Utc;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::config;
use crate::services::{ServiceError, ServiceResult};

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];
pub const DOCUMENT_EXTENSIONS: &[&str] = &["pdf"];
pub const DESCRIPTION_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "svg"];

pub fn extension(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

pub fn is_allowed(filename: &str, allowed: &[&str]) -> bool {
    matches!(extension(filename), Some(ext) if allowed.contains(&ext.as_str()))
}

pub fn mime_type_for(filename: &str) -> &'static str {
    match extension(filename).as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Validate and persist an uploaded file, returning its `/media/...` path.
pub async fn save_file(
    data: &[u8],
    original_name: &str,
    file_type: &str,
    allowed: &[&str],
    max_size: usize,
) -> ServiceResult<String> {
    if original_name.is_empty() {
        return Err(ServiceError::validation("no file selected"));
    }

    let ext = extension(original_name)
        .filter(|ext| allowed.contains(&ext.as_str()))
        .ok_or_else(|| ServiceError::validation("unsupported file type"))?;

    if data.len() > max_size {
        return Err(ServiceError::validation(format!(
            "file exceeds the maximum size of {} bytes",
            max_size
        )));
    }

    let year_month = Utc::now().format("%Y%m").to_string();
    let relative = format!("{}/{}/{}.{}", file_type, year_month, Uuid::new_v4().simple(), ext);

    let full_path = upload_root().join(&relative);
    if let Some(parent) = full_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ServiceError::internal(format!("failed to create upload dir: {}", e)))?;
    }

    tokio::fs::write(&full_path, data)
        .await
        .map_err(|e| ServiceError::internal(format!("failed to write file: {}", e)))?;

    Ok(format!("/media/{}", relative))
}

/// Best-effort removal of a stored file; missing files and IO failures are
/// logged, never surfaced to the caller.
pub async fn delete_file(media_path: &str) {
    let Some(full_path) = resolve_media_path(media_path) else {
        return;
    };

    match tokio::fs::remove_file(&full_path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::error!("failed to delete file {}: {}", full_path.display(), e),
    }
}

/// Map a `/media/...` path onto the upload root, rejecting traversal.
pub fn resolve_media_path(media_path: &str) -> Option<PathBuf> {
    let relative = media_path.strip_prefix("/media/").unwrap_or(media_path);

    if relative.is_empty() || relative.starts_with('/') {
        return None;
    }
    if Path::new(relative)
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        return None;
    }

    Some(upload_root().join(relative))
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct FileInfo {
    pub path: String,
    pub size: u64,
    pub mime_type: &'static str,
}

pub async fn file_info(media_path: &str) -> Option<FileInfo> {
    let full_path = resolve_media_path(media_path)?;
    let meta = tokio::fs::metadata(&full_path).await.ok()?;
    if !meta.is_file() {
        return None;
    }
    Some(FileInfo {
        path: media_path.to_string(),
        size: meta.len(),
        mime_type: mime_type_for(media_path),
    })
}

fn upload_root() -> PathBuf {
    PathBuf::from(&config::config().upload.dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(extension("Photo.JPG").as_deref(), Some("jpg"));
        assert_eq!(extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(extension("noext"), None);
    }

    #[test]
    fn allowed_checks_against_category() {
        assert!(is_allowed("a.png", IMAGE_EXTENSIONS));
        assert!(!is_allowed("a.pdf", IMAGE_EXTENSIONS));
        assert!(is_allowed("paper.pdf", DOCUMENT_EXTENSIONS));
        assert!(is_allowed("fig.webp", DESCRIPTION_IMAGE_EXTENSIONS));
    }

    #[test]
    fn traversal_paths_are_rejected() {
        assert!(resolve_media_path("/media/../etc/passwd").is_none());
        assert!(resolve_media_path("/media//etc/passwd").is_none());
        assert!(resolve_media_path("/media/").is_none());
        assert!(resolve_media_path("/media/avatar/202401/a.png").is_some());
    }

    #[test]
    fn mime_types_cover_known_extensions() {
        assert_eq!(mime_type_for("x.pdf"), "application/pdf");
        assert_eq!(mime_type_for("x.jpeg"), "image/jpeg");
        assert_eq!(mime_type_for("x.bin"), "application/octet-stream");
    }
}
