//! Video objects in S3: staging multipart uploads, storing them, and pulling
//! them back down for analysis.

use std::path::Path;

use anyhow::{anyhow, Result};
use aws_sdk_s3::primitives::ByteStream;
use axum::extract::multipart::{Field, MultipartError};
use axum::http::StatusCode;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::errors::AppError;

const ALLOWED_EXTENSIONS: [&str; 3] = ["mp4", "mov", "avi"];

/// Lowercased extension of an accepted video file name.
pub fn video_extension(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name).extension()?.to_str()?.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

pub fn content_type_for(ext: &str) -> &'static str {
    match ext {
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}

/// S3 key for a stored upload.
pub fn object_key(stored_name: &str) -> String {
    format!("uploads/{stored_name}")
}

pub fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::Validation(format!("Invalid multipart body: {}", e.body_text()))
    }
}

/// Streams one multipart field to `dest`, enforcing `max_bytes`.
/// Returns the number of bytes written.
pub async fn stage_field(mut field: Field<'_>, dest: &Path, max_bytes: u64) -> Result<u64, AppError> {
    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;
    let mut written: u64 = 0;

    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        written += chunk.len() as u64;
        if written > max_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "Video exceeds the {} MB limit",
                max_bytes / (1024 * 1024)
            )));
        }
        file.write_all(&chunk)
            .await
            .map_err(|e| AppError::Internal(e.into()))?;
    }
    file.flush().await.map_err(|e| AppError::Internal(e.into()))?;

    if written == 0 {
        return Err(AppError::Validation("Uploaded video is empty".to_string()));
    }
    Ok(written)
}

pub async fn put_video(
    s3: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
    source: &Path,
    content_type: &str,
) -> Result<(), AppError> {
    let body = ByteStream::from_path(source)
        .await
        .map_err(|e| AppError::S3(format!("cannot read staged upload: {e}")))?;

    s3.put_object()
        .bucket(bucket)
        .key(key)
        .body(body)
        .content_type(content_type)
        .send()
        .await
        .map_err(|e| AppError::S3(format!("S3 upload failed: {e}")))?;

    info!("Uploaded video to s3://{}/{}", bucket, key);
    Ok(())
}

/// Downloads `key` into `dest`, streaming chunk by chunk.
pub async fn download_video(
    s3: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
    dest: &Path,
) -> Result<u64> {
    let object = s3
        .get_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .map_err(|e| anyhow!("S3 download of {key} failed: {e}"))?;

    let mut body = object.body;
    let mut file = tokio::fs::File::create(dest).await?;
    let mut written: u64 = 0;
    while let Some(bytes) = body.try_next().await? {
        written += bytes.len() as u64;
        file.write_all(&bytes).await?;
    }
    file.flush().await?;

    info!("Downloaded s3://{}/{} ({} bytes)", bucket, key, written);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_extension_accepts_known_containers() {
        assert_eq!(video_extension("rally.mp4").as_deref(), Some("mp4"));
        assert_eq!(video_extension("Serve.MOV").as_deref(), Some("mov"));
        assert_eq!(video_extension("match.final.avi").as_deref(), Some("avi"));
    }

    #[test]
    fn test_video_extension_rejects_everything_else() {
        assert_eq!(video_extension("notes.txt"), None);
        assert_eq!(video_extension("clip.mkv"), None);
        assert_eq!(video_extension("mp4"), None);
        assert_eq!(video_extension(""), None);
    }

    #[test]
    fn test_object_key_and_content_type() {
        assert_eq!(object_key("abc.mp4"), "uploads/abc.mp4");
        assert_eq!(content_type_for("mov"), "video/quicktime");
    }
}
