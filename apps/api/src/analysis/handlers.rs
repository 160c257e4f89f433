//! Axum route handlers for uploads and analysis records.

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::analysis::{NewVideoAnalysis, VideoAnalysis};
use crate::state::AppState;
use crate::uploads::{
    content_type_for, multipart_error, object_key, put_video, stage_field, video_extension,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub analysis_id: Uuid,
}

/// POST /api/upload-video
///
/// Accepts a multipart `video` field (MP4, MOV or AVI), stores it in S3 and
/// creates an analysis record awaiting payment.
pub async fn handle_upload_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("video") {
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        let ext = video_extension(&original_name).ok_or_else(|| {
            AppError::Validation(
                "Invalid file type. Only MP4, MOV, and AVI files are allowed.".to_string(),
            )
        })?;

        let stored_name = format!("{}.{ext}", Uuid::new_v4());
        let staging = tempfile::tempdir().map_err(|e| AppError::Internal(e.into()))?;
        let staged_path = staging.path().join(&stored_name);

        let size = stage_field(field, &staged_path, state.config.max_upload_bytes()).await?;
        put_video(
            &state.s3,
            &state.config.s3_bucket,
            &object_key(&stored_name),
            &staged_path,
            content_type_for(&ext),
        )
        .await?;

        let analysis = state
            .store
            .create_analysis(NewVideoAnalysis {
                user_id: Some(state.demo_user_id),
                file_name: stored_name,
                file_size: i64::try_from(size).unwrap_or(i64::MAX),
            })
            .await?;

        info!(
            "Created analysis {} for upload '{}' ({} bytes)",
            analysis.id, original_name, size
        );
        return Ok(Json(UploadResponse {
            analysis_id: analysis.id,
        }));
    }

    Err(AppError::Validation("No video file provided".to_string()))
}

/// GET /api/analysis/:id
pub async fn handle_get_analysis(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<VideoAnalysis>, AppError> {
    let analysis = state
        .store
        .get_analysis(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Analysis {id} not found")))?;
    Ok(Json(analysis))
}

/// GET /api/analyses
///
/// The demo user's analyses, newest first.
pub async fn handle_list_analyses(
    State(state): State<AppState>,
) -> Result<Json<Vec<VideoAnalysis>>, AppError> {
    let analyses = state
        .store
        .list_analyses_for_user(state.demo_user_id)
        .await?;
    Ok(Json(analyses))
}
