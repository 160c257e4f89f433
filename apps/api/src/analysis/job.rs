//! Background analysis job: `processing → completed | failed`.
//!
//! Spawned once per paid record. The video is pulled from S3 into a private
//! temp directory, so concurrent jobs never share files.

use std::path::Path;

use anyhow::{anyhow, Result};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::analysis::AnalysisPipeline;
use crate::models::analysis::{AnalysisStatus, VideoAnalysis};
use crate::state::AppState;
use crate::store::AnalysisStore;
use crate::uploads::{download_video, object_key};

/// Runs the pipeline on a local video and records the outcome on the
/// owning record. Pipeline errors become `failed`; only store errors are
/// returned. The returned status is the one the record actually holds.
pub async fn process_analysis(
    store: &dyn AnalysisStore,
    pipeline: &AnalysisPipeline,
    analysis_id: Uuid,
    video_path: &Path,
) -> Result<AnalysisStatus> {
    let written = match pipeline.run(video_path).await {
        Ok(result) => {
            let written = store.complete_analysis(analysis_id, &result).await?;
            if written.is_some() {
                info!(
                    "Analysis {analysis_id} completed: overall={} rank={}",
                    result.overall_score, result.world_ranking
                );
            }
            written
        }
        Err(e) => {
            error!("Analysis {analysis_id} failed: {e}");
            store.fail_analysis(analysis_id).await?
        }
    };

    if let Some(record) = written {
        return record
            .status()
            .ok_or_else(|| anyhow!("analysis {analysis_id} has unknown status '{}'", record.status));
    }

    let current = store
        .get_analysis(analysis_id)
        .await?
        .ok_or_else(|| anyhow!("analysis {analysis_id} no longer exists"))?;
    warn!(
        "Analysis {analysis_id} was no longer processing (status {}); outcome discarded",
        current.status
    );
    current
        .status()
        .ok_or_else(|| anyhow!("analysis {analysis_id} has unknown status '{}'", current.status))
}

pub fn spawn_analysis_job(state: AppState, analysis: VideoAnalysis) -> JoinHandle<()> {
    tokio::spawn(async move {
        let analysis_id = analysis.id;
        if let Err(e) = run_analysis_job(&state, &analysis).await {
            error!("Analysis job {analysis_id} aborted: {e:?}");
            if let Err(e) = state.store.fail_analysis(analysis_id).await {
                error!("Could not mark analysis {analysis_id} as failed: {e:?}");
            }
        }
    })
}

async fn run_analysis_job(state: &AppState, analysis: &VideoAnalysis) -> Result<()> {
    let scratch = tempfile::Builder::new().prefix("tennisrank-").tempdir()?;
    let video_path = scratch.path().join(&analysis.file_name);

    download_video(
        &state.s3,
        &state.config.s3_bucket,
        &object_key(&analysis.file_name),
        &video_path,
    )
    .await?;

    process_analysis(
        state.store.as_ref(),
        &state.pipeline,
        analysis.id,
        &video_path,
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::analysis::pipeline::tests::{technique, CountingPacer, FakeExtractor, ScriptedScorer};
    use crate::models::analysis::NewVideoAnalysis;
    use crate::store::MemoryAnalysisStore;

    async fn processing_record(store: &MemoryAnalysisStore) -> Uuid {
        let record = store
            .create_analysis(NewVideoAnalysis {
                user_id: Some(Uuid::new_v4()),
                file_name: "clip.mp4".to_string(),
                file_size: 2048,
            })
            .await
            .unwrap();
        store.begin_processing(record.id).await.unwrap();
        record.id
    }

    #[tokio::test]
    async fn test_zero_frames_marks_record_failed_without_scores() {
        let store = MemoryAnalysisStore::new();
        let id = processing_record(&store).await;
        let root = tempfile::tempdir().unwrap();
        let pipeline = AnalysisPipeline::new(
            Arc::new(FakeExtractor::with_frames(root.path(), 0)),
            Arc::new(ScriptedScorer::new(vec![])),
            Arc::new(CountingPacer::default()),
        );

        let status = process_analysis(&store, &pipeline, id, Path::new("clip.mp4"))
            .await
            .unwrap();
        assert_eq!(status, AnalysisStatus::Failed);

        let record = store.get_analysis(id).await.unwrap().unwrap();
        assert_eq!(record.status(), Some(AnalysisStatus::Failed));
        assert!(record.overall_score.is_none());
        assert!(record.technique_score.is_none());
        assert!(record.world_ranking.is_none());
        assert!(record.analysis_results.is_none());
        assert!(record.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_outcome_is_discarded_when_record_is_not_processing() {
        let store = MemoryAnalysisStore::new();
        let record = store
            .create_analysis(NewVideoAnalysis {
                user_id: Some(Uuid::new_v4()),
                file_name: "clip.mp4".to_string(),
                file_size: 2048,
            })
            .await
            .unwrap();
        let root = tempfile::tempdir().unwrap();
        let pipeline = AnalysisPipeline::new(
            Arc::new(FakeExtractor::with_frames(root.path(), 3)),
            Arc::new(ScriptedScorer::new(vec![technique(9.0)])),
            Arc::new(CountingPacer::default()),
        );

        let status = process_analysis(&store, &pipeline, record.id, Path::new("clip.mp4"))
            .await
            .unwrap();
        assert_eq!(status, AnalysisStatus::Uploading);

        let stored = store.get_analysis(record.id).await.unwrap().unwrap();
        assert_eq!(stored.status(), Some(AnalysisStatus::Uploading));
        assert!(stored.overall_score.is_none());
        assert!(stored.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_successful_run_completes_record() {
        let store = MemoryAnalysisStore::new();
        let id = processing_record(&store).await;
        let root = tempfile::tempdir().unwrap();
        let pipeline = AnalysisPipeline::new(
            Arc::new(FakeExtractor::with_frames(root.path(), 6)),
            Arc::new(ScriptedScorer::new(vec![technique(9.0), None])),
            Arc::new(CountingPacer::default()),
        );

        let status = process_analysis(&store, &pipeline, id, Path::new("clip.mp4"))
            .await
            .unwrap();
        assert_eq!(status, AnalysisStatus::Completed);

        let record = store.get_analysis(id).await.unwrap().unwrap();
        assert_eq!(record.status(), Some(AnalysisStatus::Completed));
        assert_eq!(record.technique_score, Some(9.0));
        assert_eq!(record.footwork_score, Some(6.0));
        assert!(record.overall_score.is_some());
        assert!(record.world_ranking.is_some());
        assert!(record.completed_at.is_some());
        let details = record.detailed_analysis().unwrap();
        assert_eq!(
            details.strengths,
            vec!["Excellent racquet technique and swing mechanics"]
        );
    }
}
