//! Analysis orchestrator: extraction → sampling → per-frame scoring →
//! aggregation → cleanup. Strictly sequential; one run owns one scratch
//! directory and one list of frame scores.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::analysis::aggregate::aggregate;
use crate::analysis::extractor::{ExtractedFrames, FrameExtractor};
use crate::analysis::pacing::Pacer;
use crate::analysis::scorer::FrameScorer;
use crate::analysis::AnalysisError;
use crate::models::analysis::AnalysisResult;

/// Which extracted frames are sent to the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingPolicy {
    /// Keep every `stride`-th frame, starting with the first.
    pub stride: usize,
    /// Upper bound on oracle calls per run.
    pub max_frames: usize,
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self {
            stride: 3,
            max_frames: 8,
        }
    }
}

impl SamplingPolicy {
    pub fn sample<'a>(&self, frames: &'a [PathBuf]) -> Vec<&'a PathBuf> {
        frames
            .iter()
            .step_by(self.stride.max(1))
            .take(self.max_frames)
            .collect()
    }
}

pub struct AnalysisPipeline {
    extractor: Arc<dyn FrameExtractor>,
    scorer: Arc<dyn FrameScorer>,
    pacer: Arc<dyn Pacer>,
    sampling: SamplingPolicy,
}

impl AnalysisPipeline {
    pub fn new(
        extractor: Arc<dyn FrameExtractor>,
        scorer: Arc<dyn FrameScorer>,
        pacer: Arc<dyn Pacer>,
    ) -> Self {
        Self {
            extractor,
            scorer,
            pacer,
            sampling: SamplingPolicy::default(),
        }
    }

    pub fn with_sampling(mut self, sampling: SamplingPolicy) -> Self {
        self.sampling = sampling;
        self
    }

    /// Runs the whole pipeline for one video. Extracted frames are removed
    /// before returning, whatever the outcome.
    pub async fn run(&self, video_path: &Path) -> Result<AnalysisResult, AnalysisError> {
        info!("Starting tennis video analysis for {}", video_path.display());

        let extracted = self.extractor.extract(video_path).await?;
        let outcome = self.score_and_aggregate(&extracted).await;
        remove_scratch_dir(&extracted.dir).await;

        match &outcome {
            Ok(result) => info!(
                "Tennis video analysis completed: overall={} rank={}",
                result.overall_score, result.world_ranking
            ),
            Err(e) => warn!("Tennis video analysis failed: {e}"),
        }
        outcome
    }

    async fn score_and_aggregate(
        &self,
        extracted: &ExtractedFrames,
    ) -> Result<AnalysisResult, AnalysisError> {
        if extracted.frames.is_empty() {
            return Err(AnalysisError::NoFrames);
        }

        let sampled = self.sampling.sample(&extracted.frames);
        info!(
            "Analyzing {} of {} extracted frames",
            sampled.len(),
            extracted.frames.len()
        );

        let mut scores = Vec::with_capacity(sampled.len());
        for (i, frame) in sampled.into_iter().enumerate() {
            if i > 0 {
                self.pacer.wait().await;
            }
            match self.scorer.score(frame).await {
                Ok(score) => scores.push(score),
                Err(e) if e.is_frame_level() => {
                    warn!("Skipping frame {}: {e}", frame.display());
                }
                Err(e) => return Err(e),
            }
        }

        if scores.is_empty() {
            return Err(AnalysisError::NoScoredFrames);
        }

        aggregate(&scores)
    }
}

async fn remove_scratch_dir(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to clean up frames in {}: {e}", dir.display()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::analysis::scorer::FrameScore;
    use crate::llm_client::OracleError;

    pub(crate) struct FakeExtractor {
        pub dir: PathBuf,
        pub frames: Vec<PathBuf>,
        pub fail: bool,
    }

    impl FakeExtractor {
        /// Writes `count` empty frame files into `<root>/clip_frames`.
        pub(crate) fn with_frames(root: &Path, count: usize) -> Self {
            let dir = root.join("clip_frames");
            std::fs::create_dir_all(&dir).unwrap();
            let frames = (1..=count)
                .map(|i| {
                    let path = dir.join(format!("clip_frame_{i:03}.jpg"));
                    std::fs::write(&path, b"").unwrap();
                    path
                })
                .collect();
            Self {
                dir,
                frames,
                fail: false,
            }
        }
    }

    #[async_trait]
    impl FrameExtractor for FakeExtractor {
        async fn extract(&self, video_path: &Path) -> Result<ExtractedFrames, AnalysisError> {
            if self.fail {
                return Err(AnalysisError::extraction(video_path, "corrupt container"));
            }
            Ok(ExtractedFrames {
                dir: self.dir.clone(),
                frames: self.frames.clone(),
            })
        }
    }

    /// Replays a fixed script of outcomes; `None` is a failed oracle call.
    pub(crate) struct ScriptedScorer {
        script: Mutex<VecDeque<Option<FrameScore>>>,
        pub seen: Mutex<Vec<PathBuf>>,
    }

    impl ScriptedScorer {
        pub(crate) fn new(script: Vec<Option<FrameScore>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl FrameScorer for ScriptedScorer {
        async fn score(&self, frame: &Path) -> Result<FrameScore, AnalysisError> {
            self.seen.lock().unwrap().push(frame.to_path_buf());
            let next = self.script.lock().unwrap().pop_front().flatten();
            next.ok_or_else(|| AnalysisError::Scoring {
                path: frame.to_path_buf(),
                source: OracleError::EmptyContent,
            })
        }
    }

    #[derive(Default)]
    pub(crate) struct CountingPacer {
        pub waits: AtomicUsize,
    }

    #[async_trait]
    impl Pacer for CountingPacer {
        async fn wait(&self) {
            self.waits.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub(crate) fn technique(score: f64) -> Option<FrameScore> {
        Some(FrameScore {
            technique_score: Some(score),
            ..FrameScore::default()
        })
    }

    fn every_frame() -> SamplingPolicy {
        SamplingPolicy {
            stride: 1,
            max_frames: usize::MAX,
        }
    }

    #[test]
    fn test_default_sampling_takes_every_third_frame() {
        let frames: Vec<PathBuf> = (0..20).map(|i| PathBuf::from(format!("{i}.jpg"))).collect();
        let picked: Vec<&PathBuf> = SamplingPolicy::default().sample(&frames);
        let names: Vec<&str> = picked.iter().map(|p| p.to_str().unwrap()).collect();
        assert_eq!(
            names,
            vec!["0.jpg", "3.jpg", "6.jpg", "9.jpg", "12.jpg", "15.jpg", "18.jpg"]
        );
    }

    #[test]
    fn test_default_sampling_caps_at_eight() {
        let frames: Vec<PathBuf> = (0..100).map(|i| PathBuf::from(format!("{i}.jpg"))).collect();
        assert_eq!(SamplingPolicy::default().sample(&frames).len(), 8);
    }

    #[tokio::test]
    async fn test_zero_frames_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let extractor = FakeExtractor::with_frames(root.path(), 0);
        let pipeline = AnalysisPipeline::new(
            Arc::new(extractor),
            Arc::new(ScriptedScorer::new(vec![])),
            Arc::new(CountingPacer::default()),
        );

        let err = pipeline.run(Path::new("clip.mp4")).await.unwrap_err();
        assert!(matches!(err, AnalysisError::NoFrames), "{err:?}");
    }

    #[tokio::test]
    async fn test_extraction_error_is_fatal() {
        let extractor = FakeExtractor {
            dir: PathBuf::from("/nonexistent/clip_frames"),
            frames: vec![],
            fail: true,
        };
        let scorer = Arc::new(ScriptedScorer::new(vec![technique(9.0)]));
        let pipeline = AnalysisPipeline::new(
            Arc::new(extractor),
            scorer.clone(),
            Arc::new(CountingPacer::default()),
        );

        let err = pipeline.run(Path::new("clip.mp4")).await.unwrap_err();
        assert!(matches!(err, AnalysisError::Extraction { .. }), "{err:?}");
        assert!(scorer.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_partial_scoring_failures_are_skipped() {
        let root = tempfile::tempdir().unwrap();
        let extractor = FakeExtractor::with_frames(root.path(), 5);
        let scorer = Arc::new(ScriptedScorer::new(vec![
            technique(8.0),
            None,
            technique(9.0),
            None,
            technique(10.0),
        ]));
        let pacer = Arc::new(CountingPacer::default());
        let pipeline = AnalysisPipeline::new(Arc::new(extractor), scorer.clone(), pacer.clone())
            .with_sampling(every_frame());

        let result = pipeline.run(Path::new("clip.mp4")).await.unwrap();

        // Only the three successful frames count: (8 + 9 + 10) / 3
        assert_eq!(result.technique_score, 9.0);
        assert_eq!(result.footwork_score, 6.0);
        assert_eq!(scorer.seen.lock().unwrap().len(), 5);
        assert_eq!(pacer.waits.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_all_scoring_failures_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let extractor = FakeExtractor::with_frames(root.path(), 3);
        let pipeline = AnalysisPipeline::new(
            Arc::new(extractor),
            Arc::new(ScriptedScorer::new(vec![None, None, None])),
            Arc::new(CountingPacer::default()),
        )
        .with_sampling(every_frame());

        let err = pipeline.run(Path::new("clip.mp4")).await.unwrap_err();
        assert!(matches!(err, AnalysisError::NoScoredFrames), "{err:?}");
    }

    #[tokio::test]
    async fn test_frames_are_scored_in_capture_order() {
        let root = tempfile::tempdir().unwrap();
        let extractor = FakeExtractor::with_frames(root.path(), 7);
        let expected = vec![
            extractor.frames[0].clone(),
            extractor.frames[3].clone(),
            extractor.frames[6].clone(),
        ];
        let scorer = Arc::new(ScriptedScorer::new(vec![
            technique(7.0),
            technique(7.0),
            technique(7.0),
        ]));
        let pipeline = AnalysisPipeline::new(
            Arc::new(extractor),
            scorer.clone(),
            Arc::new(CountingPacer::default()),
        );

        pipeline.run(Path::new("clip.mp4")).await.unwrap();
        assert_eq!(*scorer.seen.lock().unwrap(), expected);
    }

    #[tokio::test]
    async fn test_scratch_dir_removed_on_success_and_failure() {
        let root = tempfile::tempdir().unwrap();

        let extractor = FakeExtractor::with_frames(root.path(), 2);
        let dir = extractor.dir.clone();
        let pipeline = AnalysisPipeline::new(
            Arc::new(extractor),
            Arc::new(ScriptedScorer::new(vec![technique(8.0)])),
            Arc::new(CountingPacer::default()),
        );
        pipeline.run(Path::new("clip.mp4")).await.unwrap();
        assert!(!dir.exists());

        let extractor = FakeExtractor::with_frames(root.path(), 2);
        let dir = extractor.dir.clone();
        let pipeline = AnalysisPipeline::new(
            Arc::new(extractor),
            Arc::new(ScriptedScorer::new(vec![None])),
            Arc::new(CountingPacer::default()),
        );
        pipeline.run(Path::new("clip.mp4")).await.unwrap_err();
        assert!(!dir.exists());
    }
}
