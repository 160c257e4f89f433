//! Frame extraction: one JPEG per second of playback, written next to the
//! source video by an `ffmpeg` subprocess.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::analysis::AnalysisError;

/// Frames produced from one video, ordered by capture time.
#[derive(Debug, Clone)]
pub struct ExtractedFrames {
    /// Scratch directory owned by this run; removed after aggregation.
    pub dir: PathBuf,
    pub frames: Vec<PathBuf>,
}

#[async_trait]
pub trait FrameExtractor: Send + Sync {
    async fn extract(&self, video_path: &Path) -> Result<ExtractedFrames, AnalysisError>;
}

pub struct FfmpegFrameExtractor {
    ffmpeg_bin: String,
}

impl FfmpegFrameExtractor {
    pub fn new(ffmpeg_bin: impl Into<String>) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
        }
    }
}

#[async_trait]
impl FrameExtractor for FfmpegFrameExtractor {
    async fn extract(&self, video_path: &Path) -> Result<ExtractedFrames, AnalysisError> {
        if !tokio::fs::try_exists(video_path).await.unwrap_or(false) {
            return Err(AnalysisError::extraction(video_path, "video file not found"));
        }

        let stem = video_stem(video_path)
            .ok_or_else(|| AnalysisError::extraction(video_path, "video path has no file name"))?;
        let dir = frames_dir_for(video_path)
            .ok_or_else(|| AnalysisError::extraction(video_path, "video path has no file name"))?;

        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            AnalysisError::extraction(video_path, format!("cannot create {}: {e}", dir.display()))
        })?;

        let pattern = dir.join(format!("{}%03d.jpg", frame_prefix(&stem)));
        debug!("Running {} on {}", self.ffmpeg_bin, video_path.display());

        let output = Command::new(&self.ffmpeg_bin)
            .arg("-y")
            .args(["-loglevel", "error"])
            .arg("-i")
            .arg(video_path)
            .args(["-vf", "fps=1", "-q:v", "2"])
            .arg(&pattern)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                AnalysisError::extraction(video_path, format!("failed to run {}: {e}", self.ffmpeg_bin))
            })?;

        if !output.status.success() {
            // A failed decode leaves no frames behind.
            if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
                warn!("Failed to remove {}: {e}", dir.display());
            }
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AnalysisError::extraction(
                video_path,
                format!("{} exited with {}: {}", self.ffmpeg_bin, output.status, stderr.trim()),
            ));
        }

        let frames = list_frames(&dir, &stem).await.map_err(|e| {
            AnalysisError::extraction(video_path, format!("cannot list {}: {e}", dir.display()))
        })?;

        info!(
            "Extracted {} frames from {}",
            frames.len(),
            video_path.display()
        );
        Ok(ExtractedFrames { dir, frames })
    }
}

fn video_stem(video_path: &Path) -> Option<String> {
    video_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
}

fn frame_prefix(stem: &str) -> String {
    format!("{stem}_frame_")
}

/// `<parent>/<file name>_frames`. Keyed on the full file name so `clip.mp4`
/// and `clip.mov` in the same directory never share frames.
pub fn frames_dir_for(video_path: &Path) -> Option<PathBuf> {
    let file_name = video_path.file_name()?.to_string_lossy();
    let parent = video_path.parent().unwrap_or_else(|| Path::new(""));
    Some(parent.join(format!("{file_name}_frames")))
}

/// Lists `<stem>_frame_<n>.jpg` files in `dir`, ascending by `n`.
async fn list_frames(dir: &Path, stem: &str) -> std::io::Result<Vec<PathBuf>> {
    let prefix = frame_prefix(stem);
    let mut indexed = Vec::new();

    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let index = name
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix(".jpg"))
            .and_then(|n| n.parse::<u32>().ok());
        if let Some(index) = index {
            indexed.push((index, entry.path()));
        }
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, path)| path).collect())
}
