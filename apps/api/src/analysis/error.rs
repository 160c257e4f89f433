use std::path::PathBuf;

use thiserror::Error;

use crate::llm_client::OracleError;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Failed to extract video frames from {path}: {reason}")]
    Extraction { path: PathBuf, reason: String },

    #[error("No frames could be extracted from the video")]
    NoFrames,

    #[error("Failed to score frame {path}: {source}")]
    Scoring {
        path: PathBuf,
        #[source]
        source: OracleError,
    },

    #[error("Failed to read frame {path}: {source}")]
    FrameRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No frames could be successfully analyzed")]
    NoScoredFrames,

    #[error("Cannot aggregate an empty list of frame scores")]
    EmptyInput,

    #[error("Aggregation failed: {0}")]
    Aggregation(String),
}

impl AnalysisError {
    pub fn extraction(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        AnalysisError::Extraction {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Per-frame failures the orchestrator skips instead of aborting on.
    pub fn is_frame_level(&self) -> bool {
        matches!(
            self,
            AnalysisError::Scoring { .. } | AnalysisError::FrameRead { .. }
        )
    }
}
