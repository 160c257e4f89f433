use std::path::Path;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Deserializer, Serialize};

use crate::analysis::AnalysisError;
use crate::llm_client::prompts::{FRAME_SCORING_PROMPT, FRAME_SCORING_SYSTEM};
use crate::llm_client::VisionClient;

/// The oracle's verdict on one frame. Sub-scores are nominally 1–10 but are
/// not range-checked; a missing or non-numeric value is `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameScore {
    #[serde(default, deserialize_with = "lenient_score")]
    pub stance_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_score")]
    pub technique_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_score")]
    pub footwork_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_score")]
    pub positioning_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_score")]
    pub athleticism_score: Option<f64>,
    #[serde(default)]
    pub observations: Option<String>,
    #[serde(default)]
    pub technical_notes: Option<String>,
}

/// Accepts `7`, `7.5` or `"7"`; anything else becomes `None`.
fn lenient_score<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let score = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(score.filter(|s| s.is_finite()))
}

/// Scores a single still frame. Implementations make at most one oracle
/// call and never retry.
#[async_trait]
pub trait FrameScorer: Send + Sync {
    async fn score(&self, frame: &Path) -> Result<FrameScore, AnalysisError>;
}

pub struct VisionFrameScorer {
    client: VisionClient,
}

impl VisionFrameScorer {
    pub fn new(client: VisionClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FrameScorer for VisionFrameScorer {
    async fn score(&self, frame: &Path) -> Result<FrameScore, AnalysisError> {
        let bytes = tokio::fs::read(frame)
            .await
            .map_err(|source| AnalysisError::FrameRead {
                path: frame.to_path_buf(),
                source,
            })?;
        let encoded = STANDARD.encode(&bytes);

        self.client
            .call_json_with_image(FRAME_SCORING_SYSTEM, FRAME_SCORING_PROMPT, &encoded)
            .await
            .map_err(|source| AnalysisError::Scoring {
                path: frame.to_path_buf(),
                source,
            })
    }
}
