// Tennis video analysis pipeline.
// Flow: extract frames (ffmpeg) → sample → score each frame (vision oracle)
//       → aggregate → clean up. `job` wires it to storage and the status lifecycle.

pub mod aggregate;
pub mod error;
pub mod extractor;
pub mod handlers;
pub mod job;
pub mod pacing;
pub mod pipeline;
pub mod scorer;

pub use error::AnalysisError;
pub use pipeline::AnalysisPipeline;
