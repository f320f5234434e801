//! The distinguished setup-fault error class.
//!
//! Only these errors unwind to the job-failure handler and mark a generation
//! job `failed`. Per-chunk, per-claim and per-insert problems are handled at
//! their loop sites and never surface here.

use thiserror::Error;

/// Fatal faults detected before or during job setup
#[derive(Debug, Error)]
pub enum SetupError {
    /// The requested material does not exist
    #[error("material not found: {0}")]
    MaterialNotFound(String),

    /// The material exists but was never analyzed
    #[error("material {0} has no analysis document")]
    AnalysisMissing(String),

    /// The stored analysis document could not be normalized
    #[error("analysis document for material {material_id} is unreadable: {detail}")]
    AnalysisUnreadable { material_id: String, detail: String },

    /// The owning course has no topics to generate for
    #[error("no topics found for course {0}")]
    NoTopics(String),

    /// Topics exist but none matched the analyzed material
    #[error("no platform topic matched any analysis topic")]
    NoTopicsMatched,
}
