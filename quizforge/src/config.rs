//! Pipeline tunables.
//!
//! Every knob the generation pipeline consults lives in one immutable
//! [`GenerationConfig`] injected at construction. Nothing in the pipeline
//! reads module-level constants.

use std::time::Duration;

/// Tunables for one generation pipeline instance
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Upper bound on claims requested per chunk
    pub max_claims_per_chunk: usize,

    /// Per-topic quota of accepted questions
    pub max_questions_per_topic: usize,

    /// Minimum self-reported confidence for a question to be accepted
    pub min_confidence: f64,

    /// Keyword-overlap score below which topic matching reports no match
    pub match_score_floor: f64,

    /// Upper bound on chunks resolved per topic
    pub max_chunks_per_topic: usize,

    /// Number of leading chunks used when a topic lists no supporting chunks
    pub fallback_chunk_count: usize,

    /// Model used for both generation calls
    pub model: String,

    /// Max tokens per generation response
    pub max_tokens: usize,

    /// Sampling temperature for claim extraction
    pub extraction_temperature: f32,

    /// Sampling temperature for MCQ synthesis
    pub synthesis_temperature: f32,

    /// Hard bound on a single generation-service call
    pub request_timeout: Duration,

    /// Version tag recorded in each stored question's quality flags
    pub pipeline_version: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_claims_per_chunk: 12,
            max_questions_per_topic: 8,
            min_confidence: 0.7,
            match_score_floor: 0.3,
            max_chunks_per_topic: 6,
            fallback_chunk_count: 3,
            model: "claude-3-5-sonnet-20241022".to_string(),
            max_tokens: 4096,
            extraction_temperature: 0.2,
            synthesis_temperature: 0.4,
            request_timeout: Duration::from_secs(120),
            pipeline_version: "mcq-v2".to_string(),
        }
    }
}
