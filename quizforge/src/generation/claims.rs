//! Claim extraction across a topic's resolved chunks.
//!
//! One service call per chunk; a failed or unparsable call empties that
//! chunk's contribution and the loop continues. The surviving claims are
//! globally ordered by claim-type priority before synthesis so that quota
//! exhaustion consumes the valuable types first.

use quizforge_sdk::log_extraction_failed;

use crate::config::GenerationConfig;
use crate::generation::chunks::SourceChunk;
use crate::generation::types::TestableClaim;
use crate::service::GenerationService;

/// A claim together with the chunk it came from, kept for synthesis context
#[derive(Debug, Clone)]
pub struct ClaimContext {
    pub claim: TestableClaim,
    pub chunk_index: usize,
    pub chunk_text: String,
}

/// Extract claims for every chunk of one topic.
///
/// Per-chunk soft failure: a call error yields an empty claim list for that
/// chunk and is reported through the job event stream, never propagated.
pub async fn extract_claims(
    service: &dyn GenerationService,
    job_id: &str,
    chunks: &[SourceChunk],
    config: &GenerationConfig,
) -> Vec<ClaimContext> {
    let mut collected = Vec::new();

    for chunk in chunks {
        let position_label = format!("chunk {}", chunk.index);
        let claims = match service
            .extract_claims(&chunk.text, &position_label, config.max_claims_per_chunk)
            .await
        {
            Ok(claims) => claims,
            Err(e) => {
                log_extraction_failed!(job_id, chunk.index, e);
                Vec::new()
            }
        };

        collected.extend(
            claims
                .into_iter()
                .take(config.max_claims_per_chunk)
                .map(|claim| ClaimContext {
                    claim,
                    chunk_index: chunk.index,
                    chunk_text: chunk.text.clone(),
                }),
        );
    }

    collected
}

/// Sort claims by type priority (procedure first, definition last).
///
/// Stable, so claims of equal priority keep their extraction order and the
/// ordering is deterministic for identical inputs.
pub fn order_by_priority(claims: &mut [ClaimContext]) {
    claims.sort_by_key(|c| c.claim.claim_type.priority());
}
