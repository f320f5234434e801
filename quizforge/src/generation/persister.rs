//! Mapping accepted questions into stored rows.
//!
//! One insert per accepted question. The caller treats an insert failure as
//! a per-question skip, never a job failure.

use anyhow::{Context, Result};
use chrono::Local;
use uuid::Uuid;

use crate::database::{Database, QuestionProvenance, StoredQuestion};
use crate::generation::claims::ClaimContext;
use crate::generation::quality::QualityAssessment;
use crate::generation::types::{ChoiceKey, GeneratedQuestion, PlatformTopic};

/// Map an accepted question plus its source claim into a stored row and
/// insert it. Returns the new question id.
pub fn persist_question(
    db: &Database,
    topic: &PlatformTopic,
    material_id: &str,
    ctx: &ClaimContext,
    question: &GeneratedQuestion,
    quality: &QualityAssessment,
) -> Result<Uuid> {
    let id = Uuid::new_v4();

    let mut solution = question.explanation.clone();
    if !question.evidence_spans.is_empty() {
        solution.push_str("\n\nEvidence: ");
        solution.push_str(&question.evidence_spans.join(" | "));
    }

    let stored = StoredQuestion {
        id,
        course_id: topic.course_id.clone(),
        topic_id: topic.id.clone(),
        material_id: material_id.to_string(),
        stem: question.stem.clone(),
        choices: ChoiceKey::ALL
            .iter()
            .map(|&key| question.choices.get(key).to_string())
            .collect(),
        correct_answer: question.correct.as_str().to_string(),
        solution,
        tags: vec![
            topic.title.clone(),
            ctx.claim.claim_type.as_str().to_string(),
        ],
        difficulty: question.difficulty_1to5,
        quality_score: quality.score,
        quality_flags: quality.flags.clone(),
        provenance: QuestionProvenance {
            claim_id: ctx.claim.claim_id.clone(),
            claim_type: ctx.claim.claim_type.as_str().to_string(),
            chunk_index: ctx.chunk_index,
            evidence: ctx.claim.evidence.clone(),
        },
        // Generated questions are never published directly; a human reviews
        // and publishes through the question CRUD.
        status: "needs_review".to_string(),
        published: false,
        created_at: Local::now(),
    };

    db.insert_question(&stored)
        .with_context(|| format!("failed to persist question for claim {}", ctx.claim.claim_id))?;
    Ok(id)
}
