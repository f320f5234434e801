//! Quality scoring and review-triage annotation.
//!
//! Accept/reject thresholding already happened in the synthesizer; this gate
//! only annotates. Every generated question lands unpublished and flagged
//! for human review, and the score plus flag bundle drive review triage.

use serde::{Deserialize, Serialize};

use crate::generation::types::{ChoiceKey, ClaimType, GeneratedQuestion, TestableClaim};

/// Audit-completeness constant applied when an option audit cites nothing
const INCOMPLETE_AUDIT_WEIGHT: f64 = 0.6;

/// Structured flags stored alongside each generated question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityFlags {
    /// Claim carried at least one verbatim evidence quote
    pub groundedness: bool,
    /// The service accepted the claim as answerable from the excerpt
    pub answerability: bool,
    /// Audit resolved to a single correct option
    pub single_correct_answer: bool,
    /// Wrong choices carrying a distractor rationale
    pub distractor_plausibility_count: usize,
    pub pipeline_version: String,
    pub claim_type: ClaimType,
    /// Raw service confidence, before weighting
    pub confidence: f64,
}

/// Score plus flags for one accepted question
#[derive(Debug, Clone)]
pub struct QualityAssessment {
    /// 0-10; equal weighting of confidence and audit completeness
    pub score: f64,
    pub flags: QualityFlags,
}

/// Annotate an accepted question for downstream review triage.
pub fn assess(
    question: &GeneratedQuestion,
    claim: &TestableClaim,
    pipeline_version: &str,
) -> QualityAssessment {
    let completeness = if audit_cites_every_option(question) {
        1.0
    } else {
        INCOMPLETE_AUDIT_WEIGHT
    };
    let score = (question.confidence_0to1 + completeness) / 2.0 * 10.0;

    let distractor_plausibility_count = ChoiceKey::ALL
        .iter()
        .filter(|&&key| key != question.correct)
        .filter(|key| question.distractor_rationales.contains_key(key.as_str()))
        .count();

    QualityAssessment {
        score,
        flags: QualityFlags {
            groundedness: !claim.evidence.is_empty(),
            answerability: true,
            single_correct_answer: true,
            distractor_plausibility_count,
            pipeline_version: pipeline_version.to_string(),
            claim_type: claim.claim_type,
            confidence: question.confidence_0to1,
        },
    }
}

/// True when every option's audit cites concrete evidence or an explicit
/// absence-of-evidence statement
fn audit_cites_every_option(question: &GeneratedQuestion) -> bool {
    ChoiceKey::ALL
        .iter()
        .all(|&key| !question.option_audit.get(key).evidence.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::types::{
        AuditSet, AuditVerdict, ChoiceSet, EvidenceQuote, OptionAudit,
    };
    use std::collections::BTreeMap;

    fn question(confidence: f64, evidence: &str) -> GeneratedQuestion {
        let audit = |verdict| OptionAudit {
            verdict,
            why: "justified".to_string(),
            evidence: evidence.to_string(),
        };
        let mut rationales = BTreeMap::new();
        rationales.insert("B".to_string(), "misconception: swaps terms".to_string());
        rationales.insert("C".to_string(), "computation error".to_string());
        GeneratedQuestion {
            stem: "Which statement holds?".to_string(),
            choices: ChoiceSet {
                a: "Alpha".to_string(),
                b: "Beta".to_string(),
                c: "Gamma".to_string(),
                d: "Delta".to_string(),
            },
            correct: ChoiceKey::A,
            explanation: "Alpha holds.".to_string(),
            evidence_spans: Vec::new(),
            option_audit: AuditSet {
                a: audit(AuditVerdict::Correct),
                b: audit(AuditVerdict::Wrong),
                c: audit(AuditVerdict::Wrong),
                d: audit(AuditVerdict::Wrong),
            },
            difficulty_1to5: 3,
            confidence_0to1: confidence,
            distractor_rationales: rationales,
        }
    }

    fn claim() -> TestableClaim {
        TestableClaim {
            claim_id: "c1".to_string(),
            claim: "Alpha holds.".to_string(),
            claim_type: ClaimType::Conceptual,
            evidence: vec![EvidenceQuote {
                quote: "alpha holds".to_string(),
                page: Some(2),
            }],
            common_confusions: Vec::new(),
        }
    }

    #[test]
    fn complete_audit_scores_equal_weighting() {
        let assessment = assess(&question(0.8, "quoted from source"), &claim(), "mcq-v2");
        // (0.8 + 1.0) / 2 * 10
        assert!((assessment.score - 9.0).abs() < 1e-9);
    }

    #[test]
    fn missing_audit_evidence_reduces_completeness() {
        let assessment = assess(&question(0.8, "  "), &claim(), "mcq-v2");
        // (0.8 + 0.6) / 2 * 10
        assert!((assessment.score - 7.0).abs() < 1e-9);
    }

    #[test]
    fn flags_capture_provenance_fields() {
        let assessment = assess(&question(0.9, "quoted"), &claim(), "mcq-v2");
        let flags = assessment.flags;
        assert!(flags.groundedness);
        assert!(flags.answerability);
        assert!(flags.single_correct_answer);
        assert_eq!(flags.distractor_plausibility_count, 2);
        assert_eq!(flags.pipeline_version, "mcq-v2");
        assert_eq!(flags.confidence, 0.9);
    }
}
