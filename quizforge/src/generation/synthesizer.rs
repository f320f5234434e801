//! MCQ synthesis and acceptance gating.
//!
//! One service call per claim; the service self-rewrites once internally if
//! its own audit finds ambiguity, so a rejection here is final for that
//! claim. The acceptance checks run in order: evidence grounding (before the
//! call is even made), explicit decline, structure, audit consistency,
//! confidence floor.

use crate::config::GenerationConfig;
use crate::generation::claims::ClaimContext;
use crate::generation::types::{ChoiceKey, GeneratedQuestion, TestableClaim};
use crate::service::{GenerationService, SynthesisOutcome};

/// Outcome of one claim's trip through synthesis and acceptance
#[derive(Debug)]
pub enum SynthesisVerdict {
    /// Passed every gate; ready for quality annotation and persistence
    Accepted(GeneratedQuestion),
    /// The service explicitly said it cannot build a question (expected)
    Declined { reason: String },
    /// The service produced a question that failed an acceptance check
    Rejected { reason: String },
    /// The call errored or the body was unparsable (soft failure)
    Failed { detail: String },
}

/// Synthesize and gate one question for a claim.
pub async fn synthesize_question(
    service: &dyn GenerationService,
    ctx: &ClaimContext,
    topic_title: &str,
    config: &GenerationConfig,
) -> SynthesisVerdict {
    // Evidence grounding gate: every quote the extraction step attached must
    // actually appear in the chunk it cites. Claims with invented evidence
    // never reach the service.
    if let Some(quote) = first_missing_quote(&ctx.claim, &ctx.chunk_text) {
        return SynthesisVerdict::Rejected {
            reason: format!("evidence quote not found verbatim in source chunk: \"{}\"", quote),
        };
    }

    let outcome = match service
        .synthesize_mcq(&ctx.claim, topic_title, &ctx.chunk_text)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            return SynthesisVerdict::Failed {
                detail: format!("synthesis call failed: {}", e),
            }
        }
    };

    match outcome {
        SynthesisOutcome::Declined { reason } => SynthesisVerdict::Declined { reason },
        SynthesisOutcome::Malformed { detail } => SynthesisVerdict::Failed { detail },
        SynthesisOutcome::Accepted(question) => {
            match validate_question(&question, config.min_confidence) {
                Ok(()) => SynthesisVerdict::Accepted(question),
                Err(reason) => SynthesisVerdict::Rejected { reason },
            }
        }
    }
}

/// Acceptance checks on a structurally parsed question.
///
/// Parsing already guarantees four choices and a complete audit exist; this
/// verifies they carry substance, that the audit resolves to exactly one
/// correct option matching the keyed answer, and that confidence clears the
/// floor.
pub fn validate_question(question: &GeneratedQuestion, min_confidence: f64) -> Result<(), String> {
    if question.stem.trim().is_empty() {
        return Err("empty stem".to_string());
    }
    for key in ChoiceKey::ALL {
        if question.choices.get(key).trim().is_empty() {
            return Err(format!("choice {} is empty", key.as_str()));
        }
        if question.option_audit.get(key).why.trim().is_empty() {
            return Err(format!("audit for choice {} has no justification", key.as_str()));
        }
    }

    let correct_keys = question.option_audit.correct_keys();
    match correct_keys.as_slice() {
        [single] => {
            if *single != question.correct {
                return Err(format!(
                    "audit marks {} correct but the keyed answer is {}",
                    single.as_str(),
                    question.correct.as_str()
                ));
            }
        }
        [] => return Err("audit marks no option correct".to_string()),
        many => {
            return Err(format!(
                "audit marks {} options correct; question is ambiguous",
                many.len()
            ))
        }
    }

    if question.confidence_0to1 < min_confidence {
        return Err(format!(
            "confidence {:.2} below the {:.2} floor",
            question.confidence_0to1, min_confidence
        ));
    }

    Ok(())
}

/// First evidence quote that does not appear (whitespace-normalized) in the
/// chunk text, if any
fn first_missing_quote<'a>(claim: &'a TestableClaim, chunk_text: &str) -> Option<&'a str> {
    let haystack = squash_whitespace(chunk_text);
    claim.evidence.iter().find_map(|ev| {
        let needle = squash_whitespace(&ev.quote);
        (!needle.is_empty() && !haystack.contains(&needle)).then_some(ev.quote.as_str())
    })
}

fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::types::{
        AuditSet, AuditVerdict, ChoiceSet, ClaimType, EvidenceQuote, OptionAudit,
    };
    use anyhow::Result;
    use async_trait::async_trait;

    fn audit(verdict: AuditVerdict) -> OptionAudit {
        OptionAudit {
            verdict,
            why: "checked against the excerpt".to_string(),
            evidence: "quoted from source".to_string(),
        }
    }

    fn question(correct: ChoiceKey, confidence: f64) -> GeneratedQuestion {
        let verdict_for = |key: ChoiceKey| {
            if key == correct {
                AuditVerdict::Correct
            } else {
                AuditVerdict::Wrong
            }
        };
        GeneratedQuestion {
            stem: "What does the excerpt define?".to_string(),
            choices: ChoiceSet {
                a: "Alpha".to_string(),
                b: "Beta".to_string(),
                c: "Gamma".to_string(),
                d: "Delta".to_string(),
            },
            correct,
            explanation: "The excerpt defines alpha.".to_string(),
            evidence_spans: vec!["alpha is defined".to_string()],
            option_audit: AuditSet {
                a: audit(verdict_for(ChoiceKey::A)),
                b: audit(verdict_for(ChoiceKey::B)),
                c: audit(verdict_for(ChoiceKey::C)),
                d: audit(verdict_for(ChoiceKey::D)),
            },
            difficulty_1to5: 3,
            confidence_0to1: confidence,
            distractor_rationales: Default::default(),
        }
    }

    fn claim_with_quote(quote: &str) -> TestableClaim {
        TestableClaim {
            claim_id: "c1".to_string(),
            claim: "Alpha is defined by the excerpt.".to_string(),
            claim_type: ClaimType::Definition,
            evidence: vec![EvidenceQuote {
                quote: quote.to_string(),
                page: None,
            }],
            common_confusions: Vec::new(),
        }
    }

    fn ctx(quote: &str, chunk_text: &str) -> ClaimContext {
        ClaimContext {
            claim: claim_with_quote(quote),
            chunk_index: 0,
            chunk_text: chunk_text.to_string(),
        }
    }

    struct FixedService(SynthesisOutcome);

    #[async_trait]
    impl GenerationService for FixedService {
        async fn extract_claims(
            &self,
            _chunk_text: &str,
            _position_label: &str,
            _max_claims: usize,
        ) -> Result<Vec<TestableClaim>> {
            unreachable!("synthesizer tests never extract");
        }

        async fn synthesize_mcq(
            &self,
            _claim: &TestableClaim,
            _topic_title: &str,
            _chunk_text: &str,
        ) -> Result<SynthesisOutcome> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn valid_question_passes() {
        assert!(validate_question(&question(ChoiceKey::B, 0.9), 0.7).is_ok());
    }

    #[test]
    fn zero_correct_verdicts_rejected() {
        let mut q = question(ChoiceKey::A, 0.9);
        q.option_audit.a.verdict = AuditVerdict::Wrong;
        let err = validate_question(&q, 0.7).unwrap_err();
        assert!(err.contains("no option correct"));
    }

    #[test]
    fn two_correct_verdicts_rejected_as_ambiguous() {
        let mut q = question(ChoiceKey::A, 0.9);
        q.option_audit.c.verdict = AuditVerdict::Correct;
        let err = validate_question(&q, 0.7).unwrap_err();
        assert!(err.contains("ambiguous"));
    }

    #[test]
    fn audit_disagreeing_with_keyed_answer_rejected() {
        let mut q = question(ChoiceKey::A, 0.9);
        q.option_audit.a.verdict = AuditVerdict::Wrong;
        q.option_audit.d.verdict = AuditVerdict::Correct;
        let err = validate_question(&q, 0.7).unwrap_err();
        assert!(err.contains("keyed answer"));
    }

    #[test]
    fn low_confidence_rejected() {
        let err = validate_question(&question(ChoiceKey::A, 0.55), 0.7).unwrap_err();
        assert!(err.contains("below"));
    }

    #[test]
    fn empty_choice_rejected() {
        let mut q = question(ChoiceKey::A, 0.9);
        q.choices.c = "  ".to_string();
        assert!(validate_question(&q, 0.7).is_err());
    }

    #[tokio::test]
    async fn decline_is_an_expected_outcome_not_an_error() {
        let service = FixedService(SynthesisOutcome::Declined {
            reason: "claim too thin".to_string(),
        });
        let config = GenerationConfig::default();
        let context = ctx("alpha is defined", "In this section, alpha is defined precisely.");

        match synthesize_question(&service, &context, "Definitions", &config).await {
            SynthesisVerdict::Declined { reason } => assert_eq!(reason, "claim too thin"),
            other => panic!("expected decline, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn invented_evidence_never_reaches_the_service() {
        // FixedService would accept; the grounding gate must fire first.
        let service = FixedService(SynthesisOutcome::Accepted(question(ChoiceKey::A, 0.9)));
        let config = GenerationConfig::default();
        let context = ctx("this quote exists nowhere", "A completely different excerpt.");

        match synthesize_question(&service, &context, "Definitions", &config).await {
            SynthesisVerdict::Rejected { reason } => {
                assert!(reason.contains("not found verbatim"))
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn whitespace_differences_do_not_fail_the_grounding_gate() {
        let service = FixedService(SynthesisOutcome::Accepted(question(ChoiceKey::A, 0.9)));
        let config = GenerationConfig::default();
        let context = ctx(
            "alpha  is\ndefined",
            "In this section, alpha is defined precisely.",
        );

        match synthesize_question(&service, &context, "Definitions", &config).await {
            SynthesisVerdict::Accepted(_) => {}
            other => panic!("expected acceptance, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_a_soft_failure() {
        let service = FixedService(SynthesisOutcome::Malformed {
            detail: "missing option_audit".to_string(),
        });
        let config = GenerationConfig::default();
        let context = ctx("alpha is defined", "alpha is defined here");

        match synthesize_question(&service, &context, "Definitions", &config).await {
            SynthesisVerdict::Failed { detail } => assert!(detail.contains("option_audit")),
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
