//! Prompt builders for the two generation-service calls.
//!
//! Both prompts demand JSON-only output matching the wire contracts in
//! `service.rs`. The synthesis prompt carries the self-audit requirement and
//! instructs the model to rewrite once internally if its own audit finds
//! ambiguity; the pipeline never re-prompts.

use crate::generation::types::TestableClaim;

/// Prompt for extracting testable claims from one chunk
pub fn claim_extraction_prompt(chunk_text: &str, position_label: &str, max_claims: usize) -> String {
    format!(
        r#"You are an exam-content analyst. Extract testable claims from the course material excerpt below.

A testable claim is one atomic statement a student could be quizzed on, verifiable from this excerpt alone.

Rules:
- Extract at most {max_claims} claims. Fewer is fine; do NOT pad.
- Every claim must be answerable using ONLY the given excerpt. If the excerpt supports nothing, return an empty list.
- Never fabricate. Each claim needs 1-2 SHORT verbatim quotes copied character-for-character from the excerpt as evidence.
- claim_type must be one of: definition, procedure, formula, conceptual, example, pitfall.
- claim_id must be unique within this excerpt (c1, c2, ...).
- List common confusions only when the excerpt itself hints at them.

Source position: {position_label}

Excerpt:
---
{chunk_text}
---

Output ONLY valid JSON, no markdown fences, matching exactly:
{{
  "claims": [
    {{
      "claim_id": "c1",
      "claim": "...",
      "claim_type": "procedure",
      "evidence": [{{"quote": "...", "page": 1}}],
      "common_confusions": ["..."]
    }}
  ]
}}

If a page number is unknown, omit the "page" field."#
    )
}

/// Prompt for synthesizing one audited MCQ from a claim
pub fn mcq_synthesis_prompt(claim: &TestableClaim, topic_title: &str, chunk_text: &str) -> String {
    let claim_json = serde_json::to_string_pretty(claim).unwrap_or_else(|_| claim.claim.clone());
    format!(
        r#"You are an exam author writing one multiple-choice question for the topic "{topic_title}".

Build the question from this testable claim:
{claim_json}

Surrounding source text for context:
---
{chunk_text}
---

Requirements:
- Exactly four choices A-D, exactly one correct.
- The stem must be answerable from the claim and its evidence alone; no outside knowledge.
- Distractors should reflect realistic mistakes. Use the claim's common confusions where given, and label each wrong choice's rationale as a misconception, computation error, or partial understanding.
- Audit EVERY option: verdict "correct" or "wrong", a one-sentence justification, and the supporting or refuting evidence (quote the source, or state explicitly that no evidence exists).
- After writing, re-run your own audit. If it finds two defensible answers or none, rewrite the question ONCE to fix it. If it is still ambiguous, decline.
- Estimate difficulty (1-5) and your confidence (0-1) that the keyed answer is the only defensible one.

If no fair question can be built from this claim, output ONLY:
{{"cannot_create": true, "reason": "..."}}

Otherwise output ONLY valid JSON, no markdown fences, matching exactly:
{{
  "stem": "...",
  "choices": {{"A": "...", "B": "...", "C": "...", "D": "..."}},
  "correct": "A",
  "explanation": "...",
  "evidence_spans": ["..."],
  "option_audit": {{
    "A": {{"verdict": "correct", "why": "...", "evidence": "..."}},
    "B": {{"verdict": "wrong", "why": "...", "evidence": "..."}},
    "C": {{"verdict": "wrong", "why": "...", "evidence": "..."}},
    "D": {{"verdict": "wrong", "why": "...", "evidence": "..."}}
  }},
  "difficulty_1to5": 3,
  "confidence_0to1": 0.9,
  "distractor_rationales": {{"B": "misconception: ...", "C": "computation error: ...", "D": "partial understanding: ..."}}
}}"#
    )
}
