//! Data structures for the question generation pipeline
//!
//! The analysis-document wire format has evolved (`v1`..`v4`) with
//! progressively richer fields. The versioned shapes live here as a tagged
//! union and are normalized once, at the boundary, into [`AnalysisDocument`];
//! the rest of the pipeline never branches on schema version.

use std::collections::BTreeMap;

use anyhow::Context;
use serde::{Deserialize, Serialize};

// ============================================================================
// Analysis documents
// ============================================================================

/// One topic named by the analysis step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisTopic {
    pub title: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub description: String,
    /// Indices into the document's chunk list that support this topic
    #[serde(default)]
    pub supporting_chunks: Vec<usize>,
    #[serde(default)]
    pub key_terms: Vec<String>,
}

/// A raw source text chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    #[serde(default)]
    pub chunk_type: String,
    pub text: String,
}

/// Condensed chunk description, present from schema v3 onward
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkSummary {
    pub index: usize,
    pub summary: String,
    #[serde(default)]
    pub key_terms: Vec<String>,
}

/// v1 topics predate stable codes and key terms
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyTopic {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub supporting_chunks: Vec<usize>,
}

/// Analysis document as stored, tagged by schema version
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "schema_version")]
pub enum VersionedAnalysis {
    #[serde(rename = "v1")]
    V1 {
        topics: Vec<LegacyTopic>,
        #[serde(default)]
        chunks: Vec<Chunk>,
    },
    #[serde(rename = "v2")]
    V2 {
        topics: Vec<AnalysisTopic>,
        #[serde(default)]
        chunks: Vec<Chunk>,
    },
    #[serde(rename = "v3")]
    V3 {
        topics: Vec<AnalysisTopic>,
        #[serde(default)]
        chunks: Vec<Chunk>,
        #[serde(default)]
        chunk_summaries: Vec<ChunkSummary>,
    },
    #[serde(rename = "v4")]
    V4 {
        topics: Vec<AnalysisTopic>,
        #[serde(default)]
        chunks: Vec<Chunk>,
        #[serde(default)]
        chunk_summaries: Vec<ChunkSummary>,
    },
}

/// Canonical analysis document, all enrichment fields defaulted to empty
#[derive(Debug, Clone)]
pub struct AnalysisDocument {
    pub topics: Vec<AnalysisTopic>,
    pub chunks: Vec<Chunk>,
    pub chunk_summaries: Vec<ChunkSummary>,
}

impl From<VersionedAnalysis> for AnalysisDocument {
    fn from(value: VersionedAnalysis) -> Self {
        match value {
            VersionedAnalysis::V1 { topics, chunks } => AnalysisDocument {
                topics: topics
                    .into_iter()
                    .map(|t| AnalysisTopic {
                        title: t.title,
                        code: None,
                        description: t.description,
                        supporting_chunks: t.supporting_chunks,
                        key_terms: Vec::new(),
                    })
                    .collect(),
                chunks,
                chunk_summaries: Vec::new(),
            },
            VersionedAnalysis::V2 { topics, chunks } => AnalysisDocument {
                topics,
                chunks,
                chunk_summaries: Vec::new(),
            },
            VersionedAnalysis::V3 {
                topics,
                chunks,
                chunk_summaries,
            }
            | VersionedAnalysis::V4 {
                topics,
                chunks,
                chunk_summaries,
            } => AnalysisDocument {
                topics,
                chunks,
                chunk_summaries,
            },
        }
    }
}

impl AnalysisDocument {
    /// Parse and normalize a stored analysis document
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let versioned: VersionedAnalysis =
            serde_json::from_str(json).context("failed to parse analysis document")?;
        Ok(versioned.into())
    }
}

// ============================================================================
// Platform topics
// ============================================================================

/// A persisted topic owned by a course, read-only to this pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformTopic {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub code: Option<String>,
    pub description: Option<String>,
}

// ============================================================================
// Testable claims
// ============================================================================

/// Category of a testable claim, ordered by synthesis value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimType {
    Definition,
    Procedure,
    Formula,
    Conceptual,
    Example,
    Pitfall,
}

impl ClaimType {
    /// Synthesis priority; lower consumes the quota first.
    ///
    /// Procedural and quantitative claims are preferred over rote
    /// definitions, so when a topic's quota is reached early the more
    /// valuable claim types have already been consumed.
    pub fn priority(&self) -> u8 {
        match self {
            ClaimType::Procedure => 0,
            ClaimType::Formula => 1,
            ClaimType::Conceptual => 2,
            ClaimType::Example => 3,
            ClaimType::Pitfall => 4,
            ClaimType::Definition => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimType::Definition => "definition",
            ClaimType::Procedure => "procedure",
            ClaimType::Formula => "formula",
            ClaimType::Conceptual => "conceptual",
            ClaimType::Example => "example",
            ClaimType::Pitfall => "pitfall",
        }
    }
}

/// A short verbatim excerpt cited as evidence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceQuote {
    pub quote: String,
    #[serde(default)]
    pub page: Option<u32>,
}

/// One atomic, independently verifiable statement extracted from a chunk.
///
/// Ephemeral: produced and consumed within one job run, never persisted
/// standalone. `claim_id` is unique within its source chunk only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestableClaim {
    pub claim_id: String,
    pub claim: String,
    pub claim_type: ClaimType,
    pub evidence: Vec<EvidenceQuote>,
    #[serde(default)]
    pub common_confusions: Vec<String>,
}

// ============================================================================
// Generated questions
// ============================================================================

/// Choice letter of a four-option MCQ
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChoiceKey {
    A,
    B,
    C,
    D,
}

impl ChoiceKey {
    pub const ALL: [ChoiceKey; 4] = [ChoiceKey::A, ChoiceKey::B, ChoiceKey::C, ChoiceKey::D];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChoiceKey::A => "A",
            ChoiceKey::B => "B",
            ChoiceKey::C => "C",
            ChoiceKey::D => "D",
        }
    }
}

/// The four choice texts, keyed A through D
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceSet {
    #[serde(rename = "A")]
    pub a: String,
    #[serde(rename = "B")]
    pub b: String,
    #[serde(rename = "C")]
    pub c: String,
    #[serde(rename = "D")]
    pub d: String,
}

impl ChoiceSet {
    pub fn get(&self, key: ChoiceKey) -> &str {
        match key {
            ChoiceKey::A => &self.a,
            ChoiceKey::B => &self.b,
            ChoiceKey::C => &self.c,
            ChoiceKey::D => &self.d,
        }
    }
}

/// Audit verdict for one option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditVerdict {
    Correct,
    Wrong,
}

/// Per-option audit record: verdict plus justification and evidence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionAudit {
    pub verdict: AuditVerdict,
    pub why: String,
    /// Supporting or refuting evidence, or an explicit absence statement
    #[serde(default)]
    pub evidence: String,
}

/// The per-option audits, keyed A through D
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSet {
    #[serde(rename = "A")]
    pub a: OptionAudit,
    #[serde(rename = "B")]
    pub b: OptionAudit,
    #[serde(rename = "C")]
    pub c: OptionAudit,
    #[serde(rename = "D")]
    pub d: OptionAudit,
}

impl AuditSet {
    pub fn get(&self, key: ChoiceKey) -> &OptionAudit {
        match key {
            ChoiceKey::A => &self.a,
            ChoiceKey::B => &self.b,
            ChoiceKey::C => &self.c,
            ChoiceKey::D => &self.d,
        }
    }

    /// Choice keys whose audit verdict is `correct`
    pub fn correct_keys(&self) -> Vec<ChoiceKey> {
        ChoiceKey::ALL
            .iter()
            .copied()
            .filter(|k| self.get(*k).verdict == AuditVerdict::Correct)
            .collect()
    }
}

/// A candidate MCQ as returned by the synthesis call.
///
/// Post-acceptance invariant: exactly one option's audit verdict is
/// `correct`, and it is the designated correct choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub stem: String,
    pub choices: ChoiceSet,
    pub correct: ChoiceKey,
    pub explanation: String,
    #[serde(default)]
    pub evidence_spans: Vec<String>,
    pub option_audit: AuditSet,
    pub difficulty_1to5: u8,
    pub confidence_0to1: f64,
    /// Rationale per wrong choice: misconception, computation error,
    /// or partial understanding
    #[serde(default)]
    pub distractor_rationales: BTreeMap<String, String>,
}

// ============================================================================
// Summaries
// ============================================================================

/// Caller-facing result of one generation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSummary {
    pub questions_generated: usize,
    pub topics_matched: usize,
    pub topics_total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v1_document_normalizes_with_empty_enrichment_fields() {
        let json = r#"{
            "schema_version": "v1",
            "topics": [
                {"title": "Limits", "supporting_chunks": [0, 2]}
            ],
            "chunks": [
                {"index": 0, "text": "A limit describes the value a function approaches."}
            ]
        }"#;

        let doc = AnalysisDocument::from_json(json).unwrap();
        assert_eq!(doc.topics.len(), 1);
        assert_eq!(doc.topics[0].title, "Limits");
        assert!(doc.topics[0].code.is_none());
        assert!(doc.topics[0].key_terms.is_empty());
        assert_eq!(doc.topics[0].supporting_chunks, vec![0, 2]);
        assert!(doc.chunk_summaries.is_empty());
    }

    #[test]
    fn v4_document_keeps_enrichment_fields() {
        let json = r#"{
            "schema_version": "v4",
            "topics": [
                {
                    "title": "Integration by Parts",
                    "code": "INT-2",
                    "description": "Product-rule based integration",
                    "supporting_chunks": [1],
                    "key_terms": ["u-substitution", "parts"]
                }
            ],
            "chunks": [],
            "chunk_summaries": [
                {"index": 1, "summary": "Derivation of the parts formula", "key_terms": ["uv"]}
            ]
        }"#;

        let doc = AnalysisDocument::from_json(json).unwrap();
        assert_eq!(doc.topics[0].code.as_deref(), Some("INT-2"));
        assert_eq!(doc.topics[0].key_terms.len(), 2);
        assert_eq!(doc.chunk_summaries.len(), 1);
        assert!(doc.chunks.is_empty());
    }

    #[test]
    fn unknown_schema_version_is_an_error() {
        let json = r#"{"schema_version": "v9", "topics": []}"#;
        assert!(AnalysisDocument::from_json(json).is_err());
    }

    #[test]
    fn claim_type_priority_prefers_procedures_over_definitions() {
        assert!(ClaimType::Procedure.priority() < ClaimType::Definition.priority());
        assert!(ClaimType::Formula.priority() < ClaimType::Conceptual.priority());
        assert!(ClaimType::Pitfall.priority() < ClaimType::Definition.priority());
    }

    #[test]
    fn audit_set_reports_correct_keys() {
        let audit = |verdict| OptionAudit {
            verdict,
            why: "checked against source".to_string(),
            evidence: "quoted".to_string(),
        };
        let audits = AuditSet {
            a: audit(AuditVerdict::Wrong),
            b: audit(AuditVerdict::Correct),
            c: audit(AuditVerdict::Wrong),
            d: audit(AuditVerdict::Wrong),
        };
        assert_eq!(audits.correct_keys(), vec![ChoiceKey::B]);
    }

    #[test]
    fn summary_serializes_camel_case() {
        let summary = GenerationSummary {
            questions_generated: 3,
            topics_matched: 2,
            topics_total: 5,
        };
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("questionsGenerated"));
        assert!(json.contains("topicsMatched"));
        assert!(json.contains("topicsTotal"));
    }
}
