//! Source text resolution for a matched topic.
//!
//! Analysis documents do not always carry raw chunks (older versions stored
//! only summaries), so resolution degrades through fallbacks before the
//! caller gives up on a topic.

use crate::generation::types::{AnalysisDocument, AnalysisTopic};

/// A resolved piece of source text for claim extraction
#[derive(Debug, Clone)]
pub struct SourceChunk {
    pub index: usize,
    pub text: String,
}

/// Resolve the source chunks for a matched topic, bounded by `limit`.
///
/// Resolution order: the topic's supporting-chunk indices, then the first
/// `fallback_count` raw chunks, then pseudo-chunks synthesized from chunk
/// summaries and key terms. An empty result means the topic should be
/// skipped (reported, not fatal).
pub fn select_chunks(
    topic: &AnalysisTopic,
    doc: &AnalysisDocument,
    limit: usize,
    fallback_count: usize,
) -> Vec<SourceChunk> {
    // (a) chunks the analysis step explicitly tied to this topic
    let mut selected: Vec<SourceChunk> = topic
        .supporting_chunks
        .iter()
        .filter_map(|&idx| doc.chunks.iter().find(|c| c.index == idx))
        .map(|c| SourceChunk {
            index: c.index,
            text: c.text.clone(),
        })
        .take(limit)
        .collect();

    // (b) generic fallback when the supporting list resolved nothing
    if selected.is_empty() && !doc.chunks.is_empty() {
        selected = doc
            .chunks
            .iter()
            .take(fallback_count.min(limit))
            .map(|c| SourceChunk {
                index: c.index,
                text: c.text.clone(),
            })
            .collect();
    }

    // (c) no raw chunk store at all: synthesize pseudo-chunks from summaries
    if selected.is_empty() && !doc.chunk_summaries.is_empty() {
        let mut summaries: Vec<_> = doc
            .chunk_summaries
            .iter()
            .filter(|s| topic.supporting_chunks.contains(&s.index))
            .collect();
        if summaries.is_empty() {
            summaries = doc.chunk_summaries.iter().collect();
        }
        selected = summaries
            .into_iter()
            .take(limit)
            .map(|s| {
                let mut text = s.summary.clone();
                if !s.key_terms.is_empty() {
                    text.push_str("\nKey terms: ");
                    text.push_str(&s.key_terms.join(", "));
                }
                if !topic.key_terms.is_empty() {
                    text.push_str("\nTopic terms: ");
                    text.push_str(&topic.key_terms.join(", "));
                }
                SourceChunk {
                    index: s.index,
                    text,
                }
            })
            .collect();
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::types::{Chunk, ChunkSummary};

    fn topic(supporting: Vec<usize>) -> AnalysisTopic {
        AnalysisTopic {
            title: "Limits".to_string(),
            code: None,
            description: String::new(),
            supporting_chunks: supporting,
            key_terms: vec!["epsilon".to_string()],
        }
    }

    fn chunk(index: usize, text: &str) -> Chunk {
        Chunk {
            index,
            chunk_type: "text".to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn supporting_indices_resolve_in_listed_order() {
        let doc = AnalysisDocument {
            topics: Vec::new(),
            chunks: vec![chunk(0, "zero"), chunk(1, "one"), chunk(2, "two")],
            chunk_summaries: Vec::new(),
        };
        let selected = select_chunks(&topic(vec![2, 0]), &doc, 6, 3);
        let indices: Vec<usize> = selected.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![2, 0]);
    }

    #[test]
    fn dangling_indices_fall_back_to_leading_chunks() {
        let doc = AnalysisDocument {
            topics: Vec::new(),
            chunks: vec![chunk(0, "zero"), chunk(1, "one"), chunk(2, "two"), chunk(3, "three")],
            chunk_summaries: Vec::new(),
        };
        // Supporting list references chunks that do not exist.
        let selected = select_chunks(&topic(vec![9, 10]), &doc, 6, 3);
        let indices: Vec<usize> = selected.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn summaries_synthesize_pseudo_chunks_when_no_raw_store() {
        let doc = AnalysisDocument {
            topics: Vec::new(),
            chunks: Vec::new(),
            chunk_summaries: vec![ChunkSummary {
                index: 4,
                summary: "Epsilon-delta definition of the limit".to_string(),
                key_terms: vec!["delta".to_string()],
            }],
        };
        let selected = select_chunks(&topic(vec![4]), &doc, 6, 3);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].index, 4);
        assert!(selected[0].text.contains("Epsilon-delta"));
        assert!(selected[0].text.contains("Key terms: delta"));
        assert!(selected[0].text.contains("Topic terms: epsilon"));
    }

    #[test]
    fn empty_document_yields_empty_selection() {
        let doc = AnalysisDocument {
            topics: Vec::new(),
            chunks: Vec::new(),
            chunk_summaries: Vec::new(),
        };
        assert!(select_chunks(&topic(vec![1]), &doc, 6, 3).is_empty());
    }

    #[test]
    fn selection_is_bounded_by_limit() {
        let doc = AnalysisDocument {
            topics: Vec::new(),
            chunks: (0..10).map(|i| chunk(i, "text")).collect(),
            chunk_summaries: Vec::new(),
        };
        let selected = select_chunks(&topic((0..10).collect()), &doc, 4, 3);
        assert_eq!(selected.len(), 4);
    }
}
