//! Fuzzy pairing of platform topics with analysis topics.
//!
//! The two topic taxonomies are produced independently (topic CRUD vs. the
//! analysis step), so titles rarely agree byte-for-byte. The fallback chain
//! runs in strict priority order; the first rule that hits wins and no later
//! rule can override it.

use std::collections::HashSet;

use crate::generation::types::{AnalysisTopic, PlatformTopic};

/// Find the single best-matching analysis topic, or none.
///
/// Priority order: case-insensitive exact title, normalized topic code,
/// substring containment in either direction, keyword-overlap scoring with
/// `score_floor` as the acceptance threshold. No match is a valid, expected
/// outcome.
pub fn best_match<'a>(
    topic: &PlatformTopic,
    candidates: &'a [AnalysisTopic],
    score_floor: f64,
) -> Option<&'a AnalysisTopic> {
    let title = topic.title.trim().to_lowercase();

    // 1. Exact title equality
    if let Some(hit) = candidates
        .iter()
        .find(|c| c.title.trim().to_lowercase() == title)
    {
        return Some(hit);
    }

    // 2. Normalized stable code equality
    if let Some(code) = topic.code.as_deref().map(normalize_code) {
        if !code.is_empty() {
            if let Some(hit) = candidates.iter().find(|c| {
                c.code
                    .as_deref()
                    .map(normalize_code)
                    .is_some_and(|cc| cc == code)
            }) {
                return Some(hit);
            }
        }
    }

    // 3. Substring containment in either direction
    if let Some(hit) = candidates.iter().find(|c| {
        let other = c.title.trim().to_lowercase();
        !title.is_empty() && !other.is_empty() && (title.contains(&other) || other.contains(&title))
    }) {
        return Some(hit);
    }

    // 4. Keyword overlap, titles plus optional description bonus
    let title_tokens = tokenize(&topic.title);
    let mut best: Option<(&AnalysisTopic, f64)> = None;
    for candidate in candidates {
        let mut score = overlap_score(&title_tokens, &tokenize(&candidate.title));
        if let Some(description) = topic.description.as_deref() {
            if !description.trim().is_empty() && !candidate.description.trim().is_empty() {
                score += 0.5
                    * overlap_score(&tokenize(description), &tokenize(&candidate.description));
            }
        }
        // Strict greater-than keeps the earliest candidate on ties, so the
        // matcher stays deterministic for identical inputs.
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((candidate, score));
        }
    }

    best.and_then(|(candidate, score)| (score > score_floor).then_some(candidate))
}

/// Lowercase and strip everything non-alphanumeric
fn normalize_code(code: &str) -> String {
    code.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Token set for keyword overlap: lowercase alphanumeric runs longer than
/// two characters
fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(str::to_string)
        .collect()
}

/// |A ∩ B| / max(|A|, |B|), zero when either side is empty
fn overlap_score(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let larger = a.len().max(b.len());
    if larger == 0 {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    intersection as f64 / larger as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn platform(title: &str, code: Option<&str>, description: Option<&str>) -> PlatformTopic {
        PlatformTopic {
            id: "t-1".to_string(),
            course_id: "c-1".to_string(),
            title: title.to_string(),
            code: code.map(str::to_string),
            description: description.map(str::to_string),
        }
    }

    fn analysis(title: &str, code: Option<&str>, description: &str) -> AnalysisTopic {
        AnalysisTopic {
            title: title.to_string(),
            code: code.map(str::to_string),
            description: description.to_string(),
            supporting_chunks: Vec::new(),
            key_terms: Vec::new(),
        }
    }

    #[test]
    fn exact_match_is_case_insensitive_and_short_circuits() {
        let topic = platform("Limits", Some("L1"), None);
        let candidates = vec![
            analysis("limit theorems", None, ""),
            analysis("limits", None, ""),
        ];
        let hit = best_match(&topic, &candidates, 0.3).unwrap();
        assert_eq!(hit.title, "limits");
    }

    #[test]
    fn code_match_beats_substring() {
        let topic = platform("Differentiation", Some("CALC-2"), None);
        let candidates = vec![
            analysis("Differentiation rules and applications", None, ""),
            analysis("Derivatives", Some("calc 2"), ""),
        ];
        let hit = best_match(&topic, &candidates, 0.3).unwrap();
        assert_eq!(hit.title, "Derivatives");
    }

    #[test]
    fn substring_containment_either_direction() {
        let topic = platform("Chain Rule", None, None);
        let candidates = vec![analysis("The Chain Rule for Composite Functions", None, "")];
        assert!(best_match(&topic, &candidates, 0.3).is_some());

        let topic = platform("Advanced Chain Rule Applications", None, None);
        let candidates = vec![analysis("Chain Rule", None, "")];
        assert!(best_match(&topic, &candidates, 0.3).is_some());
    }

    #[test]
    fn keyword_overlap_matches_reordered_titles() {
        // Neither title contains the other; falls to keyword overlap.
        // {rigid, body, dynamics} vs {dynamics, rigid, bodies} -> 2/3 > 0.3
        let topic = platform("Rigid Body Dynamics", None, None);
        let candidates = vec![analysis("Dynamics of Rigid Bodies", None, "")];
        assert!(best_match(&topic, &candidates, 0.3).is_some());
    }

    #[test]
    fn overlap_below_floor_reports_no_match() {
        let topic = platform("Thermodynamics Basics", None, None);
        let candidates = vec![analysis("Organic Chemistry Nomenclature", None, "")];
        assert!(best_match(&topic, &candidates, 0.3).is_none());
    }

    #[test]
    fn overlap_score_is_symmetric() {
        let a = tokenize("Rigid Body Dynamics");
        let b = tokenize("Dynamics of Rigid Bodies");
        assert_eq!(overlap_score(&a, &b), overlap_score(&b, &a));
    }

    #[test]
    fn matcher_is_deterministic_on_ties() {
        let topic = platform("Vector Fields Overview", None, None);
        // Both candidates score identically on keyword overlap; the first
        // one listed must win every time.
        let candidates = vec![
            analysis("Vector Calculus Fields", None, ""),
            analysis("Fields of Vector Calculus", None, ""),
        ];
        for _ in 0..10 {
            let hit = best_match(&topic, &candidates, 0.3).unwrap();
            assert_eq!(hit.title, "Vector Calculus Fields");
        }
    }

    #[test]
    fn description_bonus_lifts_score_over_floor() {
        let topic = platform(
            "Oscillations",
            None,
            Some("simple harmonic motion springs pendulum frequency"),
        );
        let candidates = vec![analysis(
            "Periodic Motion",
            None,
            "harmonic motion of springs and pendulum systems with frequency analysis",
        )];
        // Title overlap alone is 0.0; the description bonus must carry it
        // past the floor.
        assert!(best_match(&topic, &candidates, 0.3).is_some());

        let bare = platform("Oscillations", None, None);
        assert!(best_match(&bare, &candidates, 0.3).is_none());
    }

    #[test]
    fn tokenizer_drops_short_tokens_and_punctuation() {
        let tokens = tokenize("L1: Limits & Continuity (of f(x))");
        assert!(tokens.contains("limits"));
        assert!(tokens.contains("continuity"));
        assert!(!tokens.contains("of"));
        assert!(!tokens.contains("l1"));
    }
}
