use crate::core::types::Match;
use std::collections::HashSet;

/// Deduplicates matches by `matched_chunk_id`, keeping the highest-scoring
/// match for each id. The same source chunk can otherwise surface once per
/// input chunk it resembles.
pub fn deduplicate_matches(mut matches: Vec<Match>) -> Vec<Match> {
    matches.sort_by(|a, b| {
        b.similarity_score
            .partial_cmp(&a.similarity_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(matches.len());
    for m in matches {
        if seen.insert(m.matched_chunk_id.clone()) {
            out.push(m);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_match(chunk_id: &str, score: f64) -> Match {
        Match {
            document_id: "doc".to_string(),
            document_title: "Doc".to_string(),
            matched_chunk_id: chunk_id.to_string(),
            matched_text: String::new(),
            input_chunk_index: 0,
            input_text: String::new(),
            similarity_score: score,
            semantic_score: score,
            lexical_score: score,
            char_offset_start: 0,
            char_offset_end: 0,
        }
    }

    #[test]
    fn keeps_highest_scoring_match_per_chunk_id() {
        let matches = vec![sample_match("a", 0.6), sample_match("a", 0.9), sample_match("b", 0.4)];
        let deduped = deduplicate_matches(matches);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].matched_chunk_id, "a");
        assert_eq!(deduped[0].similarity_score, 0.9);
    }
}
