use crate::core::types::{Chunk, ChunkAnalysis};

/// Aggregate percentage per the resolved open question: only chunks whose
/// best similarity clears `threshold` contribute, each weighted by its word
/// count against the input's total word count.
///
/// `percentage = (Σ_{i: m_i≥θ} w_i·m_i / T) · 100`
pub fn aggregate_percentage(
    analyses: &[ChunkAnalysis],
    chunks: &[Chunk],
    threshold: f64,
    total_word_count: usize,
) -> f64 {
    if total_word_count == 0 {
        return 0.0;
    }

    let weighted: f64 = analyses
        .iter()
        .filter(|a| a.best_similarity >= threshold)
        .map(|a| {
            let word_count = chunks
                .iter()
                .find(|c| c.position == a.input_chunk_index)
                .map(|c| c.word_count)
                .unwrap_or(0) as f64;
            word_count * a.best_similarity
        })
        .sum();

    (weighted / total_word_count as f64 * 100.0).min(100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(position: usize, word_count: usize) -> Chunk {
        Chunk {
            chunk_id: format!("c{}", position),
            document_id: "doc".to_string(),
            position,
            embedding: Vec::new(),
            text: String::new(),
            word_count,
            section_title: None,
            element_type: None,
            metadata: Default::default(),
            created_at: chrono::Utc::now(),
        }
    }

    fn analysis(position: usize, best_similarity: f64) -> ChunkAnalysis {
        ChunkAnalysis {
            input_chunk_index: position,
            input_text: String::new(),
            best_similarity,
            severity: "SAFE".to_string(),
            best_match_document_id: None,
            best_match_document_title: None,
            candidates: Vec::new(),
        }
    }

    #[test]
    fn below_threshold_chunks_do_not_contribute() {
        let chunks = vec![chunk(0, 100), chunk(1, 100)];
        let analyses = vec![analysis(0, 0.9), analysis(1, 0.3)];
        let pct = aggregate_percentage(&analyses, &chunks, 0.5, 200);
        assert!((pct - 45.0).abs() < 1e-9);
    }

    #[test]
    fn empty_input_has_zero_percentage() {
        assert_eq!(aggregate_percentage(&[], &[], 0.5, 0), 0.0);
    }

    #[test]
    fn full_plagiarism_caps_at_one_hundred() {
        let chunks = vec![chunk(0, 100)];
        let analyses = vec![analysis(0, 1.0)];
        let pct = aggregate_percentage(&analyses, &chunks, 0.5, 100);
        assert!((pct - 100.0).abs() < 1e-9);
    }
}
