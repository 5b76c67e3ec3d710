mod aggregate;
mod dedup;

use crate::chunker::{normalize, word_char_offset, Chunker};
use crate::clients::{Embedder, Explainer, ObjectStore, VectorStore};
use crate::core::config::Config;
use crate::core::error::DetectorError;
use crate::core::types::{
    CheckOptions, CheckResult, Chunk, ChunkAnalysis, Match, PdfTimings,
};
use crate::lexical;
use crate::pdf::PdfExtractor;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

pub use aggregate::aggregate_percentage;
pub use dedup::deduplicate_matches;

pub struct Detector {
    config: Arc<Config>,
    embedder: Arc<dyn Embedder>,
    vector_store: Arc<dyn VectorStore>,
    object_store: Arc<dyn ObjectStore>,
    explainer: Arc<dyn Explainer>,
    concurrency: Arc<Semaphore>,
}

impl Detector {
    pub fn new(
        config: Arc<Config>,
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
        object_store: Arc<dyn ObjectStore>,
        explainer: Arc<dyn Explainer>,
        concurrency: Arc<Semaphore>,
    ) -> Self {
        Self {
            config,
            embedder,
            vector_store,
            object_store,
            explainer,
            concurrency,
        }
    }

    /// `check(text, options) → CheckResult` per §4.8.
    pub async fn check(&self, text: &str, options: &CheckOptions) -> Result<CheckResult, DetectorError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let start = Instant::now();

        let chunker = Chunker::new(&self.config);
        let (normalized_input, spans) = chunker.chunk_text_with_word_spans(&request_id, text);
        if spans.is_empty() {
            return Ok(CheckResult::empty_safe(request_id, "empty input"));
        }
        let chunks: Vec<Chunk> = spans.iter().map(|(c, _, _)| c.clone()).collect();

        let embed_start = Instant::now();
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        let embed_ms = embed_start.elapsed().as_millis() as u64;

        let top_k = options.top_k.unwrap_or(self.config.top_k_results);
        let min_sim = options.min_similarity.unwrap_or(self.config.min_score_threshold);
        let exclude_docs = options.exclude_docs.clone();

        let search_start = Instant::now();
        let normalized_words: Vec<&str> = normalized_input.split(' ').filter(|w| !w.is_empty()).collect();
        let normalized_len = normalized_input.len();

        let analyses = self
            .analyze_chunks(&chunks, &vectors, &spans, &normalized_words, normalized_len, top_k, min_sim, &exclude_docs)
            .await?;
        let search_ms = search_start.elapsed().as_millis() as u64;

        let all_matches: Vec<Match> = analyses
            .iter()
            .flat_map(|a| a.candidates.clone())
            .collect();
        let matches = deduplicate_matches(all_matches);

        let total_word_count: usize = chunks.iter().map(|c| c.word_count).sum();
        let base_percentage = aggregate_percentage(&analyses, &chunks, self.config.thresholds.low, total_word_count);
        let base_severity = self.config.thresholds.classify(base_percentage / 100.0);

        let include_explanation = options.include_explanation.unwrap_or(false);
        let (percentage, severity, explanation) = if include_explanation && !matches.is_empty() {
            let top_matches: Vec<Match> = {
                let mut sorted = matches.clone();
                sorted.sort_by(|a, b| b.similarity_score.partial_cmp(&a.similarity_score).unwrap_or(std::cmp::Ordering::Equal));
                sorted.into_iter().take(10).collect()
            };
            let result = self.explainer.explain(text, &top_matches, base_percentage, base_severity).await;
            (result.percentage, result.severity, result.explanation)
        } else {
            (
                base_percentage,
                base_severity.to_string(),
                deterministic_explanation(base_percentage, base_severity, matches.len()),
            )
        };

        let documents_searched = self.vector_store.document_count().await.unwrap_or(0);

        Ok(CheckResult {
            request_id,
            percentage,
            severity,
            explanation,
            matches,
            chunk_analyses: analyses,
            total_ms: start.elapsed().as_millis() as u64,
            pdf_timings: None,
            embed_ms,
            search_ms,
            chunks_analyzed: chunks.len(),
            documents_searched,
        })
    }

    /// Same algorithm as `check`, but starting from a PDF fetched from the
    /// object store. Extraction/embed/search timings are recorded separately
    /// and the downloaded temp file is cleaned up on every exit path.
    pub async fn check_pdf_from_object_store(
        &self,
        bucket: &str,
        path: &str,
        options: &CheckOptions,
    ) -> Result<CheckResult, DetectorError> {
        let request_id = uuid::Uuid::new_v4().to_string();

        if !self.object_store.exists(bucket, path).await.unwrap_or(false) {
            return Ok(CheckResult::empty_safe(
                request_id,
                format!("object not found: bucket={} path={}", bucket, path),
            ));
        }

        let temp_file = match self.object_store.get_to_temp_file(bucket, path).await {
            Ok(f) => f,
            Err(e) => {
                return Ok(CheckResult::empty_safe(
                    request_id,
                    format!("failed to download pdf: {}", e),
                ))
            }
        };

        let extract_start = Instant::now();
        let extractor = PdfExtractor::new(&self.config);
        let extraction = extractor.process(&temp_file, &request_id).await;
        let _ = tokio::fs::remove_file(&temp_file).await;
        let extraction = match extraction {
            Ok(e) => e,
            Err(e) => {
                return Ok(CheckResult::empty_safe(
                    request_id,
                    format!("failed to extract pdf: {}", e),
                ))
            }
        };
        let extract_ms = extract_start.elapsed().as_millis() as u64;

        if extraction.chunks.is_empty() {
            return Ok(CheckResult::empty_safe(request_id, "no extractable text in pdf"));
        }

        let chunks = extraction.chunks;
        let embed_start = Instant::now();
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        let embed_ms = embed_start.elapsed().as_millis() as u64;

        let top_k = options.top_k.unwrap_or(self.config.top_k_results);
        let min_sim = options.min_similarity.unwrap_or(self.config.min_score_threshold);
        let exclude_docs = options.exclude_docs.clone();

        let search_start = Instant::now();
        let spans: Vec<(Chunk, usize, usize)> = chunks.iter().map(|c| (c.clone(), 0, 0)).collect();
        let analyses = self
            .analyze_chunks(&chunks, &vectors, &spans, &[], 0, top_k, min_sim, &exclude_docs)
            .await?;
        let search_ms = search_start.elapsed().as_millis() as u64;

        let all_matches: Vec<Match> = analyses.iter().flat_map(|a| a.candidates.clone()).collect();
        let matches = deduplicate_matches(all_matches);

        let total_word_count: usize = chunks.iter().map(|c| c.word_count).sum();
        let percentage = aggregate_percentage(&analyses, &chunks, self.config.thresholds.low, total_word_count);
        let severity = self.config.thresholds.classify(percentage / 100.0);
        let documents_searched = self.vector_store.document_count().await.unwrap_or(0);

        Ok(CheckResult {
            request_id,
            percentage,
            severity: severity.to_string(),
            explanation: deterministic_explanation(percentage, severity, matches.len()),
            matches,
            chunk_analyses: analyses,
            total_ms: extract_ms + embed_ms + search_ms,
            pdf_timings: Some(PdfTimings {
                extract_ms,
                embed_ms,
                search_ms,
            }),
            embed_ms,
            search_ms,
            chunks_analyzed: chunks.len(),
            documents_searched,
        })
    }

    /// Per-chunk concurrent fan-out: embed (already done) → kNN → lexical
    /// rescore, bounded by the shared outbound semaphore.
    #[allow(clippy::too_many_arguments)]
    async fn analyze_chunks(
        &self,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
        spans: &[(Chunk, usize, usize)],
        normalized_words: &[&str],
        normalized_len: usize,
        top_k: usize,
        min_sim: f64,
        exclude_docs: &[String],
    ) -> Result<Vec<ChunkAnalysis>, DetectorError> {
        let semantic_weight = self.config.semantic_weight;
        let lexical_weight = self.config.lexical_weight;
        let citation_penalty = self.config.citation_penalty;
        let thresholds = self.config.thresholds;
        let max_per_source = self.config.max_results_per_source;

        let results: Vec<Result<ChunkAnalysis, DetectorError>> = stream::iter(chunks.iter().zip(vectors.iter()).enumerate())
            .map(|(i, (chunk, vector))| {
                let vector_store = self.vector_store.clone();
                let concurrency = self.concurrency.clone();
                let chunk = chunk.clone();
                let vector = vector.clone();
                let exclude_docs = exclude_docs.to_vec();
                let (char_start, char_end) = if i < spans.len() {
                    let (_, s, e) = &spans[i];
                    (
                        word_char_offset(normalized_words, *s, normalized_len),
                        word_char_offset(normalized_words, *e, normalized_len),
                    )
                } else {
                    (0, 0)
                };

                async move {
                    let _permit = concurrency.acquire().await.ok();
                    let raw = vector_store
                        .knn_search(&vector, top_k, min_sim, &exclude_docs, max_per_source)
                        .await?;

                    let input_normalized = lexical::normalize_for_comparison(&chunk.text);
                    let mut candidates = Vec::with_capacity(raw.len());
                    for hit in raw {
                        let matched_normalized = lexical::normalize_for_comparison(&hit.text);
                        let (combined, lex) = lexical::combined_similarity(
                            hit.semantic_score,
                            &input_normalized,
                            &matched_normalized,
                            &chunk.text,
                            semantic_weight,
                            lexical_weight,
                            citation_penalty,
                        );
                        candidates.push(Match {
                            document_id: hit.document_id,
                            document_title: hit.document_title,
                            matched_chunk_id: hit.chunk_id,
                            matched_text: hit.text,
                            input_chunk_index: chunk.position,
                            input_text: chunk.text.clone(),
                            similarity_score: combined,
                            semantic_score: hit.semantic_score,
                            lexical_score: lex,
                            char_offset_start: char_start,
                            char_offset_end: char_end,
                        });
                    }
                    candidates.sort_by(|a, b| {
                        b.similarity_score
                            .partial_cmp(&a.similarity_score)
                            .unwrap_or(std::cmp::Ordering::Equal)
                    });

                    let best = candidates.first();
                    let best_similarity = best.map(|m| m.similarity_score).unwrap_or(0.0);
                    Ok(ChunkAnalysis {
                        input_chunk_index: chunk.position,
                        input_text: chunk.text.clone(),
                        best_similarity,
                        severity: thresholds.classify(best_similarity).to_string(),
                        best_match_document_id: best.map(|m| m.document_id.clone()),
                        best_match_document_title: best.map(|m| m.document_title.clone()),
                        candidates,
                    })
                }
            })
            .buffer_unordered(self.config.outbound_limit.max(1))
            .collect()
            .await;

        let mut analyses = results.into_iter().collect::<Result<Vec<_>, _>>()?;
        analyses.sort_by_key(|a| a.input_chunk_index);
        Ok(analyses)
    }
}

fn deterministic_explanation(percentage: f64, severity: &str, match_count: usize) -> String {
    match severity {
        "CRITICAL" => format!(
            "Phát hiện đạo văn nghiêm trọng: {:.1}% nội dung trùng khớp với {} đoạn văn bản đã lập chỉ mục.",
            percentage, match_count
        ),
        "HIGH" => format!(
            "Phát hiện đạo văn ở mức cao: {:.1}% nội dung trùng khớp với {} đoạn văn bản.",
            percentage, match_count
        ),
        "MEDIUM" => format!(
            "Phát hiện đạo văn ở mức trung bình: {:.1}% nội dung có điểm tương đồng đáng chú ý.",
            percentage
        ),
        "LOW" => format!(
            "Phát hiện một số điểm tương đồng nhẹ: {:.1}% nội dung, {} đoạn trùng khớp.",
            percentage, match_count
        ),
        _ => "Không phát hiện dấu hiệu đạo văn.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_explanation_varies_by_severity() {
        assert!(deterministic_explanation(0.0, "SAFE", 0).contains("Không"));
        assert!(deterministic_explanation(97.0, "CRITICAL", 3).contains("nghiêm trọng"));
    }
}
