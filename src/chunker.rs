use crate::core::config::Config;
use crate::core::types::Chunk;
use regex::Regex;
use std::sync::OnceLock;

fn sentence_boundary() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // The `regex` crate has no lookbehind support, so the boundary punctuation
    // is consumed by the split; sentences below keep their trailing mark by
    // reattaching it before trimming (see `sentence_split`).
    RE.get_or_init(|| Regex::new(r"([.!?])\s+").unwrap())
}

/// Normalizes text: collapses whitespace runs to single spaces and strips
/// C0/C1 control characters, leaving tab/LF/CR as spaces. Never lowercases or
/// strips accents — that is left to `lexical::normalize_for_comparison`.
pub fn normalize(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    for c in text.chars() {
        let code = c as u32;
        if (code <= 0x1F && !matches!(c, '\t' | '\n' | '\r')) || (0x7F..=0x9F).contains(&code) {
            cleaned.push(' ');
        } else if matches!(c, '\t' | '\n' | '\r') {
            cleaned.push(' ');
        } else {
            cleaned.push(c);
        }
    }
    let words: Vec<&str> = cleaned.split_whitespace().collect();
    words.join(" ")
}

pub struct Chunker<'a> {
    config: &'a Config,
}

impl<'a> Chunker<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// `chunkText(text) → [Chunk]` per §4.1. `document_id` is only used to
    /// build chunk ids; callers that don't yet have a document id can pass a
    /// placeholder and rewrite ids afterward (as the Indexer does).
    pub fn chunk_text(&self, document_id: &str, text: &str) -> Vec<Chunk> {
        let normalized = normalize(text);
        let words: Vec<&str> = normalized.split(' ').filter(|w| !w.is_empty()).collect();
        if words.is_empty() {
            return Vec::new();
        }

        let chunk_size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;
        let min_chunk_size = self.config.min_chunk_size;

        if words.len() <= chunk_size {
            return vec![self.make_chunk(document_id, 0, &normalized, &words, 0, words.len())];
        }

        let stride = chunk_size.saturating_sub(overlap).max(1);
        let mut windows: Vec<(usize, usize)> = Vec::new();
        let mut start = 0usize;
        while start < words.len() {
            let end = (start + chunk_size).min(words.len());
            windows.push((start, end));
            if end == words.len() {
                break;
            }
            start += stride;
        }

        // Drop a too-small final window unless it is the only chunk produced.
        if windows.len() > 1 {
            if let Some(&(last_start, last_end)) = windows.last() {
                if last_end - last_start < min_chunk_size {
                    windows.pop();
                }
            }
        }

        windows
            .into_iter()
            .enumerate()
            .map(|(i, (s, e))| self.make_chunk(document_id, i, &normalized, &words, s, e))
            .collect()
    }

    fn make_chunk(
        &self,
        document_id: &str,
        position: usize,
        _normalized: &str,
        words: &[&str],
        start: usize,
        end: usize,
    ) -> Chunk {
        let text = words[start..end].join(" ");
        Chunk {
            chunk_id: format!("{}_chunk_{}", document_id, position),
            document_id: document_id.to_string(),
            position,
            embedding: Vec::new(),
            word_count: end - start,
            text,
            section_title: None,
            element_type: None,
            metadata: Default::default(),
            created_at: chrono::Utc::now(),
        }
    }

    /// Same windowing as `chunk_text`, but returns `(word_start, word_end)`
    /// indices alongside each chunk so callers can compute char offsets into
    /// the normalized input with `word_char_offset`.
    pub fn chunk_text_with_word_spans(
        &self,
        document_id: &str,
        text: &str,
    ) -> (String, Vec<(Chunk, usize, usize)>) {
        let normalized = normalize(text);
        let words: Vec<&str> = normalized.split(' ').filter(|w| !w.is_empty()).collect();
        if words.is_empty() {
            return (normalized, Vec::new());
        }

        let chunk_size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;
        let min_chunk_size = self.config.min_chunk_size;

        let mut windows: Vec<(usize, usize)> = if words.len() <= chunk_size {
            vec![(0, words.len())]
        } else {
            let stride = chunk_size.saturating_sub(overlap).max(1);
            let mut w = Vec::new();
            let mut start = 0usize;
            while start < words.len() {
                let end = (start + chunk_size).min(words.len());
                w.push((start, end));
                if end == words.len() {
                    break;
                }
                start += stride;
            }
            if w.len() > 1 {
                if let Some(&(ls, le)) = w.last() {
                    if le - ls < min_chunk_size {
                        w.pop();
                    }
                }
            }
            w
        };

        if windows.is_empty() {
            windows.push((0, words.len()));
        }

        let spans = windows
            .into_iter()
            .enumerate()
            .map(|(i, (s, e))| {
                (
                    self.make_chunk(document_id, i, &normalized, &words, s, e),
                    s,
                    e,
                )
            })
            .collect();
        (normalized, spans)
    }

    /// Split `text` into sentences on `(?<=[.!?])\s+` boundaries — i.e. after
    /// a `.`/`!`/`?`, keeping the punctuation attached to the sentence that
    /// precedes it.
    pub fn sentence_split(&self, text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut start = 0usize;
        for m in sentence_boundary().find_iter(text) {
            let boundary = m.start() + 1; // keep the punctuation mark itself
            let sentence = text[start..boundary].trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            start = m.end();
        }
        let tail = text[start..].trim();
        if !tail.is_empty() {
            sentences.push(tail.to_string());
        }
        sentences
    }

    /// `chunkBySentences(max=5)` with 1-sentence overlap: the last sentence of
    /// a filled window seeds the next window.
    pub fn chunk_by_sentences(&self, document_id: &str, text: &str, max: usize) -> Vec<Chunk> {
        let sentences = self.sentence_split(text);
        if sentences.is_empty() {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut i = 0usize;
        let mut position = 0usize;
        while i < sentences.len() {
            let end = (i + max).min(sentences.len());
            let group = &sentences[i..end];
            let joined = group.join(" ");
            let word_count = joined.split_whitespace().count();
            let is_final_remainder = end == sentences.len() && group.len() <= 1;
            if !(is_final_remainder && word_count < self.config.min_chunk_size) {
                chunks.push(Chunk {
                    chunk_id: format!("{}_chunk_{}", document_id, position),
                    document_id: document_id.to_string(),
                    position,
                    embedding: Vec::new(),
                    word_count,
                    text: joined,
                    section_title: None,
                    element_type: None,
                    metadata: Default::default(),
                    created_at: chrono::Utc::now(),
                });
                position += 1;
            }
            if end >= sentences.len() {
                break;
            }
            // keep the last sentence of this window as the seed of the next
            i = end.saturating_sub(1);
        }
        chunks
    }

    /// `detectLanguage(text) → "vi"|"en"|...|"unknown"`. Advisory only; never
    /// gates retrieval.
    pub fn detect_language(&self, text: &str) -> String {
        if text.trim().chars().count() < 20 {
            return "unknown".to_string();
        }
        match whatlang::detect(text) {
            Some(info) => match info.lang() {
                whatlang::Lang::Eng => "en".to_string(),
                whatlang::Lang::Vie => "vi".to_string(),
                whatlang::Lang::Spa => "es".to_string(),
                whatlang::Lang::Fra => "fr".to_string(),
                whatlang::Lang::Deu => "de".to_string(),
                whatlang::Lang::Ita => "it".to_string(),
                whatlang::Lang::Por => "pt".to_string(),
                whatlang::Lang::Rus => "ru".to_string(),
                whatlang::Lang::Jpn => "ja".to_string(),
                whatlang::Lang::Kor => "ko".to_string(),
                whatlang::Lang::Cmn => "zh".to_string(),
                other => format!("{:?}", other).to_lowercase(),
            },
            None => "unknown".to_string(),
        }
    }
}

/// Character offset of the `upto`-th word in a whitespace-joined word
/// sequence, summing prior word lengths plus one space each. Used by the
/// Detector to report `char_offset_start/end` on a `Match` against the
/// original (normalized) input text.
pub fn word_char_offset(words: &[&str], upto: usize, text_len: usize) -> usize {
    let offset: usize = words[..upto.min(words.len())]
        .iter()
        .map(|w| w.chars().count() + 1)
        .sum();
    offset.min(text_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> Config {
        Config::from_env()
    }

    #[test]
    fn short_text_is_single_chunk() {
        let c = cfg();
        let chunker = Chunker::new(&c);
        let chunks = chunker.chunk_text("doc1", "hello world, this is short");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_id, "doc1_chunk_0");
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        let c = cfg();
        let chunker = Chunker::new(&c);
        assert!(chunker.chunk_text("doc1", "").is_empty());
        assert!(chunker.chunk_text("doc1", "   \n\t  ").is_empty());
    }

    #[test]
    fn long_text_overlaps_by_configured_amount() {
        let mut c = cfg();
        c.chunk_size = 10;
        c.chunk_overlap = 3;
        c.min_chunk_size = 2;
        let chunker = Chunker::new(&c);
        let words: Vec<String> = (0..25).map(|i| format!("w{}", i)).collect();
        let text = words.join(" ");
        let chunks = chunker.chunk_text("doc1", &text);
        assert!(chunks.len() >= 2);
        for w in chunks.windows(2) {
            assert_eq!(w[0].word_count, 10);
        }
    }

    #[test]
    fn detect_language_below_20_chars_is_unknown() {
        let c = cfg();
        let chunker = Chunker::new(&c);
        assert_eq!(chunker.detect_language("short"), "unknown");
    }

    #[test]
    fn sentence_split_breaks_on_punctuation() {
        let c = cfg();
        let chunker = Chunker::new(&c);
        let sentences = chunker.sentence_split("One. Two! Three?");
        assert_eq!(sentences.len(), 3);
    }
}
