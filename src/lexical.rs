use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn citation_year_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\([^()]*\d{4}[^()]*\)").unwrap())
}

fn non_word_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s]").unwrap())
}

fn citation_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            vec![
                citation_year_pattern().clone(),
                Regex::new(r"\[\d+(,\s*\d+)*\]").unwrap(),
                Regex::new(r"(?i)nguồn\s*:").unwrap(),
                Regex::new(r"(?i)theo\s+\w+").unwrap(),
                Regex::new(r"(?i)và\s+đtg").unwrap(),
                Regex::new(r"(?i)et\s+al").unwrap(),
            ]
        })
        .as_slice()
}

/// Lowercases, strips `(...YYYY...)`-shaped citations, replaces non-word
/// characters with spaces, and collapses whitespace — in that order, so
/// citation text never inflates lexical overlap.
pub fn normalize_for_comparison(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = citation_year_pattern().replace_all(&lowered, " ");
    let despunct = non_word_pattern().replace_all(&stripped, " ");
    despunct.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// True if any citation-signalling pattern matches, case-insensitively.
/// Idempotent with respect to `normalize_for_comparison`: stripping citations
/// twice is the same as stripping them once, since the second pass finds
/// nothing left to strip.
pub fn has_citation(text: &str) -> bool {
    citation_patterns().iter().any(|re| re.is_match(text))
}

fn word_set(text: &str) -> HashSet<&str> {
    text.split_whitespace().collect()
}

fn words(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

/// Jaccard similarity over word sets.
pub fn jaccard(a: &str, b: &str) -> f64 {
    let sa = word_set(a);
    let sb = word_set(b);
    if sa.is_empty() && sb.is_empty() {
        return 0.0;
    }
    let intersection = sa.intersection(&sb).count();
    let union = sa.union(&sb).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Ratio of the longest common subsequence of characters to the combined
/// length of both strings — `2*lcs / (len(a) + len(b))` — the standard
/// stand-in for `difflib.SequenceMatcher.ratio()`.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let ac: Vec<char> = a.chars().collect();
    let bc: Vec<char> = b.chars().collect();
    if ac.is_empty() && bc.is_empty() {
        return 1.0;
    }
    if ac.is_empty() || bc.is_empty() {
        return 0.0;
    }

    let mut prev = vec![0usize; bc.len() + 1];
    let mut curr = vec![0usize; bc.len() + 1];
    for i in 1..=ac.len() {
        for j in 1..=bc.len() {
            curr[j] = if ac[i - 1] == bc[j - 1] {
                prev[j - 1] + 1
            } else {
                prev[j].max(curr[j - 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    let lcs = prev[bc.len()];
    (2 * lcs) as f64 / (ac.len() + bc.len()) as f64
}

fn bigrams(text: &str) -> HashSet<(&str, &str)> {
    let w = words(text);
    w.windows(2).map(|pair| (pair[0], pair[1])).collect()
}

/// Jaccard similarity over word bigrams (n=2).
pub fn ngram_jaccard(a: &str, b: &str) -> f64 {
    let ba = bigrams(a);
    let bb = bigrams(b);
    if ba.is_empty() && bb.is_empty() {
        return 0.0;
    }
    let intersection = ba.intersection(&bb).count();
    let union = ba.union(&bb).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// `0.30*Jaccard + 0.40*SequenceRatio + 0.30*NgramJaccard`.
pub fn symmetric_lexical(a: &str, b: &str) -> f64 {
    0.30 * jaccard(a, b) + 0.40 * sequence_ratio(a, b) + 0.30 * ngram_jaccard(a, b)
}

/// Fraction of words in `matched` that also appear in `input`.
fn containment(input: &str, matched: &str) -> f64 {
    let matched_words = word_set(matched);
    if matched_words.is_empty() {
        return 0.0;
    }
    let input_words = word_set(input);
    let shared = matched_words.intersection(&input_words).count();
    shared as f64 / matched_words.len() as f64
}

/// The correctness-critical case: a long input containing a plagiarized
/// fragment matching a small chunk. When the matched text is not a
/// near-equal-length counterpart of the input (`r <= 0.7`), falls back to a
/// containment-weighted blend instead of symmetric lexical similarity, which
/// would otherwise be diluted by the input's unrelated surrounding words.
pub fn asymmetric_lexical(input: &str, matched: &str) -> f64 {
    let input_words = words(input).len();
    let matched_words = words(matched).len();
    if input_words == 0 {
        return 0.0;
    }
    let r = matched_words as f64 / input_words as f64;
    if r > 0.7 {
        symmetric_lexical(input, matched)
    } else {
        0.6 * containment(input, matched) + 0.4 * sequence_ratio(input, matched)
    }
}

/// Weighted blend of semantic cosine score and asymmetric lexical similarity,
/// reduced by a flat citation penalty when the input text attributes its
/// source. `input`/`matched` must already be normalized via
/// `normalize_for_comparison`.
pub fn combined_similarity(
    semantic: f64,
    input_normalized: &str,
    matched_normalized: &str,
    raw_input: &str,
    semantic_weight: f64,
    lexical_weight: f64,
    citation_penalty: f64,
) -> (f64, f64) {
    let lex = asymmetric_lexical(input_normalized, matched_normalized);
    let mut combined = semantic_weight * semantic + lexical_weight * lex;
    if has_citation(raw_input) {
        combined = (combined - citation_penalty).max(0.0);
    }
    (combined.clamp(0.0, 1.0), lex)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jaccard_identical_texts_is_one() {
        assert_eq!(jaccard("a b c", "a b c"), 1.0);
    }

    #[test]
    fn sequence_ratio_identical_is_one() {
        assert_eq!(sequence_ratio("hello", "hello"), 1.0);
    }

    #[test]
    fn has_citation_is_case_insensitive_and_idempotent() {
        let text = "Theo Nguyen (2024), plagiarism is bad. Et al.";
        assert!(has_citation(text));
        assert!(has_citation(&text.to_uppercase()));
        let stripped_once = normalize_for_comparison(text);
        let stripped_twice = normalize_for_comparison(&stripped_once);
        assert_eq!(stripped_once, stripped_twice);
    }

    #[test]
    fn asymmetric_lexical_detects_short_chunk_in_long_input() {
        let matched = "machine learning is a branch of artificial intelligence";
        let mut input_words = vec!["padding"; 50];
        let matched_words: Vec<&str> = matched.split_whitespace().collect();
        input_words.extend(matched_words.iter());
        let input = input_words.join(" ");
        let score = asymmetric_lexical(&input, matched);
        assert!(score > 0.5, "expected containment-driven score, got {score}");
    }

    #[test]
    fn citation_penalty_lowers_combined_score() {
        let (with_citation, _) = combined_similarity(
            0.9,
            "theo nguyen machine learning is ai",
            "machine learning is ai",
            "Theo Nguyen (2024), machine learning is ai",
            0.5,
            0.5,
            0.15,
        );
        let (without_citation, _) = combined_similarity(
            0.9,
            "machine learning is ai",
            "machine learning is ai",
            "machine learning is ai",
            0.5,
            0.5,
            0.15,
        );
        assert!(with_citation < without_citation);
    }
}
