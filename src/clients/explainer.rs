use crate::core::types::Match;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

const MAX_INPUT_CHARS: usize = 2000;
const MAX_SNIPPET_CHARS: usize = 500;
const MAX_MATCHES_IN_PROMPT: usize = 5;
const FALLBACK_CONFIDENCE: f64 = 0.6;

#[derive(Debug, Clone)]
pub struct ExplanationResult {
    pub percentage: f64,
    pub severity: String,
    pub explanation: String,
    pub suspicious_segments: Vec<String>,
    pub confidence: f64,
}

/// Builds a severity-justifying natural-language summary from the top
/// matches. Never alters the match list or per-chunk analyses — only its
/// `percentage`/`severity` may override the Detector's own values in the
/// final result. On any transport/timeout error, returns a fallback carrying
/// `base_percentage` with `confidence=0.6`.
#[async_trait]
pub trait Explainer: Send + Sync {
    async fn explain(
        &self,
        input_text: &str,
        top_matches: &[Match],
        base_percentage: f64,
        severity: &str,
    ) -> ExplanationResult;
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn build_prompt(input_text: &str, top_matches: &[Match], base_percentage: f64) -> String {
    let truncated_input = truncate_chars(input_text, MAX_INPUT_CHARS);
    let matches_block = top_matches
        .iter()
        .take(MAX_MATCHES_IN_PROMPT)
        .enumerate()
        .map(|(i, m)| {
            format!(
                "{}. Nguồn: {} (similarity={:.2})\n   {}",
                i + 1,
                m.document_title,
                m.similarity_score,
                truncate_chars(&m.matched_text, MAX_SNIPPET_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Phân tích đạo văn cho văn bản sau (điểm cơ sở: {:.1}%).\n\nVăn bản:\n{}\n\nCác đoạn trùng khớp:\n{}\n\nTrả về JSON với các trường: plagiarism_percentage, severity, explanation, suspicious_segments, confidence.",
        base_percentage, truncated_input, matches_block
    )
}

fn fallback(base_percentage: f64, severity: &str) -> ExplanationResult {
    ExplanationResult {
        percentage: base_percentage,
        severity: severity.to_string(),
        explanation: format!(
            "Không thể tạo giải thích chi tiết; điểm đạo văn ước tính là {:.1}%.",
            base_percentage
        ),
        suspicious_segments: Vec::new(),
        confidence: FALLBACK_CONFIDENCE,
    }
}

#[derive(Deserialize)]
struct ParsedExplanation {
    #[serde(default)]
    plagiarism_percentage: Option<f64>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    suspicious_segments: Option<Vec<String>>,
    #[serde(default)]
    confidence: Option<f64>,
}

fn parse_explanation(raw: &str, base_percentage: f64, severity: &str) -> ExplanationResult {
    let parsed: Option<ParsedExplanation> = serde_json::from_str(raw).ok().or_else(|| {
        // Some models wrap JSON in prose or code fences; try to recover the
        // first top-level object.
        let start = raw.find('{')?;
        let end = raw.rfind('}')?;
        serde_json::from_str(&raw[start..=end]).ok()
    });

    match parsed {
        Some(p) => ExplanationResult {
            percentage: p.plagiarism_percentage.unwrap_or(base_percentage),
            severity: p.severity.unwrap_or_else(|| severity.to_string()),
            explanation: p
                .explanation
                .unwrap_or_else(|| "Không có giải thích.".to_string()),
            suspicious_segments: p.suspicious_segments.unwrap_or_default(),
            confidence: p.confidence.unwrap_or(0.8),
        },
        None => fallback(base_percentage, severity),
    }
}

/// Ollama-style `/api/generate` internal explainer.
pub struct InternalExplainer {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl InternalExplainer {
    pub fn new(http: reqwest::Client, base_url: String, model: String) -> Self {
        Self {
            http,
            base_url,
            model,
        }
    }
}

#[async_trait]
impl Explainer for InternalExplainer {
    async fn explain(
        &self,
        input_text: &str,
        top_matches: &[Match],
        base_percentage: f64,
        severity: &str,
    ) -> ExplanationResult {
        let prompt = build_prompt(input_text, top_matches, base_percentage);
        let result: Result<Value, reqwest::Error> = async {
            self.http
                .post(format!("{}/api/generate", self.base_url))
                .json(&json!({ "model": self.model, "prompt": prompt, "stream": false, "format": "json" }))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
        }
        .await;

        match result {
            Ok(body) => {
                let raw = body.get("response").and_then(|v| v.as_str()).unwrap_or("");
                parse_explanation(raw, base_percentage, severity)
            }
            Err(e) => {
                warn!("internal explainer call failed: {}", e);
                fallback(base_percentage, severity)
            }
        }
    }
}

/// OpenAI/Gemini-style chat-completions external explainer.
pub struct ExternalExplainer {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ExternalExplainer {
    pub fn new(http: reqwest::Client, base_url: String, api_key: String, model: String) -> Self {
        Self {
            http,
            base_url,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl Explainer for ExternalExplainer {
    async fn explain(
        &self,
        input_text: &str,
        top_matches: &[Match],
        base_percentage: f64,
        severity: &str,
    ) -> ExplanationResult {
        let prompt = build_prompt(input_text, top_matches, base_percentage);
        let result: Result<Value, reqwest::Error> = async {
            self.http
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&json!({
                    "model": self.model,
                    "messages": [{"role": "user", "content": prompt}],
                    "response_format": {"type": "json_object"},
                }))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
        }
        .await;

        match result {
            Ok(body) => {
                let raw = body
                    .pointer("/choices/0/message/content")
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                parse_explanation(raw, base_percentage, severity)
            }
            Err(e) => {
                warn!("external explainer call failed: {}", e);
                fallback(base_percentage, severity)
            }
        }
    }
}

/// No-op explainer used when `EXPLAINER_MODE` is unset — matches the spec's
/// "must be disabled by default in production paths".
pub struct DisabledExplainer;

#[async_trait]
impl Explainer for DisabledExplainer {
    async fn explain(
        &self,
        _input_text: &str,
        _top_matches: &[Match],
        base_percentage: f64,
        severity: &str,
    ) -> ExplanationResult {
        fallback(base_percentage, severity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_json_response() {
        let raw = r#"{"plagiarism_percentage": 92.5, "severity": "CRITICAL", "explanation": "x", "suspicious_segments": ["a"], "confidence": 0.9}"#;
        let result = parse_explanation(raw, 10.0, "LOW");
        assert_eq!(result.percentage, 92.5);
        assert_eq!(result.severity, "CRITICAL");
        assert_eq!(result.confidence, 0.9);
    }

    #[test]
    fn recovers_json_embedded_in_prose() {
        let raw = "Here is the result:\n```json\n{\"plagiarism_percentage\": 50.0, \"severity\": \"MEDIUM\"}\n```";
        let result = parse_explanation(raw, 10.0, "LOW");
        assert_eq!(result.percentage, 50.0);
    }

    #[test]
    fn malformed_response_falls_back_with_fixed_confidence() {
        let result = parse_explanation("not json at all", 12.3, "LOW");
        assert_eq!(result.percentage, 12.3);
        assert_eq!(result.confidence, FALLBACK_CONFIDENCE);
    }
}
