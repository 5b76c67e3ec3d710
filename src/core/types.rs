use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Domain model (§3)
// ---------------------------------------------------------------------------

/// Typed element shape a chunk was derived from. `Mixed` marks a PDF section
/// whose constituent elements had more than one dominant type.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum ElementType {
    Title,
    Header,
    NarrativeText,
    ListItem,
    Table,
    Text,
    Footer,
    PageBreak,
    Mixed,
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Chunk {
    /// `{docId}_chunk_{n}`
    pub chunk_id: String,
    pub document_id: String,
    pub position: usize,
    pub embedding: Vec<f32>,
    pub text: String,
    pub word_count: usize,
    #[serde(default)]
    pub section_title: Option<String>,
    #[serde(default)]
    pub element_type: Option<ElementType>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    pub language: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub chunk_count: usize,
    #[serde(default)]
    pub chunks: Vec<Chunk>,
}

/// Ephemeral — produced per check, never persisted.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Match {
    pub document_id: String,
    pub document_title: String,
    pub matched_chunk_id: String,
    pub matched_text: String,
    pub input_chunk_index: usize,
    pub input_text: String,
    /// Combined similarity score in [0,1]. Never the raw semantic score —
    /// that is kept separately so components can be inspected independently.
    pub similarity_score: f64,
    pub semantic_score: f64,
    pub lexical_score: f64,
    pub char_offset_start: usize,
    pub char_offset_end: usize,
}

/// Ephemeral per-input-chunk analysis.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChunkAnalysis {
    pub input_chunk_index: usize,
    pub input_text: String,
    pub best_similarity: f64,
    pub severity: String,
    pub best_match_document_id: Option<String>,
    pub best_match_document_title: Option<String>,
    pub candidates: Vec<Match>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct PdfTimings {
    pub extract_ms: u64,
    pub embed_ms: u64,
    pub search_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CheckResult {
    pub request_id: String,
    pub percentage: f64,
    pub severity: String,
    pub explanation: String,
    pub matches: Vec<Match>,
    pub chunk_analyses: Vec<ChunkAnalysis>,
    pub total_ms: u64,
    #[serde(default)]
    pub pdf_timings: Option<PdfTimings>,
    pub embed_ms: u64,
    pub search_ms: u64,
    pub chunks_analyzed: usize,
    pub documents_searched: u64,
}

impl CheckResult {
    /// SAFE, empty, zero-cost result — used for empty input and validation-class
    /// failures that must still carry a severity (§7).
    pub fn empty_safe(request_id: String, message: impl Into<String>) -> Self {
        Self {
            request_id,
            percentage: 0.0,
            severity: "SAFE".to_string(),
            explanation: message.into(),
            matches: Vec::new(),
            chunk_analyses: Vec::new(),
            total_ms: 0,
            pdf_timings: None,
            embed_ms: 0,
            search_ms: 0,
            chunks_analyzed: 0,
            documents_searched: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Vector store result shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk_id: String,
    pub document_id: String,
    pub document_title: String,
    pub text: String,
    pub semantic_score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentSearchResults {
    pub documents: Vec<Document>,
    pub total: u64,
}

// ---------------------------------------------------------------------------
// RPC-shaped request/response DTOs (§6), exposed over the axum JSON surface.
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct CheckOptions {
    #[serde(default)]
    pub min_similarity: Option<f64>,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub include_explanation: Option<bool>,
    #[serde(default)]
    pub exclude_docs: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckTextRequest {
    pub text: String,
    #[serde(default)]
    pub options: CheckOptions,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckPdfRequest {
    pub bucket: String,
    pub path: String,
    #[serde(default)]
    pub options: CheckOptions,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadTextRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadTextResponse {
    pub id: String,
    pub title: String,
    pub chunks_created: usize,
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchUploadRequest {
    pub items: Vec<UploadTextRequest>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchUploadResponse {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<UploadTextResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetDocumentQuery {
    #[serde(default)]
    pub include_content: bool,
    #[serde(default)]
    pub include_chunks: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteDocumentResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct SearchDocumentsQuery {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub filters: HashMap<String, String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    10
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchDocumentsResponse {
    pub documents: Vec<Document>,
    pub total: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IndexPdfRequest {
    pub bucket: String,
    pub path: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChunkPreview {
    pub chunk_id: String,
    pub position: usize,
    pub preview: String,
    pub element_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IndexPdfResponse {
    pub id: String,
    pub title: String,
    pub total_chunks: usize,
    pub chunks: Vec<ChunkPreview>,
    pub processing_metadata: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub dependencies: HashMap<String, DependencyHealth>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DependencyHealth {
    pub healthy: bool,
    pub message: String,
}
