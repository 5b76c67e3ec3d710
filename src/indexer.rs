use crate::chunker::Chunker;
use crate::clients::{Embedder, ObjectStore, VectorStore};
use crate::core::config::Config;
use crate::core::error::DetectorError;
use crate::core::types::{ChunkPreview, Document, ElementType, UploadTextResponse};
use crate::pdf::PdfExtractor;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

pub struct Indexer {
    config: Arc<Config>,
    embedder: Arc<dyn Embedder>,
    vector_store: Arc<dyn VectorStore>,
    object_store: Arc<dyn ObjectStore>,
}

impl Indexer {
    pub fn new(
        config: Arc<Config>,
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
        object_store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            config,
            embedder,
            vector_store,
            object_store,
        }
    }

    /// `uploadText` per §4.7.
    pub async fn upload_text(
        &self,
        title: String,
        content: String,
        metadata: HashMap<String, String>,
        language: Option<String>,
        id: Option<String>,
    ) -> Result<UploadTextResponse, DetectorError> {
        let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let chunker = Chunker::new(&self.config);

        let language = match language.as_deref() {
            None | Some("") | Some("auto") => chunker.detect_language(&content),
            Some(lang) => lang.to_string(),
        };

        let mut chunks = chunker.chunk_text(&id, &content);
        if chunks.is_empty() {
            return Ok(UploadTextResponse {
                id,
                title,
                chunks_created: 0,
                success: false,
                message: "content too short".to_string(),
            });
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        for (chunk, vector) in chunks.iter_mut().zip(vectors.into_iter()) {
            chunk.embedding = vector;
        }

        let now = chrono::Utc::now();
        let document = Document {
            id: id.clone(),
            title: title.clone(),
            content,
            language,
            metadata,
            created_at: now,
            updated_at: now,
            chunk_count: chunks.len(),
            chunks,
        };

        self.vector_store.index_document(&document).await?;
        info!(document_id = %id, chunks = document.chunk_count, "uploaded text document");

        Ok(UploadTextResponse {
            id,
            title,
            chunks_created: document.chunk_count,
            success: true,
            message: "indexed successfully".to_string(),
        })
    }

    /// `uploadPdfFromObjectStore` per §4.7. The downloaded temp file is
    /// deleted on every exit path.
    pub async fn upload_pdf_from_object_store(
        &self,
        bucket: String,
        path: String,
        id: Option<String>,
        title_override: Option<String>,
        mut metadata: HashMap<String, String>,
        language: Option<String>,
    ) -> Result<(String, String, usize, Vec<ChunkPreview>, serde_json::Value), DetectorError> {
        if !self.object_store.exists(&bucket, &path).await.unwrap_or(false) {
            return Err(DetectorError::Validation(format!(
                "object not found: bucket={} path={}",
                bucket, path
            )));
        }

        let temp_file = self
            .object_store
            .get_to_temp_file(&bucket, &path)
            .await
            .map_err(|e| {
                DetectorError::Dependency(format!(
                    "failed to download bucket={} path={}: {}",
                    bucket, path, e
                ))
            })?;

        let result = self.process_downloaded_pdf(&temp_file, id, title_override).await;
        let _ = tokio::fs::remove_file(&temp_file).await;
        let (id, title, mut chunks, extraction) = result?;

        metadata.insert("source_bucket".to_string(), bucket);
        metadata.insert("source_path".to_string(), path);
        metadata.insert("pdf_pages".to_string(), extraction.total_pages.to_string());

        let full_content = chunks
            .iter()
            .map(|c| {
                format!(
                    "## {}\n{}",
                    c.section_title.clone().unwrap_or_default(),
                    c.text
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let language = match language.as_deref() {
            None | Some("") | Some("auto") => chunks
                .first()
                .map(|c| Chunker::new(&self.config).detect_language(&c.text))
                .unwrap_or_else(|| "unknown".to_string()),
            Some(lang) => lang.to_string(),
        };

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        for (chunk, vector) in chunks.iter_mut().zip(vectors.into_iter()) {
            chunk.embedding = vector;
        }

        let now = chrono::Utc::now();
        let document = Document {
            id: id.clone(),
            title: title.clone(),
            content: full_content,
            language,
            metadata,
            created_at: now,
            updated_at: now,
            chunk_count: chunks.len(),
            chunks: chunks.clone(),
        };
        self.vector_store.index_document(&document).await?;

        let previews: Vec<ChunkPreview> = chunks
            .iter()
            .map(|c| ChunkPreview {
                chunk_id: c.chunk_id.clone(),
                position: c.position,
                preview: c.text.chars().take(200).collect(),
                element_type: c
                    .element_type
                    .clone()
                    .unwrap_or(ElementType::Text)
                    .to_string(),
            })
            .collect();

        let processing_metadata = serde_json::json!({
            "filename": extraction.metadata.filename,
            "filetype": extraction.metadata.filetype,
            "first_page_number": extraction.metadata.first_page_number,
            "total_pages": extraction.total_pages,
            "total_elements": extraction.total_elements,
            "processing_ms": extraction.processing_ms,
        });

        Ok((id, title, document.chunk_count, previews, processing_metadata))
    }

    async fn process_downloaded_pdf(
        &self,
        temp_file: &std::path::Path,
        id: Option<String>,
        title_override: Option<String>,
    ) -> Result<(String, String, Vec<crate::core::types::Chunk>, crate::pdf::PdfProcessResult), DetectorError> {
        let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let extractor = PdfExtractor::new(&self.config);
        let result = extractor.process(temp_file, &id).await?;
        let title = title_override.unwrap_or_else(|| result.title.clone());
        let chunks = result.chunks.clone();
        Ok((id, title, chunks, result))
    }
}
