use crate::core::error::DetectorError;
use crate::core::types::{Document, DocumentSearchResults, SearchHit};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::info;

/// Elasticsearch-compatible vector store speaking over a minimal JSON HTTP
/// API. Two logical indices per collection: a documents index and a
/// `{index}_chunks` index.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn create_index(&self, force: bool) -> Result<(), DetectorError>;
    async fn index_document(&self, doc: &Document) -> Result<(), DetectorError>;
    async fn get_document(
        &self,
        id: &str,
        with_chunks: bool,
    ) -> Result<Option<Document>, DetectorError>;
    async fn delete_document(&self, id: &str) -> Result<bool, DetectorError>;
    async fn search_documents(
        &self,
        query: Option<&str>,
        filters: &HashMap<String, String>,
        limit: usize,
        offset: usize,
    ) -> Result<DocumentSearchResults, DetectorError>;
    async fn knn_search(
        &self,
        vector: &[f32],
        top_k: usize,
        min_score: f64,
        exclude_doc_ids: &[String],
        max_results_per_source: usize,
    ) -> Result<Vec<SearchHit>, DetectorError>;
    async fn document_count(&self) -> Result<u64, DetectorError>;
}

pub struct ElasticVectorStore {
    http: reqwest::Client,
    base_url: String,
    index: String,
    user: String,
    password: String,
    embedding_dims: usize,
}

impl ElasticVectorStore {
    pub fn new(
        http: reqwest::Client,
        base_url: String,
        index: String,
        user: String,
        password: String,
        embedding_dims: usize,
    ) -> Self {
        Self {
            http,
            base_url,
            index,
            user,
            password,
            embedding_dims,
        }
    }

    fn chunks_index(&self) -> String {
        format!("{}_chunks", self.index)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.url(path))
            .basic_auth(&self.user, Some(&self.password))
    }

    async fn refresh(&self, index: &str) -> Result<(), DetectorError> {
        self.request(reqwest::Method::POST, &format!("{}/_refresh", index))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for ElasticVectorStore {
    async fn create_index(&self, force: bool) -> Result<(), DetectorError> {
        if force {
            for idx in [self.index.clone(), self.chunks_index()] {
                let _ = self
                    .request(reqwest::Method::DELETE, &idx)
                    .send()
                    .await;
            }
        }

        let documents_mapping = json!({
            "mappings": {
                "properties": {
                    "title": {"type": "text"},
                    "content": {"type": "text"},
                    "language": {"type": "keyword"},
                    "metadata": {"type": "object"},
                    "created_at": {"type": "date"},
                    "updated_at": {"type": "date"},
                    "chunk_count": {"type": "integer"}
                }
            }
        });
        self.request(reqwest::Method::PUT, &self.index)
            .json(&documents_mapping)
            .send()
            .await?
            .error_for_status()?;

        let chunks_mapping = json!({
            "settings": {"index": {"knn": true}},
            "mappings": {
                "properties": {
                    "document_id": {"type": "keyword"},
                    "document_title": {"type": "text"},
                    "text": {"type": "text"},
                    "embedding": {
                        "type": "dense_vector",
                        "dims": self.embedding_dims,
                        "similarity": "cosine"
                    },
                    "position": {"type": "integer"},
                    "word_count": {"type": "integer"},
                    "metadata": {"type": "object"},
                    "created_at": {"type": "date"}
                }
            }
        });
        self.request(reqwest::Method::PUT, &self.chunks_index())
            .json(&chunks_mapping)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    async fn index_document(&self, doc: &Document) -> Result<(), DetectorError> {
        self.request(reqwest::Method::PUT, &format!("{}/_doc/{}", self.index, doc.id))
            .json(&json!({
                "title": doc.title,
                "content": doc.content,
                "language": doc.language,
                "metadata": doc.metadata,
                "created_at": doc.created_at,
                "updated_at": doc.updated_at,
                "chunk_count": doc.chunk_count,
            }))
            .send()
            .await?
            .error_for_status()?;

        for chunk in &doc.chunks {
            self.request(
                reqwest::Method::PUT,
                &format!("{}/_doc/{}", self.chunks_index(), chunk.chunk_id),
            )
            .json(&json!({
                "document_id": chunk.document_id,
                "document_title": doc.title,
                "text": chunk.text,
                "embedding": chunk.embedding,
                "position": chunk.position,
                "word_count": chunk.word_count,
                "section_title": chunk.section_title,
                "element_type": chunk.element_type,
                "metadata": chunk.metadata,
                "created_at": chunk.created_at,
            }))
            .send()
            .await?
            .error_for_status()?;
        }

        self.refresh(&self.index).await?;
        self.refresh(&self.chunks_index()).await?;
        info!(document_id = %doc.id, chunks = doc.chunks.len(), "indexed document");
        Ok(())
    }

    async fn get_document(
        &self,
        id: &str,
        with_chunks: bool,
    ) -> Result<Option<Document>, DetectorError> {
        let resp = self
            .request(reqwest::Method::GET, &format!("{}/_doc/{}", self.index, id))
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: Value = resp.error_for_status()?.json().await?;
        let source = body
            .get("_source")
            .cloned()
            .ok_or_else(|| DetectorError::DataCorruption("missing _source".to_string()))?;
        let mut doc: Document = serde_json::from_value(source)?;
        doc.id = id.to_string();

        if with_chunks {
            doc.chunks = self.get_document_chunks(id).await?;
        }
        Ok(Some(doc))
    }

    async fn delete_document(&self, id: &str) -> Result<bool, DetectorError> {
        let resp = self
            .request(reqwest::Method::DELETE, &format!("{}/_doc/{}", self.index, id))
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        resp.error_for_status()?;

        self.request(
            reqwest::Method::POST,
            &format!("{}/_delete_by_query", self.chunks_index()),
        )
        .json(&json!({"query": {"term": {"document_id": id}}}))
        .send()
        .await?
        .error_for_status()?;

        self.refresh(&self.index).await?;
        self.refresh(&self.chunks_index()).await?;
        Ok(true)
    }

    async fn search_documents(
        &self,
        query: Option<&str>,
        filters: &HashMap<String, String>,
        limit: usize,
        offset: usize,
    ) -> Result<DocumentSearchResults, DetectorError> {
        let mut must: Vec<Value> = Vec::new();
        if let Some(q) = query {
            must.push(json!({
                "multi_match": {"query": q, "fields": ["title^2", "content"]}
            }));
        }
        for (k, v) in filters {
            must.push(json!({"term": {format!("metadata.{}", k): v}}));
        }
        let body = json!({
            "from": offset,
            "size": limit,
            "query": {"bool": {"must": must}},
            "sort": [{"created_at": "desc"}]
        });

        let resp: Value = self
            .request(reqwest::Method::POST, &format!("{}/_search", self.index))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let total = resp
            .pointer("/hits/total/value")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        let documents: Vec<Document> = resp
            .pointer("/hits/hits")
            .and_then(|v| v.as_array())
            .map(|hits| {
                hits.iter()
                    .filter_map(|h| {
                        let mut doc: Document = serde_json::from_value(h.get("_source")?.clone()).ok()?;
                        doc.id = h.get("_id")?.as_str()?.to_string();
                        Some(doc)
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(DocumentSearchResults { documents, total })
    }

    async fn knn_search(
        &self,
        vector: &[f32],
        top_k: usize,
        min_score: f64,
        exclude_doc_ids: &[String],
        max_results_per_source: usize,
    ) -> Result<Vec<SearchHit>, DetectorError> {
        let mut knn = json!({
            "field": "embedding",
            "query_vector": vector,
            "k": top_k,
            "num_candidates": top_k * 10,
        });
        if !exclude_doc_ids.is_empty() {
            knn["filter"] = json!({
                "bool": {"must_not": {"terms": {"document_id": exclude_doc_ids}}}
            });
        }

        let resp: Value = self
            .request(reqwest::Method::POST, &format!("{}/_search", self.chunks_index()))
            .json(&json!({"knn": knn, "size": top_k}))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let hits = resp
            .pointer("/hits/hits")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let mut per_source_count: HashMap<String, usize> = HashMap::new();
        let mut results = Vec::new();
        for hit in hits {
            let score = hit.get("_score").and_then(|v| v.as_f64()).unwrap_or(0.0);
            if score < min_score {
                continue;
            }
            let source = match hit.get("_source") {
                Some(s) => s,
                None => continue,
            };
            let document_id = source
                .get("document_id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();

            let count = per_source_count.entry(document_id.clone()).or_insert(0);
            if *count >= max_results_per_source {
                continue;
            }
            *count += 1;

            results.push(SearchHit {
                chunk_id: hit.get("_id").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                document_id,
                document_title: source
                    .get("document_title")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                text: source.get("text").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                semantic_score: score,
            });
        }

        Ok(results)
    }

    async fn document_count(&self) -> Result<u64, DetectorError> {
        let resp: Value = self
            .request(reqwest::Method::GET, &format!("{}/_count", self.index))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.get("count").and_then(|v| v.as_u64()).unwrap_or(0))
    }
}

impl ElasticVectorStore {
    async fn get_document_chunks(
        &self,
        document_id: &str,
    ) -> Result<Vec<crate::core::types::Chunk>, DetectorError> {
        let body = json!({
            "size": 1000,
            "query": {"term": {"document_id": document_id}},
            "sort": [{"position": "asc"}]
        });
        let resp: Value = self
            .request(reqwest::Method::POST, &format!("{}/_search", self.chunks_index()))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let hits = resp
            .pointer("/hits/hits")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let mut chunks = Vec::new();
        for hit in hits {
            let Some(source) = hit.get("_source") else { continue };
            let Ok(mut chunk) = serde_json::from_value::<crate::core::types::Chunk>(source.clone()) else {
                continue;
            };
            if let Some(id) = hit.get("_id").and_then(|v| v.as_str()) {
                chunk.chunk_id = id.to_string();
            }
            chunks.push(chunk);
        }
        Ok(chunks)
    }
}
