//! End-to-end scenarios driven against in-memory test doubles for every
//! external client. Assertions favor directional/threshold properties over
//! exact numbers, since the test doubles are hand-built analogues of a real
//! embedder/search engine rather than one.

use async_trait::async_trait;
use plagiscope::clients::explainer::DisabledExplainer;
use plagiscope::clients::{Embedder, ObjectStore, VectorStore};
use plagiscope::core::error::DetectorError;
use plagiscope::core::types::{CheckOptions, Document, DocumentSearchResults, SearchHit};
use plagiscope::{Chunk, Config, Detector, Indexer};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

fn fnv1a(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in s.bytes() {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

const DIM: usize = 4096;

/// One-hot-per-significant-word hashed vector. Cosine similarity between two
/// such vectors approximates the Jaccard-style word overlap of the two texts
/// (short words are dropped so stopwords don't dominate).
fn hashed_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0f32; DIM];
    for word in text.split(|c: char| !c.is_alphanumeric()) {
        let w = word.to_lowercase();
        if w.chars().count() <= 2 {
            continue;
        }
        let idx = (fnv1a(&w) as usize) % DIM;
        v[idx] = 1.0;
    }
    v
}

struct TestEmbedder;

#[async_trait]
impl Embedder for TestEmbedder {
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, DetectorError> {
        Ok(hashed_vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DetectorError> {
        Ok(texts.iter().map(|t| hashed_vector(t)).collect())
    }
}

#[derive(Default)]
struct InMemoryVectorStore {
    documents: Mutex<Vec<Document>>,
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (dot / (norm_a * norm_b)) as f64
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn create_index(&self, _force: bool) -> Result<(), DetectorError> {
        Ok(())
    }

    async fn index_document(&self, doc: &Document) -> Result<(), DetectorError> {
        let mut docs = self.documents.lock().unwrap();
        docs.retain(|d| d.id != doc.id);
        docs.push(doc.clone());
        Ok(())
    }

    async fn get_document(&self, id: &str, with_chunks: bool) -> Result<Option<Document>, DetectorError> {
        let docs = self.documents.lock().unwrap();
        Ok(docs.iter().find(|d| d.id == id).map(|d| {
            let mut d = d.clone();
            if !with_chunks {
                d.chunks = Vec::new();
            }
            d
        }))
    }

    async fn delete_document(&self, id: &str) -> Result<bool, DetectorError> {
        let mut docs = self.documents.lock().unwrap();
        let before = docs.len();
        docs.retain(|d| d.id != id);
        Ok(docs.len() != before)
    }

    async fn search_documents(
        &self,
        query: Option<&str>,
        _filters: &HashMap<String, String>,
        limit: usize,
        offset: usize,
    ) -> Result<DocumentSearchResults, DetectorError> {
        let docs = self.documents.lock().unwrap();
        let matched: Vec<Document> = docs
            .iter()
            .filter(|d| query.map(|q| d.title.contains(q) || d.content.contains(q)).unwrap_or(true))
            .cloned()
            .collect();
        let total = matched.len() as u64;
        let page = matched.into_iter().skip(offset).take(limit).collect();
        Ok(DocumentSearchResults { documents: page, total })
    }

    async fn knn_search(
        &self,
        vector: &[f32],
        top_k: usize,
        min_score: f64,
        exclude_doc_ids: &[String],
        max_results_per_source: usize,
    ) -> Result<Vec<SearchHit>, DetectorError> {
        let docs = self.documents.lock().unwrap();
        let mut scored: Vec<(f64, SearchHit)> = Vec::new();
        for doc in docs.iter() {
            if exclude_doc_ids.contains(&doc.id) {
                continue;
            }
            for chunk in &doc.chunks {
                let score = cosine(vector, &chunk.embedding);
                if score < min_score {
                    continue;
                }
                scored.push((
                    score,
                    SearchHit {
                        chunk_id: chunk.chunk_id.clone(),
                        document_id: doc.id.clone(),
                        document_title: doc.title.clone(),
                        text: chunk.text.clone(),
                        semantic_score: score,
                    },
                ));
            }
        }
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());

        let mut per_source: HashMap<String, usize> = HashMap::new();
        let mut results = Vec::new();
        for (_, hit) in scored {
            let count = per_source.entry(hit.document_id.clone()).or_insert(0);
            if *count >= max_results_per_source {
                continue;
            }
            *count += 1;
            results.push(hit);
            if results.len() >= top_k {
                break;
            }
        }
        Ok(results)
    }

    async fn document_count(&self) -> Result<u64, DetectorError> {
        Ok(self.documents.lock().unwrap().len() as u64)
    }
}

struct UnusedObjectStore;

#[async_trait]
impl ObjectStore for UnusedObjectStore {
    async fn exists(&self, _bucket: &str, _path: &str) -> Result<bool, DetectorError> {
        Ok(false)
    }
    async fn stat(&self, _bucket: &str, _path: &str) -> Result<plagiscope::clients::object_store::ObjectInfo, DetectorError> {
        Err(DetectorError::Validation("not implemented in test double".to_string()))
    }
    async fn get_bytes(&self, _bucket: &str, _path: &str) -> Result<Vec<u8>, DetectorError> {
        Err(DetectorError::Validation("not implemented in test double".to_string()))
    }
    async fn get_to_temp_file(&self, _bucket: &str, _path: &str) -> Result<std::path::PathBuf, DetectorError> {
        Err(DetectorError::Validation("not implemented in test double".to_string()))
    }
    async fn list(&self, _bucket: &str, _prefix: &str, _recursive: bool) -> Result<Vec<plagiscope::clients::object_store::ObjectInfo>, DetectorError> {
        Ok(Vec::new())
    }
}

struct Fixture {
    detector: Detector,
    indexer: Indexer,
    vector_store: Arc<InMemoryVectorStore>,
}

fn fixture() -> Fixture {
    let config = Arc::new(Config::from_env());
    let embedder: Arc<dyn Embedder> = Arc::new(TestEmbedder);
    let vector_store = Arc::new(InMemoryVectorStore::default());
    let object_store: Arc<dyn ObjectStore> = Arc::new(UnusedObjectStore);
    let explainer = Arc::new(DisabledExplainer);
    let concurrency = Arc::new(tokio::sync::Semaphore::new(config.outbound_limit.max(1)));

    let detector = Detector::new(
        config.clone(),
        embedder.clone(),
        vector_store.clone() as Arc<dyn VectorStore>,
        object_store.clone(),
        explainer,
        concurrency,
    );
    let indexer = Indexer::new(config, embedder, vector_store.clone() as Arc<dyn VectorStore>, object_store);

    Fixture {
        detector,
        indexer,
        vector_store,
    }
}

const ML_SENTENCE: &str = "Machine Learning là một nhánh của trí tuệ nhân tạo, cho phép máy tính học từ dữ liệu mà không cần được lập trình một cách rõ ràng.";

#[tokio::test]
async fn copy_paste_critical() {
    let f = fixture();
    let upload = f
        .indexer
        .upload_text("ML Intro".to_string(), ML_SENTENCE.to_string(), HashMap::new(), None, None)
        .await
        .unwrap();
    assert!(upload.success);

    let result = f.detector.check(ML_SENTENCE, &CheckOptions::default()).await.unwrap();
    assert!(result.percentage >= 95.0, "percentage={}", result.percentage);
    assert_eq!(result.severity, "CRITICAL");
    assert!(!result.matches.is_empty());
    assert_eq!(result.matches[0].document_title, "ML Intro");
    assert!(result.matches[0].similarity_score >= 0.95);
}

#[tokio::test]
async fn unrelated_text_is_safe() {
    let f = fixture();
    f.indexer
        .upload_text("ML Intro".to_string(), ML_SENTENCE.to_string(), HashMap::new(), None, None)
        .await
        .unwrap();

    let result = f
        .detector
        .check(
            "Blockchain là công nghệ sổ cái phân tán. Bitcoin là ứng dụng đầu tiên của blockchain.",
            &CheckOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(result.percentage, 0.0);
    assert_eq!(result.severity, "SAFE");
    assert!(result.matches.is_empty());
}

#[tokio::test]
async fn citation_rewards_honesty() {
    let f = fixture();
    f.indexer
        .upload_text("ML Intro".to_string(), ML_SENTENCE.to_string(), HashMap::new(), None, None)
        .await
        .unwrap();

    let baseline = f.detector.check(ML_SENTENCE, &CheckOptions::default()).await.unwrap();
    let cited = f
        .detector
        .check(
            "Theo Nguyen (2024), machine learning là nhánh của trí tuệ nhân tạo.",
            &CheckOptions::default(),
        )
        .await
        .unwrap();

    assert!(
        cited.percentage < baseline.percentage,
        "cited={} baseline={}",
        cited.percentage,
        baseline.percentage
    );
    assert_ne!(cited.severity, "CRITICAL");
}

#[tokio::test]
async fn asymmetric_containment_flags_embedded_fragment() {
    let f = fixture();
    let matched_sentence =
        "quantum entanglement links particle states instantly across arbitrary distance regardless separation";
    f.indexer
        .upload_text("Physics Note".to_string(), matched_sentence.to_string(), HashMap::new(), None, None)
        .await
        .unwrap();

    let long_input = format!(
        "{} unrelated padding about cooking recipes and gardening tips for spring planting season",
        matched_sentence
    );

    let result = f.detector.check(&long_input, &CheckOptions::default()).await.unwrap();
    assert!(!result.matches.is_empty());
    let best = result
        .matches
        .iter()
        .max_by(|a, b| a.similarity_score.partial_cmp(&b.similarity_score).unwrap())
        .unwrap();
    assert!(best.similarity_score >= 0.7, "score={}", best.similarity_score);
    assert!(matches!(result.severity.as_str(), "MEDIUM" | "HIGH" | "CRITICAL"));
}

#[tokio::test]
async fn per_source_cap_limits_matches_from_one_document() {
    let f = fixture();
    let config = Config::from_env();

    let sentence = "recurrent neural networks process sequential data with memory of prior timesteps";
    let embedding = hashed_vector(sentence);
    let chunks: Vec<Chunk> = (0..20)
        .map(|i| Chunk {
            chunk_id: format!("dup_chunk_{}", i),
            document_id: "dup_doc".to_string(),
            position: i,
            embedding: embedding.clone(),
            text: sentence.to_string(),
            word_count: sentence.split_whitespace().count(),
            section_title: None,
            element_type: None,
            metadata: HashMap::new(),
            created_at: chrono::Utc::now(),
        })
        .collect();
    let document = Document {
        id: "dup_doc".to_string(),
        title: "Duplicated".to_string(),
        content: sentence.to_string(),
        language: "en".to_string(),
        metadata: HashMap::new(),
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
        chunk_count: chunks.len(),
        chunks,
    };
    f.vector_store.index_document(&document).await.unwrap();

    let result = f.detector.check(sentence, &CheckOptions::default()).await.unwrap();
    let from_dup_doc = result.matches.iter().filter(|m| m.document_id == "dup_doc").count();
    assert!(
        from_dup_doc <= config.max_results_per_source,
        "got {} matches from one document, cap is {}",
        from_dup_doc,
        config.max_results_per_source
    );
}

#[tokio::test]
async fn deletion_removes_document_and_its_matches() {
    let f = fixture();
    let upload = f
        .indexer
        .upload_text("ML Intro".to_string(), ML_SENTENCE.to_string(), HashMap::new(), None, None)
        .await
        .unwrap();

    let deleted = f.vector_store.delete_document(&upload.id).await.unwrap();
    assert!(deleted);

    let fetched = f.vector_store.get_document(&upload.id, false).await.unwrap();
    assert!(fetched.is_none());

    let result = f.detector.check(ML_SENTENCE, &CheckOptions::default()).await.unwrap();
    assert!(result.matches.iter().all(|m| m.document_id != upload.id));
}
