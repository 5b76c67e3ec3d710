use crate::core::error::DetectorError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

/// A batched text-to-vector client. Output ordering always matches input
/// ordering, and every returned vector is already suitable for cosine search.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, DetectorError>;

    /// Batched embedding. If the batch call fails, retries one element at a
    /// time to isolate poison inputs rather than failing the whole request.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DetectorError>;
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    #[serde(default)]
    embeddings: Option<Vec<Vec<f32>>>,
    #[serde(default)]
    embedding: Option<Vec<f32>>,
}

pub struct OllamaEmbedder {
    http: reqwest::Client,
    base_url: String,
    model: String,
    batch_size: usize,
}

impl OllamaEmbedder {
    pub fn new(http: reqwest::Client, base_url: String, model: String, batch_size: usize) -> Self {
        Self {
            http,
            base_url,
            model,
            batch_size,
        }
    }

    fn parse_one(resp: OllamaEmbedResponse) -> Result<Vec<f32>, DetectorError> {
        if let Some(mut embeddings) = resp.embeddings {
            if embeddings.is_empty() {
                return Err(DetectorError::Dependency(
                    "embedder returned an empty embeddings array".to_string(),
                ));
            }
            Ok(embeddings.remove(0))
        } else if let Some(embedding) = resp.embedding {
            Ok(embedding)
        } else {
            Err(DetectorError::Dependency(
                "unexpected embedder response shape".to_string(),
            ))
        }
    }

    fn parse_batch(resp: OllamaEmbedResponse, expected: usize) -> Result<Vec<Vec<f32>>, DetectorError> {
        if let Some(embeddings) = resp.embeddings {
            Ok(embeddings)
        } else if let Some(embedding) = resp.embedding {
            if expected == 1 {
                Ok(vec![embedding])
            } else {
                Err(DetectorError::Dependency(
                    "embedder returned a single vector for a multi-text batch".to_string(),
                ))
            }
        } else {
            Err(DetectorError::Dependency(
                "unexpected embedder response shape".to_string(),
            ))
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, DetectorError> {
        let resp: OllamaEmbedResponse = self
            .http
            .post(format!("{}/api/embed", self.base_url))
            .json(&json!({ "model": self.model, "input": text }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Self::parse_one(resp)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DetectorError> {
        let mut all = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size.max(1)) {
            let batch_result: Result<OllamaEmbedResponse, DetectorError> = async {
                let resp = self
                    .http
                    .post(format!("{}/api/embed", self.base_url))
                    .json(&json!({ "model": self.model, "input": batch }))
                    .send()
                    .await?
                    .error_for_status()?;
                Ok(resp.json().await?)
            }
            .await;

            match batch_result.and_then(|r| Self::parse_batch(r, batch.len())) {
                Ok(vectors) if vectors.len() == batch.len() => all.extend(vectors),
                _ => {
                    warn!(
                        "batch embedding failed or size-mismatched; retrying one element at a time"
                    );
                    for text in batch {
                        all.push(self.embed_one(text).await?);
                    }
                }
            }
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_new_and_old_response_shapes() {
        let new_shape = OllamaEmbedResponse {
            embeddings: Some(vec![vec![0.1, 0.2]]),
            embedding: None,
        };
        assert_eq!(OllamaEmbedder::parse_one(new_shape).unwrap(), vec![0.1, 0.2]);

        let old_shape = OllamaEmbedResponse {
            embeddings: None,
            embedding: Some(vec![0.3, 0.4]),
        };
        assert_eq!(OllamaEmbedder::parse_one(old_shape).unwrap(), vec![0.3, 0.4]);
    }
}
