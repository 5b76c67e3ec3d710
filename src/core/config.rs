use std::env;

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

/// The severity cutoffs of §4.10: exactly four thresholds partitioning [0,1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeverityThresholds {
    pub critical: f64,
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl SeverityThresholds {
    pub fn classify(&self, score: f64) -> &'static str {
        if score >= self.critical {
            "CRITICAL"
        } else if score >= self.high {
            "HIGH"
        } else if score >= self.medium {
            "MEDIUM"
        } else if score >= self.low {
            "LOW"
        } else {
            "SAFE"
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplainerMode {
    Internal,
    External,
    Disabled,
}

/// Process-wide configuration snapshot, loaded once from the environment at
/// startup and handed to every component as an explicit `Arc<Config>` — no
/// lazily-initialized global lookup anywhere downstream.
#[derive(Debug, Clone)]
pub struct Config {
    // Vector store (Elasticsearch-compatible)
    pub es_scheme: String,
    pub es_host: String,
    pub es_port: u16,
    pub es_index: String,
    pub es_user: String,
    pub es_password: String,
    pub es_timeout_secs: u64,

    // Embedder (Ollama-compatible)
    pub ollama_host: String,
    pub ollama_embed_model: String,
    pub ollama_timeout_secs: u64,

    // Explainer
    pub explainer_mode: ExplainerMode,
    pub explainer_host: String,
    pub explainer_api_key: String,
    pub explainer_model: String,
    pub explainer_timeout_secs: u64,

    // Object store (MinIO/S3-compatible)
    pub minio_endpoint: String,
    pub minio_port: u16,
    pub minio_access_key: String,
    pub minio_secret_key: String,
    pub minio_use_ssl: bool,
    pub minio_bucket_name: String,
    pub minio_timeout_secs: u64,

    // Service
    pub bind_host: String,
    pub bind_port: u16,
    pub metrics_port: u16,
    pub service_name: String,
    pub outbound_limit: usize,

    // Thresholds
    pub thresholds: SeverityThresholds,

    // Chunking
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub min_chunk_size: usize,

    // Search
    pub top_k_results: usize,
    pub min_score_threshold: f64,
    pub max_results_per_source: usize,

    // Embedding
    pub embedding_dims: usize,
    pub embedding_batch_size: usize,

    // Lexical/semantic blend weights — exposed per the spec's open question
    // rather than a single hardcoded default.
    pub semantic_weight: f64,
    pub lexical_weight: f64,
    pub citation_penalty: f64,
}

impl Config {
    /// Load every field from its environment variable, falling back to the
    /// defaults enumerated in the external-interfaces contract.
    pub fn from_env() -> Self {
        let explainer_mode = match env_string("EXPLAINER_MODE", "disabled")
            .to_lowercase()
            .as_str()
        {
            "internal" => ExplainerMode::Internal,
            "external" => ExplainerMode::External,
            _ => ExplainerMode::Disabled,
        };

        Self {
            es_scheme: env_string("ES_SCHEME", "http"),
            es_host: env_string("ES_HOST", "localhost"),
            es_port: env_parsed("ES_PORT", 9200),
            es_index: env_string("ES_INDEX", "plagiarism_documents"),
            es_user: env_string("ES_USER", "elastic"),
            es_password: env_string("ES_PASSWORD", "changeme"),
            es_timeout_secs: env_parsed("ES_TIMEOUT", 30),

            ollama_host: env_string("OLLAMA_HOST", "http://localhost:11434"),
            ollama_embed_model: env_string("OLLAMA_EMBED_MODEL", "nomic-embed-text"),
            ollama_timeout_secs: env_parsed("OLLAMA_TIMEOUT", 60),

            explainer_mode,
            explainer_host: env_string("EXPLAINER_HOST", "http://localhost:11434"),
            explainer_api_key: env_string("EXPLAINER_API_KEY", ""),
            explainer_model: env_string("EXPLAINER_MODEL", "llama3.2"),
            explainer_timeout_secs: env_parsed("EXPLAINER_TIMEOUT", 60),

            minio_endpoint: env_string("MINIO_ENDPOINT", "127.0.0.1"),
            minio_port: env_parsed("MINIO_PORT", 10005),
            minio_access_key: env_string("MINIO_ACCESS_KEY", ""),
            minio_secret_key: env_string("MINIO_SECRET_KEY", ""),
            minio_use_ssl: env_bool("MINIO_USE_SSL", false),
            minio_bucket_name: env_string("MINIO_BUCKET_NAME", "lvtn"),
            minio_timeout_secs: env_parsed("MINIO_TIMEOUT", 15),

            bind_host: env_string("BIND_HOST", "0.0.0.0"),
            bind_port: env_parsed("BIND_PORT", 50051),
            metrics_port: env_parsed("METRICS_PORT", 9107),
            service_name: env_string("SERVICE_NAME", "plagiarism"),
            outbound_limit: env_parsed("OUTBOUND_LIMIT", 32),

            thresholds: SeverityThresholds {
                critical: env_parsed("SIMILARITY_CRITICAL", 0.95),
                high: env_parsed("SIMILARITY_HIGH", 0.85),
                medium: env_parsed("SIMILARITY_MEDIUM", 0.70),
                low: env_parsed("SIMILARITY_LOW", 0.50),
            },

            chunk_size: env_parsed("CHUNK_SIZE", 250),
            chunk_overlap: env_parsed("CHUNK_OVERLAP", 50),
            min_chunk_size: env_parsed("MIN_CHUNK_SIZE", 50),

            top_k_results: env_parsed("TOP_K_RESULTS", 10),
            min_score_threshold: env_parsed("MIN_SCORE_THRESHOLD", 0.50),
            max_results_per_source: env_parsed("MAX_RESULTS_PER_SOURCE", 3),

            embedding_dims: env_parsed("EMBEDDING_DIMS", 768),
            embedding_batch_size: env_parsed("EMBEDDING_BATCH_SIZE", 32),

            semantic_weight: env_parsed("SEMANTIC_WEIGHT", 0.5),
            lexical_weight: env_parsed("LEXICAL_WEIGHT", 0.5),
            citation_penalty: env_parsed("CITATION_PENALTY", 0.15),
        }
    }

    pub fn es_url(&self) -> String {
        format!("{}://{}:{}", self.es_scheme, self.es_host, self.es_port)
    }

    pub fn minio_url(&self) -> String {
        let scheme = if self.minio_use_ssl { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.minio_endpoint, self.minio_port)
    }

    pub fn chunks_index(&self) -> String {
        format!("{}_chunks", self.es_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_partitions_exactly_at_thresholds() {
        let t = SeverityThresholds {
            critical: 0.95,
            high: 0.85,
            medium: 0.70,
            low: 0.50,
        };
        assert_eq!(t.classify(0.95), "CRITICAL");
        assert_eq!(t.classify(0.94999), "HIGH");
        assert_eq!(t.classify(0.85), "HIGH");
        assert_eq!(t.classify(0.70), "MEDIUM");
        assert_eq!(t.classify(0.50), "LOW");
        assert_eq!(t.classify(0.49), "SAFE");
    }
}
