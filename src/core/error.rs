use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

/// Three recoverable error kinds plus the fatal (startup-only) path, which is
/// represented as a plain `anyhow::Error` returned from `main` before the
/// server ever binds.
#[derive(thiserror::Error, Debug)]
pub enum DetectorError {
    /// Empty/short input, missing bucket/object, bad options. Never a transport
    /// error — callers turn this into a structured SAFE result where possible.
    #[error("validation: {0}")]
    Validation(String),

    /// Timeout or 5xx from the embedder, vector store, object store, or
    /// explainer. Surfaced as an RPC internal error, except when raised while
    /// calling the Explainer, whose failure is recovered locally instead.
    #[error("dependency error: {0}")]
    Dependency(String),

    /// Vector-dim mismatch, malformed PDF, or any other structurally broken
    /// input/document. Returned as a structured failure, never a panic.
    #[error("data error: {0}")]
    DataCorruption(String),
}

impl From<reqwest::Error> for DetectorError {
    fn from(err: reqwest::Error) -> Self {
        DetectorError::Dependency(err.to_string())
    }
}

impl From<serde_json::Error> for DetectorError {
    fn from(err: serde_json::Error) -> Self {
        DetectorError::DataCorruption(err.to_string())
    }
}

impl From<std::io::Error> for DetectorError {
    fn from(err: std::io::Error) -> Self {
        DetectorError::Dependency(err.to_string())
    }
}

impl IntoResponse for DetectorError {
    fn into_response(self) -> Response {
        let status = match self {
            DetectorError::Validation(_) | DetectorError::DataCorruption(_) => StatusCode::OK,
            DetectorError::Dependency(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "success": false, "error": self.to_string() }));
        (status, body).into_response()
    }
}
