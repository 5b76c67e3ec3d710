use axum::extract::{Path, Query, State};
use axum::response::Json;
use axum::Router;
use axum::routing::{delete, get, post};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::core::app_state::AppState;
use crate::core::error::DetectorError;
use crate::core::types::*;

/// Per-RPC structured log line: method, request id, duration, success flag,
/// and (on failure) the error string. Emitted once per handler invocation,
/// independent of the generic HTTP access log from `TraceLayer`.
fn log_rpc(method: &str, request_id: &str, start: Instant, error: Option<&str>) {
    let duration_ms = start.elapsed().as_millis() as u64;
    match error {
        Some(e) => info!(method, request_id, duration_ms, success = false, error = e, "rpc completed"),
        None => info!(method, request_id, duration_ms, success = true, "rpc completed"),
    }
}

/// Primary RPC surface — does not include `/metrics`, which is served on its
/// own port per spec (see `metrics_router`).
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/check-text", post(check_text))
        .route("/check-pdf", post(check_pdf))
        .route("/documents", post(upload_text).get(search_documents))
        .route("/documents/batch", post(upload_batch))
        .route("/documents/from-object", post(index_pdf))
        .route("/documents/:id", get(get_document).delete(delete_document))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Metrics surface, bound to its own port so scraping never competes with
/// request traffic on the main listener.
pub fn metrics_router(state: Arc<AppState>) -> Router {
    Router::new().route("/metrics", get(metrics)).with_state(state)
}

async fn check_text(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CheckTextRequest>,
) -> Result<Json<CheckResult>, DetectorError> {
    let start = Instant::now();
    match state.detector.check(&request.text, &request.options).await {
        Ok(result) => {
            log_rpc("check_text", &result.request_id, start, None);
            Ok(Json(result))
        }
        Err(e) => {
            log_rpc("check_text", "unknown", start, Some(&e.to_string()));
            Err(e)
        }
    }
}

async fn check_pdf(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CheckPdfRequest>,
) -> Result<Json<CheckResult>, DetectorError> {
    let start = Instant::now();
    match state
        .detector
        .check_pdf_from_object_store(&request.bucket, &request.path, &request.options)
        .await
    {
        Ok(result) => {
            log_rpc("check_pdf", &result.request_id, start, None);
            Ok(Json(result))
        }
        Err(e) => {
            log_rpc("check_pdf", "unknown", start, Some(&e.to_string()));
            Err(e)
        }
    }
}

async fn upload_text(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UploadTextRequest>,
) -> Result<Json<UploadTextResponse>, DetectorError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::new_v4().to_string();
    match state
        .indexer
        .upload_text(request.title, request.content, request.metadata, request.language, request.id)
        .await
    {
        Ok(response) => {
            log_rpc("upload_text", &request_id, start, None);
            Ok(Json(response))
        }
        Err(e) => {
            log_rpc("upload_text", &request_id, start, Some(&e.to_string()));
            Err(e)
        }
    }
}

async fn upload_batch(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BatchUploadRequest>,
) -> Result<Json<BatchUploadResponse>, DetectorError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::new_v4().to_string();
    let mut results = Vec::with_capacity(request.items.len());
    let mut successful = 0;
    for item in request.items {
        match state
            .indexer
            .upload_text(item.title, item.content, item.metadata, item.language, item.id)
            .await
        {
            Ok(resp) => {
                if resp.success {
                    successful += 1;
                }
                results.push(resp);
            }
            Err(e) => {
                error!(request_id = %request_id, "batch upload item failed: {}", e);
                results.push(UploadTextResponse {
                    id: String::new(),
                    title: String::new(),
                    chunks_created: 0,
                    success: false,
                    message: e.to_string(),
                });
            }
        }
    }
    let total = results.len();
    let failed = total - successful;
    log_rpc(
        "upload_batch",
        &request_id,
        start,
        if failed > 0 { Some("one or more items failed") } else { None },
    );
    Ok(Json(BatchUploadResponse {
        total,
        successful,
        failed,
        results,
    }))
}

async fn index_pdf(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IndexPdfRequest>,
) -> Result<Json<IndexPdfResponse>, DetectorError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::new_v4().to_string();
    match state
        .indexer
        .upload_pdf_from_object_store(
            request.bucket,
            request.path,
            request.id,
            request.title,
            request.metadata,
            request.language,
        )
        .await
    {
        Ok((id, title, total_chunks, chunks, processing_metadata)) => {
            log_rpc("index_pdf", &request_id, start, None);
            Ok(Json(IndexPdfResponse {
                id,
                title,
                total_chunks,
                chunks,
                processing_metadata,
            }))
        }
        Err(e) => {
            log_rpc("index_pdf", &request_id, start, Some(&e.to_string()));
            Err(e)
        }
    }
}

async fn get_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<GetDocumentQuery>,
) -> Result<Json<Document>, DetectorError> {
    let start = Instant::now();
    let result = state
        .vector_store
        .get_document(&id, query.include_chunks)
        .await?
        .ok_or_else(|| DetectorError::Validation(format!("document not found: {}", id)));
    match result {
        Ok(doc) => {
            log_rpc("get_document", &id, start, None);
            Ok(Json(doc))
        }
        Err(e) => {
            log_rpc("get_document", &id, start, Some(&e.to_string()));
            Err(e)
        }
    }
}

async fn delete_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteDocumentResponse>, DetectorError> {
    let start = Instant::now();
    match state.vector_store.delete_document(&id).await {
        Ok(deleted) => {
            log_rpc("delete_document", &id, start, None);
            Ok(Json(DeleteDocumentResponse {
                success: deleted,
                message: if deleted {
                    "deleted".to_string()
                } else {
                    "document not found".to_string()
                },
            }))
        }
        Err(e) => {
            log_rpc("delete_document", &id, start, Some(&e.to_string()));
            Err(e)
        }
    }
}

async fn search_documents(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchDocumentsQuery>,
) -> Result<Json<SearchDocumentsResponse>, DetectorError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::new_v4().to_string();
    match state
        .vector_store
        .search_documents(query.query.as_deref(), &query.filters, query.limit, query.offset)
        .await
    {
        Ok(results) => {
            log_rpc("search_documents", &request_id, start, None);
            Ok(Json(SearchDocumentsResponse {
                documents: results.documents,
                total: results.total,
            }))
        }
        Err(e) => {
            log_rpc("search_documents", &request_id, start, Some(&e.to_string()));
            Err(e)
        }
    }
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let mut dependencies = std::collections::HashMap::new();

    let vector_store_health = match state.vector_store.document_count().await {
        Ok(_) => DependencyHealth {
            healthy: true,
            message: "ok".to_string(),
        },
        Err(e) => DependencyHealth {
            healthy: false,
            message: e.to_string(),
        },
    };
    dependencies.insert("vector_store".to_string(), vector_store_health);

    let status = if dependencies.values().all(|d| d.healthy) {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        service: state.config.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        dependencies,
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> String {
    let document_count = state.vector_store.document_count().await.unwrap_or(0);
    format!(
        "# HELP plagiscope_documents_indexed Total indexed documents\n\
         # TYPE plagiscope_documents_indexed gauge\n\
         plagiscope_documents_indexed {}\n",
        document_count
    )
}
