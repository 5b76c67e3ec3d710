use std::sync::Arc;
use tracing::{info, warn};

use plagiscope::clients::embedder::OllamaEmbedder;
use plagiscope::clients::explainer::{DisabledExplainer, ExternalExplainer, InternalExplainer};
use plagiscope::clients::object_store::MinioObjectStore;
use plagiscope::clients::vector_store::ElasticVectorStore;
use plagiscope::clients::{Embedder, Explainer, ObjectStore, VectorStore};
use plagiscope::core::config::ExplainerMode;
use plagiscope::{AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = Arc::new(Config::from_env());
    info!(service = %config.service_name, "starting plagiarism detection service");

    let timeout_client = |secs: u64| -> anyhow::Result<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(secs))
            .build()?)
    };

    let embedder: Arc<dyn Embedder> = Arc::new(OllamaEmbedder::new(
        timeout_client(config.ollama_timeout_secs)?,
        config.ollama_host.clone(),
        config.ollama_embed_model.clone(),
        config.embedding_batch_size,
    ));

    let vector_store: Arc<dyn VectorStore> = Arc::new(ElasticVectorStore::new(
        timeout_client(config.es_timeout_secs)?,
        config.es_url(),
        config.es_index.clone(),
        config.es_user.clone(),
        config.es_password.clone(),
        config.embedding_dims,
    ));
    vector_store.create_index(false).await.unwrap_or_else(|e| {
        warn!("index bootstrap skipped: {}", e);
    });

    let object_store: Arc<dyn ObjectStore> = Arc::new(MinioObjectStore::new(
        timeout_client(config.minio_timeout_secs)?,
        config.minio_url(),
        config.minio_access_key.clone(),
        config.minio_secret_key.clone(),
    ));

    let explainer: Arc<dyn Explainer> = match config.explainer_mode {
        ExplainerMode::Internal => Arc::new(InternalExplainer::new(
            timeout_client(config.explainer_timeout_secs)?,
            config.explainer_host.clone(),
            config.explainer_model.clone(),
        )),
        ExplainerMode::External => Arc::new(ExternalExplainer::new(
            timeout_client(config.explainer_timeout_secs)?,
            config.explainer_host.clone(),
            config.explainer_api_key.clone(),
            config.explainer_model.clone(),
        )),
        ExplainerMode::Disabled => Arc::new(DisabledExplainer),
    };

    let state = Arc::new(AppState::new(
        config.clone(),
        embedder,
        vector_store,
        object_store,
        explainer,
    ));

    let app = plagiscope::service::router(state.clone());
    let metrics_app = plagiscope::service::metrics_router(state);

    let bind_addr = format!("{}:{}", config.bind_host, config.bind_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("listening on http://{}", bind_addr);

    let metrics_addr = format!("{}:{}", config.bind_host, config.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr).await?;
    info!("metrics listening on http://{}", metrics_addr);

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    let metrics_server = axum::serve(metrics_listener, metrics_app).with_graceful_shutdown(shutdown_signal());

    tokio::try_join!(server, metrics_server)?;

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).ok();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                if let Some(ref mut s) = sigterm {
                    s.recv().await;
                } else {
                    futures::future::pending::<()>().await;
                }
            } => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
