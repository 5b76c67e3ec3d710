use crate::clients::{Embedder, Explainer, ObjectStore, VectorStore};
use crate::core::config::Config;
use crate::detector::Detector;
use crate::indexer::Indexer;
use std::sync::Arc;

/// Process-wide singletons, wired once in `main` and cloned by `Arc` into
/// every axum handler. No lazily-initialized global state anywhere else.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub detector: Arc<Detector>,
    pub indexer: Arc<Indexer>,
    pub vector_store: Arc<dyn VectorStore>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("service_name", &self.config.service_name)
            .finish()
    }
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
        object_store: Arc<dyn ObjectStore>,
        explainer: Arc<dyn Explainer>,
    ) -> Self {
        let outbound_limit = Arc::new(tokio::sync::Semaphore::new(config.outbound_limit.max(1)));

        let detector = Arc::new(Detector::new(
            config.clone(),
            embedder.clone(),
            vector_store.clone(),
            object_store.clone(),
            explainer,
            outbound_limit,
        ));
        let indexer = Arc::new(Indexer::new(
            config.clone(),
            embedder,
            vector_store.clone(),
            object_store,
        ));

        Self {
            config,
            detector,
            indexer,
            vector_store,
        }
    }
}
