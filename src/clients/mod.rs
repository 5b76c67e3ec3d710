pub mod embedder;
pub mod explainer;
pub mod object_store;
pub mod vector_store;

pub use embedder::Embedder;
pub use explainer::Explainer;
pub use object_store::ObjectStore;
pub use vector_store::VectorStore;
