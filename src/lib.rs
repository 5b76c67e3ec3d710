pub mod chunker;
pub mod clients;
pub mod core;
pub mod detector;
pub mod indexer;
pub mod lexical;
pub mod pdf;
pub mod service;

pub use core::types;
pub use core::types::*;
pub use core::{AppState, Config, DetectorError};
pub use detector::Detector;
pub use indexer::Indexer;
