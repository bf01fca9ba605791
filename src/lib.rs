pub mod cache;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod invalidator;
pub mod jobs;
pub mod keyword;
pub mod kv;
pub mod observability;
pub mod orchestrator;
pub mod remote;
pub mod resilience;
pub mod similarity;
pub mod sync;
pub mod tool_server;
pub mod types;
pub mod vector;

pub use config::{EngineConfig, Mode, TuningConfig};
pub use enrichment::{Embedder, EnrichmentWorker, Extraction, Extractor, HashEmbedder, HeuristicExtractor};
pub use error::{MemoryError, MemoryResult};
pub use orchestrator::Engine;
pub use sync::SyncWorker;
pub use types::*;
