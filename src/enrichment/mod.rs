//! Enrichment (C9, C12): the async pipeline that turns a freshly added memory
//! into a cached, indexed, searchable one. Triggered by `memory:process`.

mod hash_embedder;
mod heuristic_extractor;

pub use hash_embedder::HashEmbedder;
pub use heuristic_extractor::HeuristicExtractor;

use crate::cache::CacheTier;
use crate::error::MemoryResult;
use crate::invalidator::{InvalidateOp, Invalidator, MemoryProcessMessage, CHANNEL_MEMORY_PROCESS};
use crate::jobs::JobQueue;
use crate::keyword::KeywordIndex;
use crate::kv::Kv;
use crate::remote::RemoteStore;
use crate::resilience::{retry_with_config, RetryConfig};
use crate::vector::VectorIndex;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Produces an embedding vector for a piece of text.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> MemoryResult<Vec<f32>>;
    async fn embed_batch(&self, texts: &[String]) -> MemoryResult<Vec<Vec<f32>>>;
}

/// Entities, relationships, and keywords pulled out of memory content.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub entities: Vec<String>,
    pub relationships: Vec<(String, String)>,
    pub keywords: Vec<String>,
}

/// Produces an `Extraction` for a piece of text.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, content: &str) -> MemoryResult<Extraction>;
}

/// Runs the enrichment pipeline against every `memory:process` message:
/// fetch from the remote store (with backoff), decide a cache tier, extract,
/// embed, cache, index, and publish `cache:invalidate`/`job:complete`.
pub struct EnrichmentWorker {
    remote: Arc<dyn RemoteStore>,
    cache: Arc<CacheTier>,
    keyword_index: Arc<KeywordIndex>,
    vector_index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    extractor: Arc<dyn Extractor>,
    invalidator: Invalidator,
    job_queue: Arc<JobQueue>,
    fetch_retry: RetryConfig,
}

impl EnrichmentWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kv: Arc<dyn Kv>,
        remote: Arc<dyn RemoteStore>,
        cache: Arc<CacheTier>,
        keyword_index: Arc<KeywordIndex>,
        vector_index: Arc<VectorIndex>,
        embedder: Arc<dyn Embedder>,
        extractor: Arc<dyn Extractor>,
        job_queue: Arc<JobQueue>,
    ) -> Self {
        Self {
            remote,
            cache,
            keyword_index,
            vector_index,
            embedder,
            extractor,
            invalidator: Invalidator::new(kv),
            job_queue,
            fetch_retry: crate::resilience::enrichment_fetch_config(),
        }
    }

    /// Subscribes to `memory:process` and processes messages until the
    /// channel closes. Intended to run as a long-lived background task.
    pub async fn run(self: Arc<Self>, kv: Arc<dyn Kv>) -> MemoryResult<()> {
        let mut rx = kv.subscribe(CHANNEL_MEMORY_PROCESS).await?;
        while let Some(raw) = rx.recv().await {
            let message: MemoryProcessMessage = match serde_json::from_str(&raw) {
                Ok(m) => m,
                Err(e) => {
                    warn!("dropping malformed memory:process payload: {e}");
                    continue;
                }
            };
            let worker = self.clone();
            tokio::spawn(async move {
                let job_id = message.memory_id.clone();
                let result = worker.process_one(&message).await;
                if let Err(e) = &result {
                    error!("enrichment failed for {}: {e}", message.memory_id);
                }
                let _ = worker
                    .job_queue
                    .complete(&job_id, result.map_err(|e| e.to_string()))
                    .await;
            });
        }
        Ok(())
    }

    async fn process_one(&self, message: &MemoryProcessMessage) -> MemoryResult<()> {
        let user_id = message.user_id.clone();
        let memory_id = message.memory_id.clone();

        let remote = self.remote.clone();
        let fetch_user = user_id.clone();
        let fetch_id = memory_id.clone();
        let fetch_result = retry_with_config(
            move || {
                let remote = remote.clone();
                let user_id = fetch_user.clone();
                let id = fetch_id.clone();
                async move { remote.get(&user_id, &id).await }
            },
            self.fetch_retry.clone(),
        )
        .await;

        let mut memory = match fetch_result {
            Ok(memory) => memory,
            Err(crate::error::MemoryError::NotFound(_)) => {
                warn!("enrichment found no remote record for {memory_id}, skipping");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let extraction = self.extractor.extract(&memory.content).await?;
        memory.metadata.entities = extraction.entities;
        memory.metadata.relationships = extraction.relationships;
        memory.metadata.keywords = extraction.keywords;

        let embedding = self.embedder.embed(&memory.content).await?;
        self.vector_index.add(&memory.id, &memory.user_id, embedding).await;

        let tier = self.cache.tier_for(&memory).await?;
        self.cache.put(&memory, tier).await?;
        self.keyword_index.index(&memory.id, &memory.content).await?;

        info!("enriched memory {memory_id} into {tier:?} tier");
        self.invalidator.publish_invalidate(&memory_id, InvalidateOp::Update).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TuningConfig;
    use crate::kv::MemoryKv;
    use crate::remote::MemoryRemoteStore;
    use crate::types::Memory;
    use std::time::Duration;

    async fn worker() -> (Arc<EnrichmentWorker>, Arc<dyn Kv>, Arc<dyn RemoteStore>, Arc<CacheTier>) {
        let kv: Arc<dyn Kv> = Arc::new(MemoryKv::new());
        let remote: Arc<dyn RemoteStore> = Arc::new(MemoryRemoteStore::new());
        let cache = Arc::new(CacheTier::new(kv.clone(), &TuningConfig::default()));
        let keyword_index = Arc::new(KeywordIndex::new(kv.clone(), Duration::from_secs(60)));
        let vector_index = Arc::new(VectorIndex::new());
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new());
        let extractor: Arc<dyn Extractor> = Arc::new(HeuristicExtractor::new());
        let job_queue = Arc::new(JobQueue::spawn(kv.clone(), Duration::from_secs(5)).await.unwrap());

        let worker = Arc::new(EnrichmentWorker::new(
            kv.clone(),
            remote.clone(),
            cache.clone(),
            keyword_index,
            vector_index,
            embedder,
            extractor,
            job_queue,
        ));
        (worker, kv, remote, cache)
    }

    #[tokio::test]
    async fn process_one_caches_and_indexes_memory() {
        let (worker, _kv, remote, cache) = worker().await;
        let memory = Memory::new("m1", "u1", "Marie Curie discovered radium");
        remote.add(memory.clone()).await.unwrap();

        let message = MemoryProcessMessage {
            memory_id: "m1".to_string(),
            user_id: "u1".to_string(),
            priority: crate::types::Priority::Normal,
        };
        worker.process_one(&message).await.unwrap();

        let cached = cache.peek("u1", "m1").await.unwrap().unwrap();
        assert!(cached.metadata.entities.contains(&"Marie Curie".to_string()));
    }

    #[tokio::test]
    async fn process_one_is_noop_when_remote_record_missing() {
        let (worker, _kv, _remote, _cache) = worker().await;
        let message = MemoryProcessMessage {
            memory_id: "missing".to_string(),
            user_id: "u1".to_string(),
            priority: crate::types::Priority::Normal,
        };
        assert!(worker.process_one(&message).await.is_ok());
    }
}
