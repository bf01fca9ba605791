//! Invalidator (C7): pub/sub fan-out over three channels. Publishing is
//! fire-and-forget — a mutation never blocks on a subscriber being present.

use crate::error::MemoryResult;
use crate::kv::Kv;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

pub const CHANNEL_CACHE_INVALIDATE: &str = "cache:invalidate";
pub const CHANNEL_JOB_COMPLETE: &str = "job:complete";
pub const CHANNEL_MEMORY_PROCESS: &str = "memory:process";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidateOp {
    Update,
    Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheInvalidateMessage {
    pub memory_id: String,
    pub op: InvalidateOp,
    pub ts: chrono::DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCompleteMessage {
    pub job_id: String,
    pub ok: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryProcessMessage {
    pub memory_id: String,
    pub user_id: String,
    pub priority: crate::types::Priority,
}

/// Thin publish wrapper over KV pub/sub. Consumers (the job queue and the
/// enrichment worker) subscribe directly via `Kv::subscribe`.
pub struct Invalidator {
    kv: Arc<dyn Kv>,
}

impl Invalidator {
    pub fn new(kv: Arc<dyn Kv>) -> Self {
        Self { kv }
    }

    pub async fn publish_invalidate(&self, memory_id: &str, op: InvalidateOp) -> MemoryResult<()> {
        let message = CacheInvalidateMessage {
            memory_id: memory_id.to_string(),
            op,
            ts: Utc::now(),
        };
        let payload = serde_json::to_string(&message)?;
        self.kv.publish(CHANNEL_CACHE_INVALIDATE, payload).await
    }

    pub async fn publish_job_complete(&self, job_id: &str, result: Result<(), String>) -> MemoryResult<()> {
        let message = JobCompleteMessage {
            job_id: job_id.to_string(),
            ok: result.is_ok(),
            error: result.err(),
        };
        let payload = serde_json::to_string(&message)?;
        self.kv.publish(CHANNEL_JOB_COMPLETE, payload).await
    }

    pub async fn publish_process(
        &self,
        memory_id: &str,
        user_id: &str,
        priority: crate::types::Priority,
    ) -> MemoryResult<()> {
        let message = MemoryProcessMessage {
            memory_id: memory_id.to_string(),
            user_id: user_id.to_string(),
            priority,
        };
        let payload = serde_json::to_string(&message)?;
        self.kv.publish(CHANNEL_MEMORY_PROCESS, payload).await
    }
}

/// Consumer side of `cache:invalidate` (§4.7): deletes the mutated memory's
/// `memory:{user_id}:{id}` entry and purges every `search:*` result-cache key,
/// since any add/update/delete can change what a cached search would return.
/// Idempotent — replaying a message re-deletes keys that are already gone.
pub struct InvalidationWorker {
    kv: Arc<dyn Kv>,
}

impl InvalidationWorker {
    pub fn new(kv: Arc<dyn Kv>) -> Self {
        Self { kv }
    }

    /// Subscribes to `cache:invalidate` and processes messages until the
    /// channel closes. Intended to run as a long-lived background task.
    pub async fn run(self: Arc<Self>) -> MemoryResult<()> {
        let mut rx = self.kv.subscribe(CHANNEL_CACHE_INVALIDATE).await?;
        while let Some(raw) = rx.recv().await {
            let message: CacheInvalidateMessage = match serde_json::from_str(&raw) {
                Ok(m) => m,
                Err(e) => {
                    warn!("dropping malformed cache:invalidate payload: {e}");
                    continue;
                }
            };
            if let Err(e) = self.handle(&message).await {
                warn!("cache invalidation failed for {}: {e}", message.memory_id);
            }
        }
        Ok(())
    }

    async fn handle(&self, message: &CacheInvalidateMessage) -> MemoryResult<()> {
        let memory_keys = self.kv.scan(&format!("memory:*:{}", message.memory_id)).await?;
        if !memory_keys.is_empty() {
            self.kv.del(&memory_keys).await?;
        }

        let search_keys = self.kv.scan("search:*").await?;
        if !search_keys.is_empty() {
            self.kv.del(&search_keys).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;
    use crate::types::Priority;

    #[tokio::test]
    async fn publish_invalidate_is_received_by_subscriber() {
        let kv: Arc<dyn Kv> = Arc::new(MemoryKv::new());
        let invalidator = Invalidator::new(kv.clone());
        let mut rx = kv.subscribe(CHANNEL_CACHE_INVALIDATE).await.unwrap();

        invalidator.publish_invalidate("mem1", InvalidateOp::Delete).await.unwrap();

        let raw = rx.recv().await.unwrap();
        let parsed: CacheInvalidateMessage = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.memory_id, "mem1");
        assert_eq!(parsed.op, InvalidateOp::Delete);
    }

    #[tokio::test]
    async fn publish_process_carries_priority() {
        let kv: Arc<dyn Kv> = Arc::new(MemoryKv::new());
        let invalidator = Invalidator::new(kv.clone());
        let mut rx = kv.subscribe(CHANNEL_MEMORY_PROCESS).await.unwrap();

        invalidator.publish_process("mem1", "u1", Priority::High).await.unwrap();

        let raw = rx.recv().await.unwrap();
        let parsed: MemoryProcessMessage = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.user_id, "u1");
        assert_eq!(parsed.priority, Priority::High);
    }

    #[tokio::test]
    async fn publish_without_subscribers_does_not_error() {
        let kv: Arc<dyn Kv> = Arc::new(MemoryKv::new());
        let invalidator = Invalidator::new(kv);
        assert!(invalidator.publish_invalidate("mem1", InvalidateOp::Update).await.is_ok());
    }

    #[tokio::test]
    async fn invalidation_worker_purges_memory_and_search_keys() {
        use std::time::Duration;

        let kv: Arc<dyn Kv> = Arc::new(MemoryKv::new());
        kv.set_ex("memory:u1:mem1", "{}".to_string(), Duration::from_secs(60)).await.unwrap();
        kv.set_ex("search:abc:10", "[]".to_string(), Duration::from_secs(60)).await.unwrap();

        let worker = Arc::new(InvalidationWorker::new(kv.clone()));
        tokio::spawn(worker.run());
        // Give the worker a moment to install its subscription before publishing.
        tokio::time::sleep(Duration::from_millis(20)).await;

        let invalidator = Invalidator::new(kv.clone());
        invalidator.publish_invalidate("mem1", InvalidateOp::Update).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(kv.get("memory:u1:mem1").await.unwrap().is_none());
        assert!(kv.get("search:abc:10").await.unwrap().is_none());
    }
}
