//! Background sync (C10): periodic refresh of hot memories, garbage
//! collection of expired search-result cache entries, and pub/sub-loss
//! recovery for memories stuck waiting on enrichment.

use crate::cache::{CacheTier, Tier};
use crate::config::TuningConfig;
use crate::error::MemoryResult;
use crate::invalidator::{Invalidator, JobCompleteMessage, CHANNEL_JOB_COMPLETE};
use crate::kv::Kv;
use crate::remote::RemoteStore;
use crate::types::{Priority, SyncStatus};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// How long a memory may sit unenriched before sync re-publishes `memory:process`
/// for it, per §4.10 item 2.
const PENDING_RECOVERY_AGE: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct PendingMemory {
    user_id: String,
    priority: Priority,
    inserted_at: DateTime<Utc>,
}

/// Runs on `tuning.sync_interval`, refreshing each user's top accessed
/// memories from the remote store, sweeping expired `search:*` keys, and
/// re-enqueuing enrichment for memories whose `memory:process` event was
/// lost (the only recovery path when a subscriber misses a pub/sub message).
pub struct SyncWorker {
    kv: Arc<dyn Kv>,
    remote: Arc<dyn RemoteStore>,
    cache: Arc<CacheTier>,
    invalidator: Invalidator,
    interval: Duration,
    batch_size: usize,
    pending: RwLock<HashMap<String, PendingMemory>>,
    last_pass_at: RwLock<Option<chrono::DateTime<Utc>>>,
}

impl SyncWorker {
    pub fn new(kv: Arc<dyn Kv>, remote: Arc<dyn RemoteStore>, cache: Arc<CacheTier>, tuning: &TuningConfig) -> Self {
        Self {
            invalidator: Invalidator::new(kv.clone()),
            kv,
            remote,
            cache,
            interval: tuning.sync_interval,
            batch_size: tuning.batch_size,
            pending: RwLock::new(HashMap::new()),
            last_pass_at: RwLock::new(None),
        }
    }

    /// Runs passes on `interval` forever, alongside a listener that clears a
    /// memory from the pending map once its enrichment actually completes.
    /// Intended to run as a long-lived background task.
    pub async fn run(self: Arc<Self>) {
        let listener = self.clone();
        tokio::spawn(async move {
            if let Err(e) = listener.listen_for_completions().await {
                warn!("sync pending-completion listener exited: {e}");
            }
        });

        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.run_pass().await {
                warn!("sync pass failed: {e}");
            }
        }
    }

    /// Subscribes to `job:complete` (keyed by memory id, same as the job
    /// queue) purely to drop completed entries from the pending map.
    async fn listen_for_completions(&self) -> MemoryResult<()> {
        let mut rx = self.kv.subscribe(CHANNEL_JOB_COMPLETE).await?;
        while let Some(raw) = rx.recv().await {
            let message: JobCompleteMessage = match serde_json::from_str(&raw) {
                Ok(m) => m,
                Err(e) => {
                    warn!("dropping malformed job:complete payload: {e}");
                    continue;
                }
            };
            if message.ok {
                self.pending.write().await.remove(&message.job_id);
            }
        }
        Ok(())
    }

    pub async fn run_pass(&self) -> MemoryResult<()> {
        debug!("starting sync pass");
        let mut refreshed = 0u64;

        let user_ids = self.kv.scan("memories:*").await?;
        for key in &user_ids {
            let Some(user_id) = key.strip_prefix("memories:") else {
                continue;
            };
            let memories = self.remote.list(user_id, self.batch_size, 0).await?;
            for memory in memories {
                let tier = self.cache.tier_for(&memory).await?;
                if matches!(tier, Tier::Hot) {
                    self.cache.put(&memory, tier).await?;
                    refreshed += 1;
                }
            }
        }

        let expired = self.sweep_expired_search_cache().await?;
        let recovered = self.recover_stale_pending().await?;
        *self.last_pass_at.write().await = Some(Utc::now());
        info!(
            "sync pass complete: refreshed {refreshed} memories, swept {expired} search-cache keys, \
             recovered {recovered} stalled enrichments"
        );
        Ok(())
    }

    /// Removes `search:*` entries that somehow carry no TTL. In normal
    /// operation every search-cache write goes through `set_ex`, so this is
    /// a safety net against a future write path that forgets to set one,
    /// not the primary expiry mechanism (the KV store expires those itself).
    async fn sweep_expired_search_cache(&self) -> MemoryResult<u64> {
        let keys = self.kv.scan("search:*").await?;
        let mut swept = 0u64;
        for key in keys {
            if self.kv.ttl(&key).await?.is_none() {
                self.kv.del(&[key]).await?;
                swept += 1;
            }
        }
        Ok(swept)
    }

    /// Re-publishes `memory:process` for every pending memory older than
    /// `PENDING_RECOVERY_AGE` — the repair path spec §4.11 Failure semantics
    /// promises for a `memory:process` message a subscriber never saw.
    async fn recover_stale_pending(&self) -> MemoryResult<u64> {
        let now = Utc::now();
        let stale: Vec<(String, PendingMemory)> = {
            let pending = self.pending.read().await;
            pending
                .iter()
                .filter(|(_, entry)| {
                    now.signed_duration_since(entry.inserted_at)
                        >= chrono::Duration::from_std(PENDING_RECOVERY_AGE).unwrap_or(chrono::Duration::zero())
                })
                .map(|(id, entry)| (id.clone(), entry.clone()))
                .collect()
        };

        for (memory_id, entry) in &stale {
            self.invalidator.publish_process(memory_id, &entry.user_id, entry.priority).await?;
        }

        Ok(stale.len() as u64)
    }

    /// Records a freshly added memory as awaiting enrichment. Cleared either
    /// by `listen_for_completions` observing a successful `job:complete`, or
    /// by `recover_stale_pending` re-publishing `memory:process` for it.
    pub async fn note_pending(&self, memory_id: &str, user_id: &str, priority: Priority) {
        self.pending.write().await.insert(
            memory_id.to_string(),
            PendingMemory { user_id: user_id.to_string(), priority, inserted_at: Utc::now() },
        );
    }

    pub async fn status(&self) -> SyncStatus {
        SyncStatus {
            pending_operations: self.pending.read().await.len() as u64,
            last_pass_at: *self.last_pass_at.read().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;
    use crate::remote::MemoryRemoteStore;
    use crate::types::Memory;

    #[tokio::test]
    async fn run_pass_refreshes_hot_memories_and_updates_status() {
        let kv: Arc<dyn Kv> = Arc::new(MemoryKv::new());
        let remote: Arc<dyn RemoteStore> = Arc::new(MemoryRemoteStore::new());
        let mut memory = Memory::new("m1", "u1", "hello");
        memory.metadata.priority = crate::types::Priority::High;
        remote.add(memory).await.unwrap();
        kv.sadd("memories:u1", "m1").await.unwrap();

        let cache = Arc::new(CacheTier::new(kv.clone(), &TuningConfig::default()));
        let worker = SyncWorker::new(kv, remote, cache.clone(), &TuningConfig::default());

        worker.run_pass().await.unwrap();

        assert!(cache.peek("u1", "m1").await.unwrap().is_some());
        let status = worker.status().await;
        assert!(status.last_pass_at.is_some());
        assert_eq!(status.pending_operations, 0);
    }

    #[tokio::test]
    async fn sweep_expired_search_cache_leaves_ttld_keys_alone() {
        let kv: Arc<dyn Kv> = Arc::new(MemoryKv::new());
        kv.set_ex("search:abc:10", "{}".to_string(), Duration::from_secs(60)).await.unwrap();
        let remote: Arc<dyn RemoteStore> = Arc::new(MemoryRemoteStore::new());
        let cache = Arc::new(CacheTier::new(kv.clone(), &TuningConfig::default()));
        let worker = SyncWorker::new(kv.clone(), remote, cache, &TuningConfig::default());

        let swept = worker.sweep_expired_search_cache().await.unwrap();
        assert_eq!(swept, 0);
        assert!(kv.get("search:abc:10").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn pending_memory_is_recovered_after_the_recovery_window() {
        let kv: Arc<dyn Kv> = Arc::new(MemoryKv::new());
        let remote: Arc<dyn RemoteStore> = Arc::new(MemoryRemoteStore::new());
        let cache = Arc::new(CacheTier::new(kv.clone(), &TuningConfig::default()));
        let worker = SyncWorker::new(kv.clone(), remote, cache, &TuningConfig::default());

        {
            let mut pending = worker.pending.write().await;
            pending.insert(
                "m1".to_string(),
                PendingMemory {
                    user_id: "u1".to_string(),
                    priority: Priority::Normal,
                    inserted_at: Utc::now() - chrono::Duration::seconds(61),
                },
            );
        }

        let mut rx = kv.subscribe(crate::invalidator::CHANNEL_MEMORY_PROCESS).await.unwrap();
        let recovered = worker.recover_stale_pending().await.unwrap();
        assert_eq!(recovered, 1);

        let raw = rx.recv().await.unwrap();
        let message: crate::invalidator::MemoryProcessMessage = serde_json::from_str(&raw).unwrap();
        assert_eq!(message.memory_id, "m1");
        assert_eq!(message.user_id, "u1");
    }

    #[tokio::test]
    async fn recent_pending_memory_is_not_recovered_yet() {
        let kv: Arc<dyn Kv> = Arc::new(MemoryKv::new());
        let remote: Arc<dyn RemoteStore> = Arc::new(MemoryRemoteStore::new());
        let cache = Arc::new(CacheTier::new(kv.clone(), &TuningConfig::default()));
        let worker = SyncWorker::new(kv, remote, cache, &TuningConfig::default());

        worker.note_pending("m1", "u1", Priority::Normal).await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let recovered = worker.recover_stale_pending().await.unwrap();
        assert_eq!(recovered, 0);
        assert_eq!(worker.status().await.pending_operations, 1);
    }
}
