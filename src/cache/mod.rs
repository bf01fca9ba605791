//! Cache tier (C6): per-memory KV storage with L1 (hot) / L2 (warm) TTLs and
//! access-count-driven promotion.
//!
//! Keys: `memory:{user_id}:{id}` holds the serialized `Memory`; `access:{id}`
//! holds a monotonically increasing access counter.

use crate::config::TuningConfig;
use crate::error::MemoryResult;
use crate::kv::Kv;
use crate::types::Memory;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Which TTL tier a cached entry should use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Hot,
    Warm,
}

pub struct CacheTier {
    kv: Arc<dyn Kv>,
    l1_ttl: Duration,
    l2_ttl: Duration,
    frequent_access_threshold: u64,
}

fn memory_key(user_id: &str, id: &str) -> String {
    format!("memory:{user_id}:{id}")
}

fn access_key(id: &str) -> String {
    format!("access:{id}")
}

impl CacheTier {
    pub fn new(kv: Arc<dyn Kv>, tuning: &TuningConfig) -> Self {
        Self {
            kv,
            l1_ttl: tuning.l1_ttl,
            l2_ttl: tuning.l2_ttl,
            frequent_access_threshold: tuning.frequent_access_threshold,
        }
    }

    fn ttl_for(&self, tier: Tier) -> Duration {
        match tier {
            Tier::Hot => self.l1_ttl,
            Tier::Warm => self.l2_ttl,
        }
    }

    /// Caches a memory at the given tier. Used by `Add` (always `Hot`) and by
    /// enrichment (tier chosen by priority/access count).
    pub async fn put(&self, memory: &Memory, tier: Tier) -> MemoryResult<()> {
        let serialized = serde_json::to_string(memory)?;
        self.kv
            .set_ex(&memory_key(&memory.user_id, &memory.id), serialized, self.ttl_for(tier))
            .await
    }

    /// Reads a cached memory without counting it as an access (used internally
    /// by sweeps that shouldn't perturb promotion state).
    pub async fn peek(&self, user_id: &str, id: &str) -> MemoryResult<Option<Memory>> {
        let raw = self.kv.get(&memory_key(user_id, id)).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Reads a cached memory, incrementing its access counter and promoting to
    /// `Hot` if the counter crosses `FrequentAccessThreshold` while still Warm.
    pub async fn get(&self, user_id: &str, id: &str) -> MemoryResult<Option<Memory>> {
        let memory = match self.peek(user_id, id).await? {
            Some(m) => m,
            None => return Ok(None),
        };

        let access_count = self.kv.incr(&access_key(id)).await? as u64;
        if access_count >= self.frequent_access_threshold {
            if let Some(remaining) = self.kv.ttl(&memory_key(user_id, id)).await? {
                if remaining < self.l1_ttl {
                    debug!("promoting memory {id} to hot tier after {access_count} accesses");
                    self.kv.expire(&memory_key(user_id, id), self.l1_ttl).await?;
                }
            }
        }

        Ok(Some(memory))
    }

    /// Chooses Hot vs Warm the way enrichment does: high/critical priority or
    /// an access count already past the threshold goes Hot.
    pub async fn tier_for(&self, memory: &Memory) -> MemoryResult<Tier> {
        use crate::types::Priority;
        if matches!(memory.metadata.priority, Priority::High | Priority::Critical) {
            return Ok(Tier::Hot);
        }
        let access_count = self
            .kv
            .get(&access_key(&memory.id))
            .await?
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);
        Ok(if access_count >= self.frequent_access_threshold {
            Tier::Hot
        } else {
            Tier::Warm
        })
    }

    /// Purges a memory's cache entry and access counter. Keyword/vector index
    /// cleanup is the caller's responsibility (orchestrator `Delete`).
    pub async fn evict(&self, user_id: &str, id: &str) -> MemoryResult<()> {
        self.kv
            .del(&[memory_key(user_id, id), access_key(id)])
            .await?;
        Ok(())
    }

    pub async fn access_count(&self, id: &str) -> MemoryResult<u64> {
        Ok(self
            .kv
            .get(&access_key(id))
            .await?
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;
    use crate::types::Priority;

    fn tuning() -> TuningConfig {
        let mut t = TuningConfig::default();
        t.l1_ttl = Duration::from_secs(1000);
        t.l2_ttl = Duration::from_secs(10);
        t.frequent_access_threshold = 3;
        t
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let kv: Arc<dyn Kv> = Arc::new(MemoryKv::new());
        let cache = CacheTier::new(kv, &tuning());
        let memory = Memory::new("m1", "u1", "hello");

        cache.put(&memory, Tier::Hot).await.unwrap();
        let fetched = cache.get("u1", "m1").await.unwrap().unwrap();
        assert_eq!(fetched.content, "hello");
    }

    #[tokio::test]
    async fn get_increments_access_counter() {
        let kv: Arc<dyn Kv> = Arc::new(MemoryKv::new());
        let cache = CacheTier::new(kv, &tuning());
        let memory = Memory::new("m1", "u1", "hello");

        cache.put(&memory, Tier::Warm).await.unwrap();
        cache.get("u1", "m1").await.unwrap();
        cache.get("u1", "m1").await.unwrap();
        assert_eq!(cache.access_count("m1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn promotion_happens_after_threshold_crossed() {
        let kv: Arc<dyn Kv> = Arc::new(MemoryKv::new());
        let cache = CacheTier::new(kv.clone(), &tuning());
        let memory = Memory::new("m1", "u1", "hello");

        cache.put(&memory, Tier::Warm).await.unwrap();
        for _ in 0..3 {
            cache.get("u1", "m1").await.unwrap();
        }
        let remaining = kv.ttl(&memory_key("u1", "m1")).await.unwrap().unwrap();
        assert!(remaining > Duration::from_secs(10));
    }

    #[tokio::test]
    async fn high_priority_memories_choose_hot_tier() {
        let kv: Arc<dyn Kv> = Arc::new(MemoryKv::new());
        let cache = CacheTier::new(kv, &tuning());
        let mut memory = Memory::new("m1", "u1", "hello");
        memory.metadata.priority = Priority::High;

        assert_eq!(cache.tier_for(&memory).await.unwrap(), Tier::Hot);
    }

    #[tokio::test]
    async fn evict_removes_entry_and_counter() {
        let kv: Arc<dyn Kv> = Arc::new(MemoryKv::new());
        let cache = CacheTier::new(kv, &tuning());
        let memory = Memory::new("m1", "u1", "hello");

        cache.put(&memory, Tier::Hot).await.unwrap();
        cache.evict("u1", "m1").await.unwrap();
        assert!(cache.get("u1", "m1").await.unwrap().is_none());
    }
}
