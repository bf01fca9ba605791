//! Orchestrator (C11): the engine's public API. Every tool in the stdio
//! surface dispatches onto one of these methods.

use crate::cache::{CacheTier, Tier};
use crate::config::TuningConfig;
use crate::enrichment::{Embedder, Extractor};
use crate::error::{MemoryError, MemoryResult};
use crate::invalidator::{InvalidateOp, Invalidator};
use crate::jobs::JobQueue;
use crate::keyword::{tokenize_query, KeywordIndex};
use crate::kv::Kv;
use crate::remote::RemoteStore;
use crate::similarity::{token_jaccard, RankingWeights, SubScores};
use crate::sync::SyncWorker;
use crate::types::{
    AddMemoryInput, CacheStatsSnapshot, DeduplicateMemoriesInput, DeduplicationReport, DeleteMemoryInput,
    GetAllMemoriesInput, MatchSource, Memory, Priority, ScoredMemory, SearchCacheEntry, SearchMemoryInput, SyncStatus,
};
use chrono::Utc;
use sha1::{Digest, Sha1};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, warn};

/// Ten years — effectively permanent for the `owner:{id}` lookup table, which
/// exists only to let `delete_memory` accept an id without a user_id (the
/// tool contract carries no user_id per §6's table).
const OWNER_KEY_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 3600);

#[derive(Debug, Clone, PartialEq)]
pub enum AddStatus {
    Saved,
    AlreadySaved,
    Queued { job_id: String },
}

#[derive(Debug, Clone)]
pub struct AddOutcome {
    pub status: AddStatus,
    pub id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub memories: Vec<ScoredMemory>,
    pub degraded: bool,
}

#[derive(Debug, Clone)]
pub struct GetAllOutcome {
    pub total: usize,
    pub returned: usize,
    pub has_more: bool,
    pub memories: Vec<Memory>,
}

fn search_cache_key(query: &str, limit: usize) -> String {
    let mut hasher = Sha1::new();
    hasher.update(query.as_bytes());
    format!("search:{}:{}", hex::encode(hasher.finalize()), limit)
}

fn truncate_chars(text: &str, n: usize) -> String {
    text.chars().take(n).collect()
}

/// Wires together every component (C1-C10, C12) behind the public operations
/// of §4.11. Cheap to clone via the `Arc` fields it's built from; intended to
/// be held in one `Arc<Engine>` shared across the tool server's dispatch tasks.
pub struct Engine {
    kv: Arc<dyn Kv>,
    remote: Arc<dyn RemoteStore>,
    cache: Arc<CacheTier>,
    keyword_index: Arc<KeywordIndex>,
    vector_index: Arc<crate::vector::VectorIndex>,
    embedder: Arc<dyn Embedder>,
    extractor: Arc<dyn Extractor>,
    invalidator: Invalidator,
    job_queue: Arc<JobQueue>,
    sync_worker: Arc<SyncWorker>,
    tuning: TuningConfig,
    default_user_id: String,
    weights: RankingWeights,
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    pub async fn new(
        kv: Arc<dyn Kv>,
        remote: Arc<dyn RemoteStore>,
        embedder: Arc<dyn Embedder>,
        extractor: Arc<dyn Extractor>,
        tuning: TuningConfig,
        default_user_id: String,
    ) -> MemoryResult<Self> {
        let cache = Arc::new(CacheTier::new(kv.clone(), &tuning));
        let keyword_index = Arc::new(KeywordIndex::new(kv.clone(), tuning.l2_ttl));
        let vector_index = Arc::new(crate::vector::VectorIndex::new());
        let job_queue = Arc::new(JobQueue::spawn(kv.clone(), tuning.job_wait_timeout).await?);
        let sync_worker = Arc::new(SyncWorker::new(kv.clone(), remote.clone(), cache.clone(), &tuning));

        Ok(Self {
            invalidator: Invalidator::new(kv.clone()),
            kv,
            remote,
            cache,
            keyword_index,
            vector_index,
            embedder,
            extractor,
            job_queue,
            sync_worker,
            tuning,
            default_user_id,
            weights: RankingWeights::default(),
        })
    }

    pub fn sync_worker(&self) -> Arc<SyncWorker> {
        self.sync_worker.clone()
    }

    /// The engine's own KV handle, for subscribing a background worker (e.g.
    /// `EnrichmentWorker::run`) to the same pub/sub channels this engine
    /// publishes on. Must not be swapped for a separately constructed `Kv`.
    pub fn kv(&self) -> Arc<dyn Kv> {
        self.kv.clone()
    }

    /// Builds the enrichment worker sharing this engine's own cache, indexes,
    /// and job queue. Kept as a constructor method (rather than exposing the
    /// fields) so `main` never has to reach past the engine to wire the
    /// background pipeline together.
    pub fn build_enrichment_worker(&self) -> Arc<crate::enrichment::EnrichmentWorker> {
        Arc::new(crate::enrichment::EnrichmentWorker::new(
            self.kv.clone(),
            self.remote.clone(),
            self.cache.clone(),
            self.keyword_index.clone(),
            self.vector_index.clone(),
            self.embedder.clone(),
            self.extractor.clone(),
            self.job_queue.clone(),
        ))
    }

    /// Number of enrichment jobs currently awaited by a caller, used by
    /// graceful shutdown to decide whether the drain window actually drained.
    pub async fn pending_job_count(&self) -> usize {
        self.job_queue.pending_count().await
    }

    fn resolve_user(&self, user_id: Option<String>) -> String {
        user_id.unwrap_or_else(|| self.default_user_id.clone())
    }

    #[instrument(skip(self, input), fields(user_id = ?input.user_id))]
    pub async fn add(&self, input: AddMemoryInput) -> MemoryResult<AddOutcome> {
        let user_id = self.resolve_user(input.user_id.clone());
        let content = match (&input.messages, &input.content) {
            (Some(messages), _) if !messages.is_empty() => messages.join("\n"),
            (_, Some(content)) if !content.trim().is_empty() => content.clone(),
            _ => return Err(MemoryError::Invalid("add_memory requires messages or content".to_string())),
        };

        if content.len() > self.tuning.max_content_length {
            return Err(MemoryError::Invalid(format!(
                "content length {} exceeds the {}-byte limit",
                content.len(),
                self.tuning.max_content_length
            )));
        }

        if !input.skip_duplicate_check {
            let probe = truncate_chars(&content, 100);
            let probe_results = self
                .search(SearchMemoryInput {
                    query: probe,
                    user_id: Some(user_id.clone()),
                    limit: 5,
                    prefer_cache: true,
                })
                .await?;
            for candidate in &probe_results.memories {
                if token_jaccard(&content, &candidate.memory.content) >= 0.85 {
                    return Ok(AddOutcome {
                        status: AddStatus::AlreadySaved,
                        id: Some(candidate.memory.id.clone()),
                    });
                }
            }
        }

        let metadata = input.metadata.clone().unwrap_or_default();
        let added = self.remote.add(&user_id, &content, metadata).await?;
        let priority = input.priority.unwrap_or_default();

        let mut ids: Vec<String> = Vec::new();
        for mut record in added {
            record.metadata.priority = priority;
            self.cache.put(&record, Tier::Hot).await?;
            self.kv.sadd(&format!("memories:{user_id}"), &record.id).await?;
            self.kv
                .set_ex(&format!("owner:{}", record.id), user_id.clone(), OWNER_KEY_TTL)
                .await?;
            self.sync_worker.note_pending(&record.id, &user_id, priority).await;
            ids.push(record.id.clone());
        }

        let Some(id) = ids.first().cloned() else {
            return Err(MemoryError::Internal("remote store returned no records for add".to_string()));
        };

        self.invalidator.publish_invalidate(&id, InvalidateOp::Update).await?;

        // §4.11: every record the remote store returned gets its own
        // `memory:process` event, not just the primary one — otherwise the
        // extra records never reach the vector/keyword index.
        if input.r#async {
            for record_id in &ids {
                self.invalidator.publish_process(record_id, &user_id, priority).await?;
            }
            Ok(AddOutcome {
                status: AddStatus::Queued { job_id: id.clone() },
                id: Some(id),
            })
        } else {
            let mut waiters = Vec::with_capacity(ids.len());
            for record_id in &ids {
                let rx = self.job_queue.register_with_id(record_id.clone()).await;
                waiters.push((record_id.clone(), rx));
            }
            for record_id in &ids {
                self.invalidator.publish_process(record_id, &user_id, priority).await?;
            }
            for (record_id, rx) in waiters {
                self.job_queue.wait(&record_id, rx, Some(self.tuning.job_wait_timeout)).await?;
            }
            Ok(AddOutcome {
                status: AddStatus::Saved,
                id: Some(id),
            })
        }
    }

    async fn load_memory(&self, user_id: &str, id: &str) -> MemoryResult<Option<Memory>> {
        if let Some(memory) = self.cache.get(user_id, id).await? {
            return Ok(Some(memory));
        }
        match self.remote.get(user_id, id).await {
            Ok(memory) => Ok(Some(memory)),
            Err(MemoryError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn sub_score(
        &self,
        memory: &Memory,
        cosine: Option<f32>,
        keyword_matches: usize,
        query_entities: &[String],
        query_token_count: usize,
    ) -> MemoryResult<f32> {
        // §4.3: cosine is mapped affinely to [0,1] via (x+1)/2, not clamped — an
        // anti-correlated match (cosine < 0) still scores above an unrelated one.
        // Candidates with no vector comparison at all (keyword/remote-only hits)
        // contribute no semantic score rather than the affine midpoint.
        let s_sem = cosine.map(|c| ((c + 1.0) / 2.0).clamp(0.0, 1.0)).unwrap_or(0.0);
        let s_kw = (keyword_matches as f32 / query_token_count as f32).min(1.0);
        let overlap = query_entities.iter().filter(|e| memory.metadata.entities.contains(e)).count();
        let s_ent = (overlap as f32 * 0.2).min(1.0);
        let age_days = (Utc::now() - memory.created_at).num_seconds() as f32 / 86_400.0;
        let s_rec = ((7.0 - age_days).max(0.0) / 7.0) * 0.1;
        let access = self.cache.access_count(&memory.id).await?;
        let s_freq = (access as f32 / 10.0).min(1.0) * 0.05;

        Ok(self.weights.combine(SubScores {
            semantic: s_sem,
            keyword: s_kw,
            entity: s_ent,
            recency: s_rec,
            frequency: s_freq,
        }))
    }

    #[instrument(skip(self, input), fields(user_id = ?input.user_id, query = %input.query))]
    pub async fn search(&self, input: SearchMemoryInput) -> MemoryResult<SearchOutcome> {
        if input.query.trim().is_empty() {
            return Ok(SearchOutcome { memories: Vec::new(), degraded: false });
        }

        let user_id = self.resolve_user(input.user_id.clone());
        let limit = input.limit.max(1);
        let cache_key = search_cache_key(&input.query, limit);

        if input.prefer_cache {
            if let Some(raw) = self.kv.get(&cache_key).await? {
                if let Ok(entry) = serde_json::from_str::<SearchCacheEntry>(&raw) {
                    let mut memories = Vec::with_capacity(entry.ids.len());
                    for (id, score) in entry.ids.iter().zip(entry.scores.iter()) {
                        if let Some(memory) = self.load_memory(&user_id, id).await? {
                            memories.push(ScoredMemory {
                                memory,
                                score: *score,
                                source: MatchSource::Merged,
                            });
                        }
                    }
                    return Ok(SearchOutcome { memories, degraded: false });
                }
            }
        }

        let query_entities = self
            .extractor
            .extract(&input.query)
            .await
            .map(|e| e.entities)
            .unwrap_or_default();
        let query_token_count = tokenize_query(&input.query).len().max(1);

        let mut candidates: HashMap<String, ScoredMemory> = HashMap::new();

        if let Ok(query_vector) = self.embedder.embed(&input.query).await {
            for (id, cosine) in self.vector_index.search(&user_id, &query_vector, 2 * limit).await {
                let Some(memory) = self.load_memory(&user_id, &id).await? else { continue };
                let score = self.sub_score(&memory, Some(cosine), 0, &query_entities, query_token_count).await?;
                candidates.insert(id, ScoredMemory { memory, score, source: MatchSource::Vector });
            }
        }

        if candidates.len() < limit {
            let quota = (limit / 2).max(1);
            for (id, matches) in self.keyword_index.search(&input.query).await?.into_iter().take(quota) {
                if candidates.contains_key(&id) {
                    continue;
                }
                let Some(memory) = self.load_memory(&user_id, &id).await? else { continue };
                let score = self.sub_score(&memory, None, matches, &query_entities, query_token_count).await?;
                candidates.insert(id, ScoredMemory { memory, score, source: MatchSource::Keyword });
            }
        }

        let mut degraded = false;
        if candidates.len() < limit {
            let remaining = limit - candidates.len();
            match self.remote.search(&user_id, &input.query, remaining).await {
                Ok(results) => {
                    for memory in results {
                        if candidates.contains_key(&memory.id) {
                            continue;
                        }
                        let score = self.sub_score(&memory, None, 0, &query_entities, query_token_count).await?;
                        candidates.insert(memory.id.clone(), ScoredMemory { memory, score, source: MatchSource::Remote });
                    }
                }
                Err(e) => {
                    warn!("remote search degraded: {e}");
                    degraded = true;
                }
            }
        }

        let mut ranked: Vec<ScoredMemory> = candidates.into_values().collect();
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(limit);

        let entry = SearchCacheEntry {
            ids: ranked.iter().map(|m| m.memory.id.clone()).collect(),
            scores: ranked.iter().map(|m| m.score).collect(),
            cached_at: Utc::now(),
        };
        if let Ok(serialized) = serde_json::to_string(&entry) {
            let _ = self.kv.set_ex(&cache_key, serialized, self.tuning.search_ttl).await;
        }

        Ok(SearchOutcome { memories: ranked, degraded })
    }

    #[instrument(skip(self, input), fields(user_id = ?input.user_id))]
    pub async fn get_all(&self, input: GetAllMemoriesInput) -> MemoryResult<GetAllOutcome> {
        let user_id = self.resolve_user(input.user_id.clone());
        let limit = input.limit.min(500);

        let memories = if input.prefer_cache {
            let mut keys = self.kv.scan(&format!("memory:{user_id}:*")).await?;
            keys.sort();
            let mut out = Vec::new();
            for key in keys.into_iter().skip(input.offset).take(limit) {
                if let Some(raw) = self.kv.get(&key).await? {
                    if let Ok(memory) = serde_json::from_str::<Memory>(&raw) {
                        out.push(memory);
                    }
                }
            }
            out
        } else {
            self.remote.list(&user_id, limit, input.offset).await?
        };

        let total = self.kv.smembers(&format!("memories:{user_id}")).await?.len();
        let returned = memories.len();
        let has_more = input.offset + returned < total;

        Ok(GetAllOutcome { total, returned, has_more, memories })
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, input: DeleteMemoryInput) -> MemoryResult<()> {
        let id = input.memory_id;
        let user_id = self
            .resolve_owner(&id)
            .await?
            .ok_or_else(|| MemoryError::NotFound(id.clone()))?;

        self.remote.delete(&user_id, &id).await?;
        self.invalidator.publish_invalidate(&id, InvalidateOp::Delete).await?;

        self.cache.evict(&user_id, &id).await?;
        self.keyword_index.remove(&id).await?;
        self.vector_index.delete(&id).await;
        self.kv.srem(&format!("memories:{user_id}"), &id).await?;
        self.kv.del(&[format!("owner:{id}")]).await?;
        Ok(())
    }

    async fn resolve_owner(&self, id: &str) -> MemoryResult<Option<String>> {
        if let Some(user_id) = self.kv.get(&format!("owner:{id}")).await? {
            return Ok(Some(user_id));
        }
        let keys = self.kv.scan(&format!("memory:*:{id}")).await?;
        Ok(keys.into_iter().next().and_then(|key| key.split(':').nth(1).map(str::to_string)))
    }

    #[instrument(skip(self, input), fields(user_id = ?input.user_id))]
    pub async fn deduplicate(&self, input: DeduplicateMemoriesInput) -> MemoryResult<DeduplicationReport> {
        let user_id = self.resolve_user(input.user_id.clone());
        let memories = self.remote.list(&user_id, 1000, 0).await?;

        let mut visited: HashSet<String> = HashSet::new();
        let mut groups: Vec<Vec<String>> = Vec::new();

        for i in 0..memories.len() {
            if visited.contains(&memories[i].id) {
                continue;
            }
            let mut group = vec![memories[i].id.clone()];
            for other in memories.iter().skip(i + 1) {
                if visited.contains(&other.id) {
                    continue;
                }
                if token_jaccard(&memories[i].content, &other.content) >= input.similarity_threshold {
                    group.push(other.id.clone());
                    visited.insert(other.id.clone());
                }
            }
            if group.len() > 1 {
                visited.insert(memories[i].id.clone());
                groups.push(group);
            }
        }

        let mut deleted = Vec::new();
        if !input.dry_run {
            for group in &groups {
                for duplicate_id in &group[1..] {
                    self.delete(DeleteMemoryInput { memory_id: duplicate_id.clone() }).await?;
                    deleted.push(duplicate_id.clone());
                }
            }
        }

        Ok(DeduplicationReport { groups, deleted })
    }

    #[instrument(skip(self, input))]
    pub async fn optimize_cache(&self, input: crate::types::OptimizeCacheInput) -> MemoryResult<CacheStatsSnapshot> {
        if input.force_refresh {
            for pattern in ["memory:*", "kw:*", "mkw:*"] {
                let keys = self.kv.scan(pattern).await?;
                if !keys.is_empty() {
                    self.kv.del(&keys).await?;
                }
            }
        }

        let user_keys = self.kv.scan("memories:*").await?;
        for key in user_keys {
            let Some(user_id) = key.strip_prefix("memories:") else { continue };
            let records = self.remote.list(user_id, input.max_memories, 0).await?;
            for (idx, memory) in records.iter().enumerate() {
                let access = self.cache.access_count(&memory.id).await?;
                let tier = if idx < 100 || access >= self.tuning.frequent_access_threshold {
                    Tier::Hot
                } else {
                    Tier::Warm
                };
                self.cache.put(memory, tier).await?;
                self.keyword_index.index(&memory.id, &memory.content).await?;
            }
        }

        self.stats().await
    }

    #[instrument(skip(self))]
    pub async fn stats(&self) -> MemoryResult<CacheStatsSnapshot> {
        let memory_keys = self.kv.scan("memory:*").await?;
        let keyword_keys = self.kv.scan("kw:*").await?;
        let access_keys = self.kv.scan("access:*").await?;

        let mut access_total = 0u64;
        let mut top: Vec<(String, u64)> = Vec::new();
        for key in &access_keys {
            if let Some(id) = key.strip_prefix("access:") {
                let count = self
                    .kv
                    .get(key)
                    .await?
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(0);
                access_total += count;
                top.push((id.to_string(), count));
            }
        }
        top.sort_by(|a, b| b.1.cmp(&a.1));
        top.truncate(10);

        let mut memory_usage_bytes = 0u64;
        for key in &memory_keys {
            if let Some(value) = self.kv.get(key).await? {
                memory_usage_bytes += value.len() as u64;
            }
        }

        Ok(CacheStatsSnapshot {
            cached: memory_keys.len() as u64,
            keywords: keyword_keys.len() as u64,
            access_total,
            top_accessed: top,
            memory_usage_bytes,
        })
    }

    pub async fn sync_status(&self) -> SyncStatus {
        self.sync_worker.status().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::{HashEmbedder, HeuristicExtractor};
    use crate::kv::MemoryKv;
    use crate::remote::MemoryRemoteStore;

    async fn engine() -> Engine {
        let kv: Arc<dyn Kv> = Arc::new(MemoryKv::new());
        let remote: Arc<dyn RemoteStore> = Arc::new(MemoryRemoteStore::new());
        Engine::new(
            kv,
            remote,
            Arc::new(HashEmbedder::new()),
            Arc::new(HeuristicExtractor::new()),
            TuningConfig::default(),
            "default".to_string(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn add_then_search_finds_memory() {
        let engine = engine().await;
        let outcome = engine
            .add(AddMemoryInput {
                messages: None,
                content: Some("remember to water the plants".to_string()),
                user_id: Some("u1".to_string()),
                metadata: None,
                priority: None,
                r#async: false,
                skip_duplicate_check: true,
            })
            .await
            .unwrap();
        assert_eq!(outcome.status, AddStatus::Saved);

        let results = engine
            .search(SearchMemoryInput {
                query: "water plants".to_string(),
                user_id: Some("u1".to_string()),
                limit: 10,
                prefer_cache: false,
            })
            .await
            .unwrap();
        assert!(!results.memories.is_empty());
    }

    #[tokio::test]
    async fn add_detects_duplicate_via_jaccard() {
        let engine = engine().await;
        engine
            .add(AddMemoryInput {
                messages: None,
                content: Some("remember to water the office plants every day".to_string()),
                user_id: Some("u1".to_string()),
                metadata: None,
                priority: None,
                r#async: false,
                skip_duplicate_check: true,
            })
            .await
            .unwrap();

        let second = engine
            .add(AddMemoryInput {
                messages: None,
                content: Some("remember to water the office plants every day".to_string()),
                user_id: Some("u1".to_string()),
                metadata: None,
                priority: None,
                r#async: false,
                skip_duplicate_check: false,
            })
            .await
            .unwrap();

        assert_eq!(second.status, AddStatus::AlreadySaved);
    }

    #[tokio::test]
    async fn add_accepts_content_exactly_at_the_length_ceiling() {
        let engine = engine().await;
        let content = "a".repeat(engine.tuning.max_content_length);
        let outcome = engine
            .add(AddMemoryInput {
                messages: None,
                content: Some(content),
                user_id: Some("u1".to_string()),
                metadata: None,
                priority: None,
                r#async: false,
                skip_duplicate_check: true,
            })
            .await
            .unwrap();
        assert_eq!(outcome.status, AddStatus::Saved);
    }

    #[tokio::test]
    async fn add_rejects_content_one_byte_over_the_length_ceiling() {
        let engine = engine().await;
        let content = "a".repeat(engine.tuning.max_content_length + 1);
        let result = engine
            .add(AddMemoryInput {
                messages: None,
                content: Some(content),
                user_id: Some("u1".to_string()),
                metadata: None,
                priority: None,
                r#async: false,
                skip_duplicate_check: true,
            })
            .await;
        assert!(matches!(result, Err(MemoryError::Invalid(_))));
    }

    #[tokio::test]
    async fn delete_removes_memory_from_get_all() {
        let engine = engine().await;
        let added = engine
            .add(AddMemoryInput {
                messages: None,
                content: Some("a temporary memory".to_string()),
                user_id: Some("u1".to_string()),
                metadata: None,
                priority: None,
                r#async: false,
                skip_duplicate_check: true,
            })
            .await
            .unwrap();

        engine
            .delete(DeleteMemoryInput { memory_id: added.id.clone().unwrap() })
            .await
            .unwrap();

        let all = engine
            .get_all(GetAllMemoriesInput {
                user_id: Some("u1".to_string()),
                limit: 100,
                offset: 0,
                include_cache_stats: false,
                prefer_cache: false,
            })
            .await
            .unwrap();
        assert_eq!(all.total, 0);
    }

    #[tokio::test]
    async fn deduplicate_dry_run_reports_without_deleting() {
        let engine = engine().await;
        for _ in 0..2 {
            engine
                .add(AddMemoryInput {
                    messages: None,
                    content: Some("duplicate content here".to_string()),
                    user_id: Some("u1".to_string()),
                    metadata: None,
                    priority: None,
                    r#async: false,
                    skip_duplicate_check: true,
                })
                .await
                .unwrap();
        }

        let report = engine
            .deduplicate(DeduplicateMemoriesInput {
                user_id: Some("u1".to_string()),
                similarity_threshold: 0.85,
                dry_run: true,
            })
            .await
            .unwrap();

        assert_eq!(report.groups.len(), 1);
        assert!(report.deleted.is_empty());
    }

    #[tokio::test]
    async fn stats_counts_cached_memories() {
        let engine = engine().await;
        engine
            .add(AddMemoryInput {
                messages: None,
                content: Some("a memory to count".to_string()),
                user_id: Some("u1".to_string()),
                metadata: None,
                priority: None,
                r#async: false,
                skip_duplicate_check: true,
            })
            .await
            .unwrap();

        let stats = engine.stats().await.unwrap();
        assert_eq!(stats.cached, 1);
    }
}
