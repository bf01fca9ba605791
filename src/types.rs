use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Priority tag on a memory, influencing cache tier and enrichment ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    /// Accepts the tool surface's `"medium"` spelling as well as `"normal"`.
    #[serde(alias = "medium")]
    Normal,
    High,
    /// Beyond the tool surface's `{high, medium, low}`; set internally for
    /// memories the remote store itself flags as high-urgency.
    Critical,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// Free-form metadata attached to a memory. Enrichment fills `entities`,
/// `relationships`, and `keywords` after the memory is cached.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub access_count: u64,
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub relationships: Vec<(String, String)>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub embedding_version: Option<u32>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// A single memory record. Identity is the `(user_id, id)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Memory {
    pub fn new(id: impl Into<String>, user_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            content: content.into(),
            created_at: Utc::now(),
            updated_at: None,
            metadata: Metadata::default(),
        }
    }
}

/// A scored search result, merged from keyword, vector, and/or remote sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredMemory {
    pub memory: Memory,
    pub score: f32,
    pub source: MatchSource,
}

/// Which subsystem(s) contributed to a search hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchSource {
    Vector,
    Keyword,
    Remote,
    Merged,
}

/// A serialized search-result-cache entry keyed by `search:{sha1(query)}:{limit}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCacheEntry {
    pub ids: Vec<String>,
    pub scores: Vec<f32>,
    pub cached_at: DateTime<Utc>,
}

/// A vector-index entry; vectors are always L2-normalized on insert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub user_id: String,
    pub vector: Vec<f32>,
}

/// Result of a deduplication pass over one user's memories
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DeduplicationReport {
    pub groups: Vec<Vec<String>>,
    pub deleted: Vec<String>,
}

/// Snapshot returned by the `Stats` operation
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheStatsSnapshot {
    pub cached: u64,
    pub keywords: u64,
    pub access_total: u64,
    pub top_accessed: Vec<(String, u64)>,
    pub memory_usage_bytes: u64,
}

/// Status of the background sync / enrichment pipeline, used by `sync_status`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SyncStatus {
    pub pending_operations: u64,
    pub last_pass_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Tool-surface request/response payloads (§6)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct AddMemoryInput {
    #[serde(default)]
    pub messages: Option<Vec<String>>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default = "default_true")]
    pub r#async: bool,
    #[serde(default)]
    pub skip_duplicate_check: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchMemoryInput {
    pub query: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default = "default_search_limit")]
    pub limit: usize,
    #[serde(default = "default_true")]
    pub prefer_cache: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetAllMemoriesInput {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default = "default_get_all_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_true")]
    pub include_cache_stats: bool,
    #[serde(default = "default_true")]
    pub prefer_cache: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteMemoryInput {
    pub memory_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeduplicateMemoriesInput {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default = "default_dedup_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_true")]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OptimizeCacheInput {
    #[serde(default)]
    pub force_refresh: bool,
    #[serde(default = "default_max_memories")]
    pub max_memories: usize,
}

fn default_true() -> bool {
    true
}
fn default_search_limit() -> usize {
    10
}
fn default_get_all_limit() -> usize {
    100
}
fn default_dedup_threshold() -> f32 {
    0.85
}
fn default_max_memories() -> usize {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_new_defaults_to_normal_priority() {
        let m = Memory::new("id1", "user1", "hello world");
        assert_eq!(m.metadata.priority, Priority::Normal);
        assert!(m.updated_at.is_none());
    }

    #[test]
    fn add_memory_input_defaults() {
        let json = r#"{"content": "hi"}"#;
        let input: AddMemoryInput = serde_json::from_str(json).unwrap();
        assert!(input.r#async);
        assert!(!input.skip_duplicate_check);
        assert_eq!(input.content.as_deref(), Some("hi"));
    }

    #[test]
    fn search_memory_input_limit_default() {
        let json = r#"{"query": "rust"}"#;
        let input: SearchMemoryInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.limit, 10);
        assert!(input.prefer_cache);
    }

    #[test]
    fn priority_round_trips_through_json() {
        let json = serde_json::to_string(&Priority::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
        let back: Priority = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Priority::Critical);
    }
}
