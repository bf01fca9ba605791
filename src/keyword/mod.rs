//! Keyword index (C4): an inverted index of content tokens over KV.

use crate::error::MemoryResult;
use crate::kv::Kv;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const MIN_TOKEN_LEN: usize = 4;
const MAX_TOKENS_PER_MEMORY: usize = 20;

/// Tokenizes content the way the index does: lowercase, split on non-alphanumeric
/// runs, drop short tokens, keep the first `MAX_TOKENS_PER_MEMORY` distinct tokens.
pub fn tokenize(content: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut tokens = Vec::new();
    for raw in content.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
        if raw.chars().count() < MIN_TOKEN_LEN {
            continue;
        }
        if seen.insert(raw.to_string()) {
            tokens.push(raw.to_string());
            if tokens.len() >= MAX_TOKENS_PER_MEMORY {
                break;
            }
        }
    }
    tokens
}

/// Index query tokens without the per-memory cap, used for `Search`.
pub fn tokenize_query(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .map(|t| t.to_string())
        .collect()
}

/// Maintains `kw:{token} -> {ids}` and its reverse `mkw:{id} -> {tokens}` in KV.
pub struct KeywordIndex {
    kv: Arc<dyn Kv>,
    token_ttl: Duration,
}

impl KeywordIndex {
    pub fn new(kv: Arc<dyn Kv>, token_ttl: Duration) -> Self {
        Self { kv, token_ttl }
    }

    pub async fn index(&self, id: &str, content: &str) -> MemoryResult<()> {
        let tokens = tokenize(content);
        for token in &tokens {
            let key = format!("kw:{token}");
            self.kv.sadd(&key, id).await?;
            self.kv.expire(&key, self.token_ttl).await?;
        }
        let reverse_key = format!("mkw:{id}");
        for token in &tokens {
            self.kv.sadd(&reverse_key, token).await?;
        }
        self.kv.expire(&reverse_key, self.token_ttl).await?;
        Ok(())
    }

    pub async fn remove(&self, id: &str) -> MemoryResult<()> {
        let reverse_key = format!("mkw:{id}");
        let tokens = self.kv.smembers(&reverse_key).await?;
        for token in tokens {
            self.kv.srem(&format!("kw:{token}"), id).await?;
        }
        self.kv.del(&[reverse_key]).await?;
        Ok(())
    }

    /// Ranks candidate IDs by how many query tokens matched, descending.
    pub async fn search(&self, query: &str) -> MemoryResult<Vec<(String, usize)>> {
        let tokens = tokenize_query(query);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let mut counts: HashMap<String, usize> = HashMap::new();
        for token in &tokens {
            let members = self.kv.smembers(&format!("kw:{token}")).await?;
            for id in members {
                *counts.entry(id).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(ranked)
    }
}
