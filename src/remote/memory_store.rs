use super::{AddedMemories, RemoteStore};
use crate::error::{MemoryError, MemoryResult};
use crate::types::Memory;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-process fake for `RemoteStore`, used in local mode and by the test
/// suite in place of a live backend.
#[derive(Default)]
pub struct MemoryRemoteStore {
    memories: RwLock<HashMap<(String, String), Memory>>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn add(
        &self,
        user_id: &str,
        content: &str,
        metadata: HashMap<String, serde_json::Value>,
    ) -> MemoryResult<AddedMemories> {
        let id = Uuid::new_v4().to_string();
        let mut memory = Memory::new(id.clone(), user_id, content);
        memory.metadata.extra = metadata;

        let mut memories = self.memories.write().await;
        memories.insert((user_id.to_string(), id), memory.clone());
        Ok(vec![memory])
    }

    async fn search(&self, user_id: &str, query: &str, limit: usize) -> MemoryResult<Vec<Memory>> {
        let memories = self.memories.read().await;
        let query_lower = query.to_lowercase();
        let mut matches: Vec<Memory> = memories
            .values()
            .filter(|m| m.user_id == user_id && m.content.to_lowercase().contains(&query_lower))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matches.truncate(limit);
        Ok(matches)
    }

    async fn list(&self, user_id: &str, limit: usize, offset: usize) -> MemoryResult<Vec<Memory>> {
        let memories = self.memories.read().await;
        let mut all: Vec<Memory> = memories
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all.into_iter().skip(offset).take(limit).collect())
    }

    async fn get(&self, user_id: &str, id: &str) -> MemoryResult<Memory> {
        let memories = self.memories.read().await;
        memories
            .get(&(user_id.to_string(), id.to_string()))
            .cloned()
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))
    }

    async fn delete(&self, user_id: &str, id: &str) -> MemoryResult<()> {
        let mut memories = self.memories.write().await;
        memories
            .remove(&(user_id.to_string(), id.to_string()))
            .map(|_| ())
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_then_get_round_trips() {
        let store = MemoryRemoteStore::new();
        let added = store.add("u1", "remember the milk", HashMap::new()).await.unwrap();
        assert_eq!(added.len(), 1);
        let fetched = store.get("u1", &added[0].id).await.unwrap();
        assert_eq!(fetched.content, "remember the milk");
    }

    #[tokio::test]
    async fn search_matches_substring_case_insensitively() {
        let store = MemoryRemoteStore::new();
        store.add("u1", "Rust is a systems language", HashMap::new()).await.unwrap();
        store.add("u1", "Bananas are yellow", HashMap::new()).await.unwrap();

        let results = store.search("u1", "rust", 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].content.contains("Rust"));
    }

    #[tokio::test]
    async fn delete_removes_memory_and_errors_on_second_delete() {
        let store = MemoryRemoteStore::new();
        let added = store.add("u1", "temp", HashMap::new()).await.unwrap();
        store.delete("u1", &added[0].id).await.unwrap();
        assert!(store.get("u1", &added[0].id).await.is_err());
        assert!(store.delete("u1", &added[0].id).await.is_err());
    }

    #[tokio::test]
    async fn list_is_scoped_per_user_and_paginated() {
        let store = MemoryRemoteStore::new();
        for i in 0..5 {
            store.add("u1", &format!("memory {i}"), HashMap::new()).await.unwrap();
        }
        store.add("u2", "other user's memory", HashMap::new()).await.unwrap();

        let page = store.list("u1", 2, 0).await.unwrap();
        assert_eq!(page.len(), 2);

        let all = store.list("u1", 100, 0).await.unwrap();
        assert_eq!(all.len(), 5);
    }
}
