//! Vector index (C5): an in-process top-k cosine index over memory embeddings.
//! Not persisted; rebuilt by `OptimizeCache`/startup sweeps of the remote store.

use crate::similarity::{cosine, normalize};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct Entry {
    user_id: String,
    vector: Vec<f32>,
}

/// `RwLock`-protected set of memory embeddings supporting top-k cosine search.
/// Records without a vector (embedding failed or pending) simply aren't here;
/// the engine tolerates a vector-less memory rather than treating it as an error.
pub struct VectorIndex {
    entries: RwLock<HashMap<String, Entry>>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn add(&self, id: &str, user_id: &str, mut vector: Vec<f32>) {
        normalize(&mut vector);
        self.entries.write().await.insert(
            id.to_string(),
            Entry {
                user_id: user_id.to_string(),
                vector,
            },
        );
    }

    pub async fn delete(&self, id: &str) {
        self.entries.write().await.remove(id);
    }

    pub async fn search(&self, user_id: &str, query_vector: &[f32], k: usize) -> Vec<(String, f32)> {
        let mut query = query_vector.to_vec();
        normalize(&mut query);

        let entries = self.entries.read().await;
        let mut scored: Vec<(String, f32)> = entries
            .iter()
            .filter(|(_, entry)| entry.user_id == user_id)
            .map(|(id, entry)| (id.clone(), cosine(&query, &entry.vector)))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }

    /// All entries for a user, used by deduplication and optimize-cache sweeps.
    pub async fn all_for_user(&self, user_id: &str) -> Vec<(String, Vec<f32>)> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|(_, entry)| entry.user_id == user_id)
            .map(|(id, entry)| (id.clone(), entry.vector.clone()))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for VectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn search_returns_top_k_by_cosine() {
        let index = VectorIndex::new();
        index.add("a", "u1", vec![1.0, 0.0]).await;
        index.add("b", "u1", vec![0.0, 1.0]).await;
        index.add("c", "u1", vec![0.9, 0.1]).await;

        let results = index.search("u1", &[1.0, 0.0], 2).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "a");
    }

    #[tokio::test]
    async fn search_is_scoped_per_user() {
        let index = VectorIndex::new();
        index.add("a", "u1", vec![1.0, 0.0]).await;
        index.add("b", "u2", vec![1.0, 0.0]).await;

        let results = index.search("u1", &[1.0, 0.0], 10).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "a");
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let index = VectorIndex::new();
        index.add("a", "u1", vec![1.0, 0.0]).await;
        index.delete("a").await;
        assert!(index.is_empty().await);
    }

    #[tokio::test]
    async fn vectors_are_normalized_on_insert() {
        let index = VectorIndex::new();
        index.add("a", "u1", vec![3.0, 4.0]).await;
        let all = index.all_for_user("u1").await;
        let norm: f32 = all[0].1.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
