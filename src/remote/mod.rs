//! Remote store adapter (C2): the engine's only view of the authoritative
//! backend. Treated as an opaque HTTP-like service — the engine never
//! depends on how it stores or indexes memories internally.

mod http_store;
mod memory_store;

pub use http_store::HttpRemoteStore;
pub use memory_store::MemoryRemoteStore;

use crate::error::MemoryResult;
use crate::types::Memory;
use async_trait::async_trait;
use std::collections::HashMap;

/// One or more memories returned by an `add` call — the backend may split a
/// single message into several records.
pub type AddedMemories = Vec<Memory>;

#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn add(
        &self,
        user_id: &str,
        content: &str,
        metadata: HashMap<String, serde_json::Value>,
    ) -> MemoryResult<AddedMemories>;

    async fn search(&self, user_id: &str, query: &str, limit: usize) -> MemoryResult<Vec<Memory>>;

    async fn list(&self, user_id: &str, limit: usize, offset: usize) -> MemoryResult<Vec<Memory>>;

    async fn get(&self, user_id: &str, id: &str) -> MemoryResult<Memory>;

    async fn delete(&self, user_id: &str, id: &str) -> MemoryResult<()>;
}
