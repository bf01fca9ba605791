//! Key-value adapter (C1): the engine's only view of its local store.
//!
//! The engine never calls Redis directly outside this module. `RedisKv` backs
//! hybrid/demo deployments; `MemoryKv` is an in-process fake used in local
//! mode and throughout the test suite.

mod memory_kv;
mod redis_kv;

pub use memory_kv::MemoryKv;
pub use redis_kv::RedisKv;

use crate::error::MemoryResult;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

/// Capability contract over the local store. Every method that can fail due
/// to a lost connection returns `MemoryError::CacheUnavailable`; the engine
/// treats that as a signal to degrade rather than fail the caller.
#[async_trait]
pub trait Kv: Send + Sync {
    async fn get(&self, key: &str) -> MemoryResult<Option<String>>;
    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> MemoryResult<()>;
    async fn incr(&self, key: &str) -> MemoryResult<i64>;
    async fn ttl(&self, key: &str) -> MemoryResult<Option<Duration>>;
    async fn expire(&self, key: &str, ttl: Duration) -> MemoryResult<()>;
    async fn del(&self, keys: &[String]) -> MemoryResult<i64>;

    async fn sadd(&self, key: &str, member: &str) -> MemoryResult<()>;
    async fn smembers(&self, key: &str) -> MemoryResult<Vec<String>>;
    async fn srem(&self, key: &str, member: &str) -> MemoryResult<()>;

    /// Returns every stored key matching a `fnmatch`-style glob (`kw:*`, `search:*`, ...).
    /// Implementations may scan incrementally internally; callers see one flat list.
    async fn scan(&self, pattern: &str) -> MemoryResult<Vec<String>>;

    async fn publish(&self, channel: &str, message: String) -> MemoryResult<()>;

    /// Subscribes to a channel, returning a receiver fed by a background task.
    /// Dropping the receiver unsubscribes.
    async fn subscribe(&self, channel: &str) -> MemoryResult<mpsc::Receiver<String>>;
}

/// Minimal `*`-only glob matcher, sufficient for the engine's `prefix:*` key patterns.
pub(crate) fn glob_match(pattern: &str, candidate: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == candidate,
        Some((prefix, suffix)) => {
            candidate.starts_with(prefix) && candidate.ends_with(suffix) && candidate.len() >= prefix.len() + suffix.len()
        }
    }
}
