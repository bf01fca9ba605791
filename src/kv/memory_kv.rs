use super::{glob_match, Kv};
use crate::error::MemoryResult;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc, Mutex};

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

/// In-process `Kv` implementation backed by a single mutex-guarded map.
/// Used for embedded (local) mode and throughout the unit test suite in
/// place of a real Redis connection.
pub struct MemoryKv {
    strings: Mutex<HashMap<String, Entry>>,
    sets: Mutex<HashMap<String, HashSet<String>>>,
    channels: Mutex<HashMap<String, broadcast::Sender<String>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self {
            strings: Mutex::new(HashMap::new()),
            sets: Mutex::new(HashMap::new()),
            channels: Mutex::new(HashMap::new()),
        }
    }

    fn is_live(entry: &Entry) -> bool {
        entry.expires_at.map(|at| at > Instant::now()).unwrap_or(true)
    }
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Kv for MemoryKv {
    async fn get(&self, key: &str) -> MemoryResult<Option<String>> {
        let mut strings = self.strings.lock().await;
        match strings.get(key) {
            Some(entry) if Self::is_live(entry) => Ok(Some(entry.value.clone())),
            Some(_) => {
                strings.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> MemoryResult<()> {
        let mut strings = self.strings.lock().await;
        strings.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn incr(&self, key: &str) -> MemoryResult<i64> {
        let mut strings = self.strings.lock().await;
        let current = match strings.get(key) {
            Some(entry) if Self::is_live(entry) => entry.value.parse::<i64>().unwrap_or(0),
            _ => 0,
        };
        let next = current + 1;
        strings.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at: None,
            },
        );
        Ok(next)
    }

    async fn ttl(&self, key: &str) -> MemoryResult<Option<Duration>> {
        let strings = self.strings.lock().await;
        Ok(strings.get(key).and_then(|entry| {
            entry
                .expires_at
                .map(|at| at.saturating_duration_since(Instant::now()))
        }))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> MemoryResult<()> {
        let mut strings = self.strings.lock().await;
        if let Some(entry) = strings.get_mut(key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> MemoryResult<i64> {
        let mut strings = self.strings.lock().await;
        let mut sets = self.sets.lock().await;
        let mut deleted = 0i64;
        for key in keys {
            if strings.remove(key).is_some() {
                deleted += 1;
            }
            if sets.remove(key).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn sadd(&self, key: &str, member: &str) -> MemoryResult<()> {
        let mut sets = self.sets.lock().await;
        sets.entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn smembers(&self, key: &str) -> MemoryResult<Vec<String>> {
        let sets = self.sets.lock().await;
        Ok(sets
            .get(key)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn srem(&self, key: &str, member: &str) -> MemoryResult<()> {
        let mut sets = self.sets.lock().await;
        if let Some(members) = sets.get_mut(key) {
            members.remove(member);
        }
        Ok(())
    }

    async fn scan(&self, pattern: &str) -> MemoryResult<Vec<String>> {
        let strings = self.strings.lock().await;
        let sets = self.sets.lock().await;
        let mut matches: Vec<String> = strings
            .iter()
            .filter(|(_, entry)| Self::is_live(entry))
            .map(|(k, _)| k.clone())
            .chain(sets.keys().cloned())
            .filter(|key| glob_match(pattern, key))
            .collect();
        matches.sort();
        matches.dedup();
        Ok(matches)
    }

    async fn publish(&self, channel: &str, message: String) -> MemoryResult<()> {
        let channels = self.channels.lock().await;
        if let Some(sender) = channels.get(channel) {
            // No subscribers is not an error; pub/sub is fire-and-forget.
            let _ = sender.send(message);
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> MemoryResult<mpsc::Receiver<String>> {
        let mut channels = self.channels.lock().await;
        let sender = channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(256).0)
            .clone();
        drop(channels);

        let mut broadcast_rx = sender.subscribe();
        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(async move {
            while let Ok(message) = broadcast_rx.recv().await {
                if tx.send(message).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_and_get_round_trips() {
        let kv = MemoryKv::new();
        kv.set_ex("k", "v".to_string(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(kv.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn expired_entries_are_invisible() {
        let kv = MemoryKv::new();
        kv.set_ex("k", "v".to_string(), Duration::from_millis(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(kv.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn incr_starts_at_one() {
        let kv = MemoryKv::new();
        assert_eq!(kv.incr("counter").await.unwrap(), 1);
        assert_eq!(kv.incr("counter").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn set_members_add_and_remove() {
        let kv = MemoryKv::new();
        kv.sadd("kw:rust", "mem1").await.unwrap();
        kv.sadd("kw:rust", "mem2").await.unwrap();
        let mut members = kv.smembers("kw:rust").await.unwrap();
        members.sort();
        assert_eq!(members, vec!["mem1".to_string(), "mem2".to_string()]);

        kv.srem("kw:rust", "mem1").await.unwrap();
        assert_eq!(kv.smembers("kw:rust").await.unwrap(), vec!["mem2".to_string()]);
    }

    #[tokio::test]
    async fn scan_matches_prefix_glob() {
        let kv = MemoryKv::new();
        kv.set_ex("memory:u1:a", "1".to_string(), Duration::from_secs(60)).await.unwrap();
        kv.set_ex("memory:u1:b", "1".to_string(), Duration::from_secs(60)).await.unwrap();
        kv.set_ex("other:key", "1".to_string(), Duration::from_secs(60)).await.unwrap();

        let mut keys = kv.scan("memory:u1:*").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["memory:u1:a".to_string(), "memory:u1:b".to_string()]);
    }

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let kv = MemoryKv::new();
        let mut rx = kv.subscribe("cache:invalidate").await.unwrap();
        kv.publish("cache:invalidate", "hello".to_string()).await.unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received, "hello");
    }

    #[tokio::test]
    async fn del_reports_count_across_strings_and_sets() {
        let kv = MemoryKv::new();
        kv.set_ex("a", "1".to_string(), Duration::from_secs(60)).await.unwrap();
        kv.sadd("b", "x").await.unwrap();
        let deleted = kv.del(&["a".to_string(), "b".to_string(), "missing".to_string()]).await.unwrap();
        assert_eq!(deleted, 2);
    }
}
