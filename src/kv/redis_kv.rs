use super::Kv;
use crate::config::KvConfig;
use crate::error::{MemoryError, MemoryResult};
use async_trait::async_trait;
use fred::{
    clients::RedisPool,
    interfaces::{ClientLike, KeysInterface, PubsubInterface, SetsInterface},
    types::{Builder, Expiration, RedisConfig as FredRedisConfig, RedisValue, ScanType},
};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Redis-backed `Kv` implementation used in hybrid/demo mode. Connection
/// pooling and timeout handling follow the same `fred::Builder` pattern the
/// teacher uses for its cache client.
pub struct RedisKv {
    client: RedisPool,
}

impl RedisKv {
    pub async fn new(config: &KvConfig) -> MemoryResult<Self> {
        let url = config
            .url
            .as_ref()
            .ok_or_else(|| MemoryError::Internal("KV_URL not configured".to_string()))?;

        info!("connecting to redis at {url}");

        let redis_config = FredRedisConfig::from_url(url)
            .map_err(|e| MemoryError::CacheUnavailable(format!("invalid KV_URL: {e}")))?;

        let timeout_secs = config.connection_timeout_secs;
        let client = Builder::from_config(redis_config)
            .with_connection_config(|conn| {
                conn.connection_timeout = Duration::from_secs(timeout_secs);
            })
            .with_performance_config(|perf| {
                perf.auto_pipeline = true;
                perf.default_command_timeout = Duration::from_secs(timeout_secs);
            })
            .build_pool(config.max_connections as usize)
            .map_err(|e| MemoryError::CacheUnavailable(format!("failed to build redis pool: {e}")))?;

        client
            .connect()
            .await
            .map_err(|e| MemoryError::CacheUnavailable(format!("failed to connect to redis: {e}")))?;
        client
            .wait_for_connect()
            .await
            .map_err(|e| MemoryError::CacheUnavailable(format!("redis connection timeout: {e}")))?;

        info!("redis connection established");
        Ok(Self { client })
    }
}

#[async_trait]
impl Kv for RedisKv {
    async fn get(&self, key: &str) -> MemoryResult<Option<String>> {
        self.client
            .get(key)
            .await
            .map_err(|e| MemoryError::CacheUnavailable(format!("GET {key} failed: {e}")))
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> MemoryResult<()> {
        let _: () = self
            .client
            .set(key, value, Some(Expiration::EX(ttl.as_secs() as i64)), None, false)
            .await
            .map_err(|e| MemoryError::CacheUnavailable(format!("SET {key} failed: {e}")))?;
        Ok(())
    }

    async fn incr(&self, key: &str) -> MemoryResult<i64> {
        self.client
            .incr(key)
            .await
            .map_err(|e| MemoryError::CacheUnavailable(format!("INCR {key} failed: {e}")))
    }

    async fn ttl(&self, key: &str) -> MemoryResult<Option<Duration>> {
        let seconds: i64 = self
            .client
            .ttl(key)
            .await
            .map_err(|e| MemoryError::CacheUnavailable(format!("TTL {key} failed: {e}")))?;
        Ok((seconds > 0).then(|| Duration::from_secs(seconds as u64)))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> MemoryResult<()> {
        let _: () = self
            .client
            .expire(key, ttl.as_secs() as i64)
            .await
            .map_err(|e| MemoryError::CacheUnavailable(format!("EXPIRE {key} failed: {e}")))?;
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> MemoryResult<i64> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.client
            .unlink(keys.to_vec())
            .await
            .map_err(|e| MemoryError::CacheUnavailable(format!("UNLINK failed: {e}")))
    }

    async fn sadd(&self, key: &str, member: &str) -> MemoryResult<()> {
        let _: () = self
            .client
            .sadd(key, member)
            .await
            .map_err(|e| MemoryError::CacheUnavailable(format!("SADD {key} failed: {e}")))?;
        Ok(())
    }

    async fn smembers(&self, key: &str) -> MemoryResult<Vec<String>> {
        self.client
            .smembers(key)
            .await
            .map_err(|e| MemoryError::CacheUnavailable(format!("SMEMBERS {key} failed: {e}")))
    }

    async fn srem(&self, key: &str, member: &str) -> MemoryResult<()> {
        let _: () = self
            .client
            .srem(key, member)
            .await
            .map_err(|e| MemoryError::CacheUnavailable(format!("SREM {key} failed: {e}")))?;
        Ok(())
    }

    async fn scan(&self, pattern: &str) -> MemoryResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut stream = self.client.next().scan(pattern, Some(200), Some(ScanType::All));
        while let Some(page) = stream.next().await {
            let page = page.map_err(|e| MemoryError::CacheUnavailable(format!("SCAN failed: {e}")))?;
            if let Some(page_keys) = page.results() {
                for key in page_keys {
                    if let RedisValue::String(s) = key {
                        keys.push(s.to_string());
                    }
                }
            }
        }
        Ok(keys)
    }

    async fn publish(&self, channel: &str, message: String) -> MemoryResult<()> {
        let _: () = self
            .client
            .publish(channel, message)
            .await
            .map_err(|e| MemoryError::CacheUnavailable(format!("PUBLISH {channel} failed: {e}")))?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> MemoryResult<mpsc::Receiver<String>> {
        let subscriber = self.client.next().clone();
        subscriber
            .subscribe(channel)
            .await
            .map_err(|e| MemoryError::CacheUnavailable(format!("SUBSCRIBE {channel} failed: {e}")))?;

        let mut message_stream = subscriber.message_rx();
        let (tx, rx) = mpsc::channel(256);
        let channel_owned = channel.to_string();
        tokio::spawn(async move {
            while let Ok(message) = message_stream.recv().await {
                if message.channel.to_string() != channel_owned {
                    continue;
                }
                if let RedisValue::String(payload) = message.value {
                    if tx.send(payload.to_string()).await.is_err() {
                        break;
                    }
                } else {
                    debug!("dropping non-string pub/sub payload on {channel_owned}");
                }
            }
        });
        Ok(rx)
    }
}

impl RedisKv {
    /// Lightweight connectivity check, mirroring the teacher's `health_check`.
    pub async fn health_check(&self) -> MemoryResult<()> {
        match tokio::time::timeout(Duration::from_secs(5), self.client.ping::<String>()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => {
                warn!("redis health check failed: {e}");
                Err(MemoryError::CacheUnavailable(format!("health check failed: {e}")))
            }
            Err(_) => Err(MemoryError::CacheUnavailable("health check timed out".to_string())),
        }
    }
}
