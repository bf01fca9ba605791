use crate::error::{MemoryError, MemoryResult};
use std::env;
use std::time::Duration;

/// Which backends are active. `Local` runs entirely against in-process fakes
/// (`MemoryKv` + `MemoryRemoteStore`); `Hybrid` and `Demo` wire in the real
/// Redis-backed KV and HTTP-backed remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Local,
    Hybrid,
    Demo,
}

impl std::str::FromStr for Mode {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Mode::Local),
            "hybrid" => Ok(Mode::Hybrid),
            "demo" => Ok(Mode::Demo),
            other => Err(MemoryError::Internal(format!("invalid MODE: {other}"))),
        }
    }
}

/// Connection info for the local key-value store
#[derive(Debug, Clone)]
pub struct KvConfig {
    /// Redis-compatible connection URL. `None` selects the in-process `MemoryKv`.
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout_secs: u64,
}

/// Connection info for the authoritative remote memory store
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
}

/// Tunables from spec §6, all overridable via environment variables
#[derive(Debug, Clone)]
pub struct TuningConfig {
    pub l1_ttl: Duration,
    pub l2_ttl: Duration,
    pub search_ttl: Duration,
    pub frequent_access_threshold: u64,
    pub max_cache_size: usize,
    pub batch_size: usize,
    pub sync_interval: Duration,
    pub job_wait_timeout: Duration,
    pub kv_timeout: Duration,
    pub remote_timeout: Duration,
    pub embed_timeout: Duration,
    pub extract_timeout: Duration,
    /// Maximum `content` length in bytes a memory may carry (§3 invariant).
    pub max_content_length: usize,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            l1_ttl: Duration::from_secs(86_400),
            l2_ttl: Duration::from_secs(604_800),
            search_ttl: Duration::from_secs(300),
            frequent_access_threshold: 3,
            max_cache_size: 1000,
            batch_size: 50,
            sync_interval: Duration::from_millis(300_000),
            job_wait_timeout: Duration::from_secs(30),
            kv_timeout: Duration::from_secs(2),
            remote_timeout: Duration::from_secs(10),
            embed_timeout: Duration::from_secs(5),
            extract_timeout: Duration::from_secs(3),
            max_content_length: 65_536,
        }
    }
}

/// Top-level engine configuration, loaded the way the teacher's `Config::from_env` does it
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub kv: KvConfig,
    pub remote: RemoteConfig,
    pub tuning: TuningConfig,
    pub mode: Mode,
    pub default_user_id: String,
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to a `.env` file
    pub fn from_env() -> MemoryResult<Self> {
        if let Err(e) = dotenvy::dotenv() {
            tracing::warn!("could not load .env file: {e}");
        }

        let mode = match env::var("MODE") {
            Ok(v) => v.parse()?,
            Err(_) => Mode::Local,
        };

        let kv = KvConfig {
            url: env::var("KV_URL").ok(),
            max_connections: parse_env_or("KV_MAX_CONNECTIONS", 10)?,
            connection_timeout_secs: parse_env_or("KV_CONNECTION_TIMEOUT_SECS", 5)?,
        };

        let remote = RemoteConfig {
            base_url: env::var("REMOTE_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:4000".to_string()),
            api_key: env::var("REMOTE_API_KEY").ok(),
            request_timeout_secs: parse_env_or("REMOTE_REQUEST_TIMEOUT_SECS", 10)?,
        };

        let mut tuning = TuningConfig::default();
        if let Ok(v) = env::var("L1_TTL") {
            tuning.l1_ttl = Duration::from_secs(parse_u64(&v, "L1_TTL")?);
        }
        if let Ok(v) = env::var("L2_TTL") {
            tuning.l2_ttl = Duration::from_secs(parse_u64(&v, "L2_TTL")?);
        }
        if let Ok(v) = env::var("SEARCH_TTL") {
            tuning.search_ttl = Duration::from_secs(parse_u64(&v, "SEARCH_TTL")?);
        }
        if let Ok(v) = env::var("FREQUENT_ACCESS_THRESHOLD") {
            tuning.frequent_access_threshold = parse_u64(&v, "FREQUENT_ACCESS_THRESHOLD")?;
        }
        if let Ok(v) = env::var("MAX_CACHE_SIZE") {
            tuning.max_cache_size = parse_u64(&v, "MAX_CACHE_SIZE")? as usize;
        }
        if let Ok(v) = env::var("BATCH_SIZE") {
            tuning.batch_size = parse_u64(&v, "BATCH_SIZE")? as usize;
        }
        if let Ok(v) = env::var("SYNC_INTERVAL") {
            tuning.sync_interval = Duration::from_millis(parse_u64(&v, "SYNC_INTERVAL")?);
        }
        if let Ok(v) = env::var("MAX_CONTENT_LENGTH") {
            tuning.max_content_length = parse_u64(&v, "MAX_CONTENT_LENGTH")? as usize;
        }

        let default_user_id =
            env::var("DEFAULT_USER_ID").unwrap_or_else(|_| "default".to_string());

        let config = EngineConfig {
            kv,
            remote,
            tuning,
            mode,
            default_user_id,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> MemoryResult<()> {
        if self.mode != Mode::Local && self.kv.url.is_none() {
            return Err(MemoryError::Internal(
                "KV_URL is required outside local mode".to_string(),
            ));
        }
        if self.tuning.max_cache_size == 0 {
            return Err(MemoryError::Internal(
                "MAX_CACHE_SIZE must be greater than 0".to_string(),
            ));
        }
        if self.tuning.frequent_access_threshold == 0 {
            return Err(MemoryError::Internal(
                "FREQUENT_ACCESS_THRESHOLD must be greater than 0".to_string(),
            ));
        }
        if self.tuning.max_content_length == 0 {
            return Err(MemoryError::Internal(
                "MAX_CONTENT_LENGTH must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kv: KvConfig {
                url: None,
                max_connections: 10,
                connection_timeout_secs: 5,
            },
            remote: RemoteConfig {
                base_url: "http://localhost:4000".to_string(),
                api_key: None,
                request_timeout_secs: 10,
            },
            tuning: TuningConfig::default(),
            mode: Mode::Local,
            default_user_id: "default".to_string(),
        }
    }
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> MemoryResult<T> {
    match env::var(key) {
        Ok(v) => v
            .parse()
            .map_err(|_| MemoryError::Internal(format!("invalid {key}: {v}"))),
        Err(_) => Ok(default),
    }
}

fn parse_u64(value: &str, key: &str) -> MemoryResult<u64> {
    value
        .parse()
        .map_err(|_| MemoryError::Internal(format!("invalid {key}: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_local_and_valid() {
        let config = EngineConfig::default();
        assert_eq!(config.mode, Mode::Local);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn hybrid_mode_requires_kv_url() {
        let mut config = EngineConfig::default();
        config.mode = Mode::Hybrid;
        assert!(config.validate().is_err());

        config.kv.url = Some("redis://localhost:6379".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn tuning_defaults_match_spec() {
        let tuning = TuningConfig::default();
        assert_eq!(tuning.l1_ttl, Duration::from_secs(86_400));
        assert_eq!(tuning.l2_ttl, Duration::from_secs(604_800));
        assert_eq!(tuning.search_ttl, Duration::from_secs(300));
        assert_eq!(tuning.frequent_access_threshold, 3);
        assert_eq!(tuning.max_cache_size, 1000);
        assert_eq!(tuning.batch_size, 50);
        assert_eq!(tuning.max_content_length, 65_536);
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("Hybrid".parse::<Mode>().unwrap(), Mode::Hybrid);
        assert!("bogus".parse::<Mode>().is_err());
    }
}
