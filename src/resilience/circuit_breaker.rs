//! Circuit breaker tracking KV-store health, falling back to the remote
//! store directly when the KV tier is flapping.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
    pub success_threshold: u32,
    pub failure_window: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 3,
            failure_window: Duration::from_secs(60),
        }
    }
}

/// Tracks KV-tier health; `remote_failures` is a separate counter the
/// orchestrator uses to decide whether `RemoteStore` itself is degraded,
/// independent of circuit state (the remote store has no fallback).
pub struct CircuitBreaker {
    state: AtomicU8,
    kv_failures: AtomicU32,
    remote_failures: AtomicU32,
    success_count: AtomicU32,
    config: CircuitBreakerConfig,
    last_state_change: Arc<RwLock<Instant>>,
    failure_timestamps: Arc<RwLock<Vec<Instant>>>,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            state: AtomicU8::new(CircuitState::Closed as u8),
            kv_failures: AtomicU32::new(0),
            remote_failures: AtomicU32::new(0),
            success_count: AtomicU32::new(0),
            config,
            last_state_change: Arc::new(RwLock::new(Instant::now())),
            failure_timestamps: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    pub async fn is_kv_circuit_open(&self) -> bool {
        match self.state() {
            CircuitState::Closed => false,
            CircuitState::Open => {
                let last_change = *self.last_state_change.read().await;
                if last_change.elapsed() >= self.config.recovery_timeout {
                    self.transition_to_half_open().await;
                    false
                } else {
                    true
                }
            }
            CircuitState::HalfOpen => false,
        }
    }

    pub async fn record_kv_success(&self) {
        match self.state() {
            CircuitState::Closed => {
                self.kv_failures.store(0, Ordering::Release);
                self.clear_old_failures().await;
            }
            CircuitState::HalfOpen => {
                let success_count = self.success_count.fetch_add(1, Ordering::AcqRel) + 1;
                info!("circuit breaker: kv success in half-open ({success_count}/{})", self.config.success_threshold);
                if success_count >= self.config.success_threshold {
                    self.transition_to_closed().await;
                }
            }
            CircuitState::Open => {
                warn!("received kv success while circuit is open");
            }
        }
    }

    pub async fn record_kv_failure(&self) {
        {
            let mut timestamps = self.failure_timestamps.write().await;
            timestamps.push(Instant::now());
        }
        self.kv_failures.fetch_add(1, Ordering::AcqRel);

        match self.state() {
            CircuitState::Closed => {
                self.clear_old_failures().await;
                let recent = self.count_recent_failures().await;
                warn!("circuit breaker: kv failure recorded ({recent} recent)");
                if recent >= self.config.failure_threshold {
                    self.transition_to_open().await;
                }
            }
            CircuitState::HalfOpen => {
                warn!("circuit breaker: kv failure in half-open, reopening");
                self.transition_to_open().await;
            }
            CircuitState::Open => {
                debug!("additional kv failure while open");
            }
        }
    }

    pub async fn record_remote_success(&self) {
        self.remote_failures.store(0, Ordering::Release);
    }

    pub async fn record_remote_failure(&self) {
        let count = self.remote_failures.fetch_add(1, Ordering::AcqRel) + 1;
        warn!("circuit breaker: remote store failure recorded (total: {count})");
    }

    pub async fn get_stats(&self) -> CircuitBreakerStats {
        CircuitBreakerStats {
            state: self.state(),
            kv_failures: self.kv_failures.load(Ordering::Acquire),
            remote_failures: self.remote_failures.load(Ordering::Acquire),
            recent_failures: self.count_recent_failures().await,
            success_count: self.success_count.load(Ordering::Acquire),
        }
    }

    async fn transition_to_open(&self) {
        let old = CircuitState::from(self.state.swap(CircuitState::Open as u8, Ordering::AcqRel));
        if old != CircuitState::Open {
            *self.last_state_change.write().await = Instant::now();
            self.success_count.store(0, Ordering::Release);
            warn!("circuit breaker: {old:?} -> Open");
        }
    }

    async fn transition_to_half_open(&self) {
        let old = CircuitState::from(self.state.swap(CircuitState::HalfOpen as u8, Ordering::AcqRel));
        if old != CircuitState::HalfOpen {
            *self.last_state_change.write().await = Instant::now();
            self.success_count.store(0, Ordering::Release);
            info!("circuit breaker: {old:?} -> HalfOpen");
        }
    }

    async fn transition_to_closed(&self) {
        let old = CircuitState::from(self.state.swap(CircuitState::Closed as u8, Ordering::AcqRel));
        if old != CircuitState::Closed {
            *self.last_state_change.write().await = Instant::now();
            self.kv_failures.store(0, Ordering::Release);
            self.success_count.store(0, Ordering::Release);
            self.failure_timestamps.write().await.clear();
            info!("circuit breaker: {old:?} -> Closed");
        }
    }

    async fn count_recent_failures(&self) -> u32 {
        let cutoff = Instant::now() - self.config.failure_window;
        self.failure_timestamps.read().await.iter().filter(|&&ts| ts > cutoff).count() as u32
    }

    async fn clear_old_failures(&self) {
        let cutoff = Instant::now() - self.config.failure_window;
        self.failure_timestamps.write().await.retain(|&ts| ts > cutoff);
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub kv_failures: u32,
    pub remote_failures: u32,
    pub recent_failures: u32,
    pub success_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn starts_closed() {
        let cb = CircuitBreaker::new();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(!cb.is_kv_circuit_open().await);
    }

    #[tokio::test]
    async fn opens_after_threshold_failures() {
        let cb = CircuitBreaker::with_config(CircuitBreakerConfig {
            failure_threshold: 3,
            ..Default::default()
        });

        cb.record_kv_failure().await;
        cb.record_kv_failure().await;
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_kv_failure().await;
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.is_kv_circuit_open().await);
    }

    #[tokio::test]
    async fn half_open_after_recovery_timeout() {
        let cb = CircuitBreaker::with_config(CircuitBreakerConfig {
            failure_threshold: 2,
            recovery_timeout: Duration::from_millis(50),
            ..Default::default()
        });

        cb.record_kv_failure().await;
        cb.record_kv_failure().await;
        assert_eq!(cb.state(), CircuitState::Open);

        sleep(Duration::from_millis(80)).await;
        assert!(!cb.is_kv_circuit_open().await);
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[tokio::test]
    async fn closes_after_enough_half_open_successes() {
        let cb = CircuitBreaker::with_config(CircuitBreakerConfig {
            failure_threshold: 2,
            recovery_timeout: Duration::from_millis(30),
            success_threshold: 2,
            ..Default::default()
        });

        cb.record_kv_failure().await;
        cb.record_kv_failure().await;
        sleep(Duration::from_millis(50)).await;
        cb.is_kv_circuit_open().await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_kv_success().await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_kv_success().await;
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn remote_failures_tracked_independently() {
        let cb = CircuitBreaker::new();
        cb.record_remote_failure().await;
        let stats = cb.get_stats().await;
        assert_eq!(stats.remote_failures, 1);
        cb.record_remote_success().await;
        assert_eq!(cb.get_stats().await.remote_failures, 0);
    }
}
