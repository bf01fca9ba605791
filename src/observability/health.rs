use crate::kv::Kv;
use crate::remote::RemoteStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// Tracks component health for `kv` and `remote`. No HTTP routes — there is
/// no HTTP surface in this engine — callers read `ComponentHealth` directly,
/// e.g. from a `cache_stats` tool response or a periodic log line.
#[derive(Clone)]
pub struct HealthService {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
}

/// Health status of individual components
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    pub last_check: chrono::DateTime<chrono::Utc>,
    pub message: Option<String>,
    pub response_time_ms: Option<f64>,
}

/// Overall health status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Snapshot of every tracked component, used for a `sync_status`-adjacent diagnostic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub status: HealthStatus,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthService {
    pub fn new() -> Self {
        Self {
            components: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn update_component_health(
        &self,
        component: &str,
        status: HealthStatus,
        message: Option<String>,
        response_time_ms: Option<f64>,
    ) {
        let health = ComponentHealth {
            status,
            last_check: chrono::Utc::now(),
            message,
            response_time_ms,
        };

        self.components.write().await.insert(component.to_string(), health);
    }

    /// Probes the KV store with a sentinel `get` — cheap and side-effect-free.
    pub async fn check_kv_health(&self, kv: &Arc<dyn Kv>) -> (HealthStatus, Option<String>, Option<f64>) {
        let start = Instant::now();
        match kv.get("health:probe").await {
            Ok(_) => {
                let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
                (HealthStatus::Healthy, None, Some(elapsed_ms))
            }
            Err(e) => (HealthStatus::Unhealthy, Some(format!("KV probe failed: {e}")), None),
        }
    }

    /// Probes the remote store with a zero-item `list` call.
    pub async fn check_remote_health(&self, remote: &Arc<dyn RemoteStore>) -> (HealthStatus, Option<String>, Option<f64>) {
        let start = Instant::now();
        match remote.list("health:probe", 1, 0).await {
            Ok(_) => {
                let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
                (HealthStatus::Healthy, None, Some(elapsed_ms))
            }
            Err(e) => (HealthStatus::Unhealthy, Some(format!("remote store probe failed: {e}")), None),
        }
    }

    /// Checks `kv` and `remote` in parallel and returns the merged snapshot.
    pub async fn check(&self, kv: &Arc<dyn Kv>, remote: &Arc<dyn RemoteStore>) -> HealthSnapshot {
        let (kv_result, remote_result) = tokio::join!(self.check_kv_health(kv), self.check_remote_health(remote));

        self.update_component_health("kv", kv_result.0, kv_result.1, kv_result.2).await;
        self.update_component_health("remote", remote_result.0, remote_result.1, remote_result.2).await;

        let components = self.components.read().await.clone();
        HealthSnapshot {
            status: self.calculate_overall_status(&components),
            timestamp: chrono::Utc::now(),
            components,
        }
    }

    fn calculate_overall_status(&self, components: &HashMap<String, ComponentHealth>) -> HealthStatus {
        let mut has_unhealthy = false;
        let mut has_degraded = false;

        for health in components.values() {
            match health.status {
                HealthStatus::Unhealthy => has_unhealthy = true,
                HealthStatus::Degraded => has_degraded = true,
                HealthStatus::Healthy => {}
            }
        }

        if has_unhealthy {
            HealthStatus::Unhealthy
        } else if has_degraded {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}

impl Default for HealthService {
    fn default() -> Self {
        Self::new()
    }
}
