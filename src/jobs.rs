//! Async job queue (C8): correlates fire-and-forget enrichment work with a
//! caller waiting on `job:complete`. Purely in-process — no persistence, no
//! cross-instance visibility, matching the single-process scope of this engine.

use crate::error::{MemoryError, MemoryResult};
use crate::invalidator::{CHANNEL_JOB_COMPLETE, Invalidator, JobCompleteMessage};
use crate::kv::Kv;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tracing::warn;

pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(30);

fn new_job_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Tracks outstanding jobs and resolves them as `job:complete` messages arrive.
/// A single background task drains the subscription; `wait` parks on a
/// per-job oneshot channel until that task wakes it or the timeout elapses.
pub struct JobQueue {
    pending: Arc<Mutex<HashMap<String, oneshot::Sender<Result<(), String>>>>>,
    invalidator: Invalidator,
    default_timeout: Duration,
}

impl JobQueue {
    /// Spawns the listener task against `kv`'s `job:complete` channel. The
    /// returned `JobQueue` is cheap to clone via `Arc` at the call site.
    pub async fn spawn(kv: Arc<dyn Kv>, default_timeout: Duration) -> MemoryResult<Self> {
        let pending: Arc<Mutex<HashMap<String, oneshot::Sender<Result<(), String>>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let mut rx = kv.subscribe(CHANNEL_JOB_COMPLETE).await?;

        let pending_for_task = pending.clone();
        tokio::spawn(async move {
            while let Some(raw) = rx.recv().await {
                let message: JobCompleteMessage = match serde_json::from_str(&raw) {
                    Ok(m) => m,
                    Err(e) => {
                        warn!("dropping malformed job:complete payload: {e}");
                        continue;
                    }
                };
                let mut guard = pending_for_task.lock().await;
                if let Some(sender) = guard.remove(&message.job_id) {
                    let result = if message.ok { Ok(()) } else { Err(message.error.unwrap_or_default()) };
                    let _ = sender.send(result);
                }
            }
        });

        Ok(Self {
            pending,
            invalidator: Invalidator::new(kv),
            default_timeout,
        })
    }

    /// Registers a new, randomly generated correlation id the caller can later `wait` on.
    pub async fn new_job(&self) -> (String, oneshot::Receiver<Result<(), String>>) {
        let job_id = new_job_id();
        let rx = self.register_with_id(job_id.clone()).await;
        (job_id, rx)
    }

    /// Registers a caller-supplied id (the memory id, for `Add`'s async path, since
    /// `EnrichmentWorker` publishes `job:complete` keyed by memory id rather than by a
    /// separately allocated job id).
    pub async fn register_with_id(&self, job_id: impl Into<String>) -> oneshot::Receiver<Result<(), String>> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(job_id.into(), tx);
        rx
    }

    /// Blocks until `job_id` completes or `timeout` (default 30s) elapses.
    pub async fn wait(
        &self,
        job_id: &str,
        receiver: oneshot::Receiver<Result<(), String>>,
        timeout: Option<Duration>,
    ) -> MemoryResult<()> {
        let timeout = timeout.unwrap_or(self.default_timeout);
        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(message))) => Err(MemoryError::Internal(message)),
            Ok(Err(_)) => Err(MemoryError::Internal(format!("job {job_id} sender dropped"))),
            Err(_) => {
                self.pending.lock().await.remove(job_id);
                Err(MemoryError::Timeout(format!("job {job_id} did not complete in time")))
            }
        }
    }

    /// Reports completion of `job_id`, waking any waiter via `job:complete`.
    pub async fn complete(&self, job_id: &str, result: Result<(), String>) -> MemoryResult<()> {
        self.invalidator.publish_job_complete(job_id, result).await
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}
