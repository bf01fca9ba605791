use memory_cache_engine::enrichment::{HashEmbedder, HeuristicExtractor};
use memory_cache_engine::invalidator::InvalidationWorker;
use memory_cache_engine::kv::{Kv, MemoryKv, RedisKv};
use memory_cache_engine::remote::{HttpRemoteStore, MemoryRemoteStore, RemoteStore};
use memory_cache_engine::{Embedder, Engine, EngineConfig, Extractor, MemoryError, Mode};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};

#[tokio::main]
async fn main() -> Result<(), MemoryError> {
    tracing_subscriber::fmt().with_target(false).json().init();

    tracing::info!("starting memory cache engine");

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("fatal: configuration failed to load: {e}");
            std::process::exit(1);
        }
    };
    tracing::info!(mode = ?config.mode, "configuration loaded");

    let engine = match build_engine(&config).await {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            tracing::error!("fatal: engine initialization failed: {e}");
            std::process::exit(1);
        }
    };

    let enrichment_worker = engine.build_enrichment_worker();
    let enrichment_kv = engine.kv();
    let enrichment_handle = tokio::spawn({
        let worker = enrichment_worker.clone();
        async move {
            if let Err(e) = worker.run(enrichment_kv).await {
                tracing::error!("enrichment worker exited: {e}");
            }
        }
    });

    let sync_handle = tokio::spawn(engine.sync_worker().run());

    let invalidation_worker = Arc::new(InvalidationWorker::new(engine.kv()));
    let invalidation_handle = tokio::spawn({
        let worker = invalidation_worker.clone();
        async move {
            if let Err(e) = worker.run().await {
                tracing::error!("cache invalidation worker exited: {e}");
            }
        }
    });

    tracing::info!("tool server ready, reading requests from stdin");
    let server_engine = engine.clone();
    let server_handle = tokio::spawn(async move { memory_cache_engine::tool_server::run(server_engine).await });

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received, draining enrichment queue");

    sync_handle.abort();
    enrichment_handle.abort();
    invalidation_handle.abort();

    let drained = tokio::time::timeout(Duration::from_secs(5), async {
        while engine.pending_job_count().await > 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .is_ok();
    if !drained {
        tracing::warn!("enrichment queue did not drain within the 5s shutdown window");
    }

    server_handle.abort();
    tracing::info!("shutdown complete");
    Ok(())
}

/// Builds every backend and wires them into an `Engine`, per `config.mode`.
async fn build_engine(config: &EngineConfig) -> Result<Engine, MemoryError> {
    let kv = build_kv(config).await?;
    let remote = build_remote(config)?;
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new());
    let extractor: Arc<dyn Extractor> = Arc::new(HeuristicExtractor::new());

    Engine::new(kv, remote, embedder, extractor, config.tuning.clone(), config.default_user_id.clone()).await
}

async fn build_kv(config: &EngineConfig) -> Result<Arc<dyn Kv>, MemoryError> {
    match config.mode {
        Mode::Local => Ok(Arc::new(MemoryKv::new())),
        Mode::Hybrid | Mode::Demo => Ok(Arc::new(RedisKv::new(&config.kv).await?)),
    }
}

fn build_remote(config: &EngineConfig) -> Result<Arc<dyn RemoteStore>, MemoryError> {
    match config.mode {
        Mode::Local => Ok(Arc::new(MemoryRemoteStore::new())),
        Mode::Hybrid | Mode::Demo => Ok(Arc::new(HttpRemoteStore::new(&config.remote)?)),
    }
}

/// Waits for SIGTERM or SIGINT (ctrl-c). The process is safe to kill at any
/// point before this resolves too: the remote store is authoritative, so a
/// hard kill loses at most an in-flight enrichment pass, not data.
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
