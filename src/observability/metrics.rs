use crate::error::{MemoryError, MemoryResult};
use prometheus::{Counter, Encoder, Gauge, Histogram, HistogramOpts, Registry, TextEncoder};
use std::sync::Arc;
use std::time::Instant;

/// Prometheus metrics registry and collectors
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Arc<Registry>,
    pub metrics: Arc<Metrics>,
}

/// All application metrics
pub struct Metrics {
    // Add/search metrics
    pub add_total: Counter,
    pub add_duration_seconds: Histogram,
    pub search_total: Counter,
    pub search_duration_seconds: Histogram,
    pub search_degraded_total: Counter,

    // Cache tier metrics
    pub cache_hits_total: Counter,
    pub cache_misses_total: Counter,
    pub cache_promotions_total: Counter,

    // Remote store metrics
    pub remote_errors_total: Counter,
    pub remote_call_duration_seconds: Histogram,

    // Enrichment pipeline metrics
    pub enrichment_queue_depth: Gauge,
    pub enrichment_duration_seconds: Histogram,
    pub enrichment_errors_total: Counter,

    // Circuit breaker metrics
    pub kv_circuit_breaker_state: Gauge,
    pub remote_circuit_breaker_state: Gauge,
    pub circuit_breaker_failures_total: Counter,

    // Health metrics
    pub health_check_duration_seconds: Histogram,
    pub component_health_status: Gauge,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all collectors
    pub fn new() -> MemoryResult<Self> {
        let registry = Arc::new(Registry::new());
        let metrics = Arc::new(Metrics::new(&registry)?);

        Ok(Self { registry, metrics })
    }

    /// Get metrics in Prometheus text format. There is no `/metrics` HTTP
    /// route to serve this from — the engine has no HTTP surface — but
    /// `cache_stats`/`sync_status` responses and an operator scrape script
    /// can both call this directly.
    pub fn gather(&self) -> MemoryResult<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| MemoryError::Internal(format!("failed to encode metrics: {e}")))?;

        String::from_utf8(buffer)
            .map_err(|e| MemoryError::Internal(format!("failed to convert metrics to string: {e}")))
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }
}

macro_rules! register_metric {
    ($registry:expr, $ctor:expr, $name:literal) => {{
        let metric = $ctor.map_err(|e| MemoryError::Internal(format!("failed to create {}: {e}", $name)))?;
        $registry
            .register(Box::new(metric.clone()))
            .map_err(|e| MemoryError::Internal(format!("failed to register {}: {e}", $name)))?;
        metric
    }};
}

impl Metrics {
    fn new(registry: &Registry) -> MemoryResult<Self> {
        let add_total = register_metric!(
            registry,
            Counter::new("add_total", "Total number of add_memory calls"),
            "add_total"
        );
        let add_duration_seconds = register_metric!(
            registry,
            Histogram::with_opts(
                HistogramOpts::new("add_duration_seconds", "Duration of add_memory calls in seconds")
                    .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5])
            ),
            "add_duration_seconds"
        );
        let search_total = register_metric!(
            registry,
            Counter::new("search_total", "Total number of search_memory calls"),
            "search_total"
        );
        let search_duration_seconds = register_metric!(
            registry,
            Histogram::with_opts(
                HistogramOpts::new("search_duration_seconds", "Duration of search_memory calls in seconds")
                    .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5])
            ),
            "search_duration_seconds"
        );
        let search_degraded_total = register_metric!(
            registry,
            Counter::new("search_degraded_total", "Total number of searches that degraded after a remote store failure"),
            "search_degraded_total"
        );

        let cache_hits_total = register_metric!(
            registry,
            Counter::new("cache_hits_total", "Total number of cache hits"),
            "cache_hits_total"
        );
        let cache_misses_total = register_metric!(
            registry,
            Counter::new("cache_misses_total", "Total number of cache misses"),
            "cache_misses_total"
        );
        let cache_promotions_total = register_metric!(
            registry,
            Counter::new("cache_promotions_total", "Total number of warm-to-hot tier promotions"),
            "cache_promotions_total"
        );

        let remote_errors_total = register_metric!(
            registry,
            Counter::new("remote_errors_total", "Total number of remote store errors"),
            "remote_errors_total"
        );
        let remote_call_duration_seconds = register_metric!(
            registry,
            Histogram::with_opts(
                HistogramOpts::new("remote_call_duration_seconds", "Duration of remote store calls in seconds")
                    .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0])
            ),
            "remote_call_duration_seconds"
        );

        let enrichment_queue_depth = register_metric!(
            registry,
            Gauge::new("enrichment_queue_depth", "Number of memories awaiting enrichment"),
            "enrichment_queue_depth"
        );
        let enrichment_duration_seconds = register_metric!(
            registry,
            Histogram::with_opts(
                HistogramOpts::new("enrichment_duration_seconds", "Duration of one enrichment pass in seconds")
                    .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0])
            ),
            "enrichment_duration_seconds"
        );
        let enrichment_errors_total = register_metric!(
            registry,
            Counter::new("enrichment_errors_total", "Total number of enrichment failures"),
            "enrichment_errors_total"
        );

        let kv_circuit_breaker_state = register_metric!(
            registry,
            Gauge::new("kv_circuit_breaker_state", "KV circuit breaker state (0=closed, 1=open, 2=half-open)"),
            "kv_circuit_breaker_state"
        );
        let remote_circuit_breaker_state = register_metric!(
            registry,
            Gauge::new("remote_circuit_breaker_state", "RemoteStore circuit breaker state (0=closed, 1=open, 2=half-open)"),
            "remote_circuit_breaker_state"
        );
        let circuit_breaker_failures_total = register_metric!(
            registry,
            Counter::new("circuit_breaker_failures_total", "Total number of circuit breaker-tracked failures"),
            "circuit_breaker_failures_total"
        );

        let health_check_duration_seconds = register_metric!(
            registry,
            Histogram::with_opts(
                HistogramOpts::new("health_check_duration_seconds", "Duration of health checks in seconds")
                    .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5])
            ),
            "health_check_duration_seconds"
        );
        let component_health_status = register_metric!(
            registry,
            Gauge::new("component_health_status", "Health status of components (1=healthy, 0=unhealthy)"),
            "component_health_status"
        );

        Ok(Self {
            add_total,
            add_duration_seconds,
            search_total,
            search_duration_seconds,
            search_degraded_total,
            cache_hits_total,
            cache_misses_total,
            cache_promotions_total,
            remote_errors_total,
            remote_call_duration_seconds,
            enrichment_queue_depth,
            enrichment_duration_seconds,
            enrichment_errors_total,
            kv_circuit_breaker_state,
            remote_circuit_breaker_state,
            circuit_breaker_failures_total,
            health_check_duration_seconds,
            component_health_status,
        })
    }
}

/// Timer helper for measuring durations
pub struct Timer {
    start: Instant,
    histogram: Histogram,
}

impl Timer {
    pub fn new(histogram: Histogram) -> Self {
        Self { start: Instant::now(), histogram }
    }

    pub fn observe(self) {
        let duration = self.start.elapsed();
        self.histogram.observe(duration.as_secs_f64());
    }
}

/// Macro for timing operations
#[macro_export]
macro_rules! time_operation {
    ($histogram:expr, $operation:expr) => {{
        let timer = $crate::observability::metrics::Timer::new($histogram.clone());
        let result = $operation;
        timer.observe();
        result
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_registry_creation_succeeds() {
        let registry = MetricsRegistry::new().unwrap();
        assert!(registry.gather().is_ok());
    }

    #[test]
    fn metrics_collection_appears_in_gather_output() {
        let registry = MetricsRegistry::new().unwrap();

        registry.metrics.add_total.inc();
        registry.metrics.cache_hits_total.inc();
        registry.metrics.enrichment_queue_depth.set(5.0);
        registry.metrics.search_duration_seconds.observe(0.05);

        let output = registry.gather().unwrap();
        assert!(output.contains("add_total"));
        assert!(output.contains("cache_hits_total"));
        assert!(output.contains("enrichment_queue_depth"));
        assert!(output.contains("search_duration_seconds"));
    }

    #[test]
    fn timer_records_a_histogram_observation() {
        let registry = MetricsRegistry::new().unwrap();
        let timer = Timer::new(registry.metrics.search_duration_seconds.clone());

        std::thread::sleep(std::time::Duration::from_millis(1));
        timer.observe();

        let output = registry.gather().unwrap();
        assert!(output.contains("search_duration_seconds"));
    }
}
