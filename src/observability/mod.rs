pub mod health;
pub mod logging;
pub mod metrics;
pub mod tracing;

pub use health::{ComponentHealth, HealthService, HealthSnapshot, HealthStatus};
pub use logging::{init_logging, LoggingService};
pub use metrics::{Metrics, MetricsRegistry, Timer};
pub use tracing::{init_tracing, TracingService};

use crate::error::MemoryResult;

/// Comprehensive observability service that combines metrics, tracing, logging, and health
pub struct ObservabilityService {
    pub metrics: MetricsRegistry,
    pub tracing: TracingService,
    pub logging: LoggingService,
    pub health: HealthService,
}

impl ObservabilityService {
    pub async fn new() -> MemoryResult<Self> {
        Ok(Self {
            metrics: MetricsRegistry::new()?,
            tracing: TracingService::new().await?,
            logging: LoggingService::new(),
            health: HealthService::new(),
        })
    }

    /// Initialize global observability (tracing subscriber, etc.)
    pub async fn init_global(&self) -> MemoryResult<()> {
        init_tracing().await?;
        init_logging()?;
        Ok(())
    }

    pub async fn shutdown(&self) -> MemoryResult<()> {
        self.tracing.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn observability_service_initializes_and_shuts_down() {
        let observability = ObservabilityService::new().await.unwrap();
        assert!(observability.init_global().await.is_ok());
        assert!(observability.shutdown().await.is_ok());
    }
}
