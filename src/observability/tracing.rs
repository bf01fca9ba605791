use crate::error::{MemoryError, MemoryResult};
use std::env;
use tracing::subscriber::set_global_default;
use tracing_subscriber::{
    fmt::{self, format::JsonFields},
    layer::SubscriberExt,
    EnvFilter, Registry,
};

/// Tracing service for structured logging and distributed tracing
pub struct TracingService {
    service_name: String,
}

impl TracingService {
    pub async fn new() -> MemoryResult<Self> {
        let service_name = env::var("SERVICE_NAME").unwrap_or_else(|_| "memory-cache-engine".to_string());
        Ok(Self { service_name })
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub async fn shutdown(&self) -> MemoryResult<()> {
        Ok(())
    }
}

/// Initialize global tracing subscriber with JSON formatting
pub async fn init_tracing() -> MemoryResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,memory_cache_engine=debug"));

    let formatting_layer = fmt::layer()
        .json()
        .with_current_span(false)
        .with_span_list(true)
        .fmt_fields(JsonFields::new());

    let subscriber = Registry::default().with(env_filter).with(formatting_layer);

    set_global_default(subscriber).map_err(|e| MemoryError::Internal(format!("failed to set global subscriber: {e}")))?;

    Ok(())
}

/// Macro for creating spans with automatic trace_id injection
#[macro_export]
macro_rules! trace_span {
    ($level:expr, $name:expr) => {
        tracing::span!($level, $name, trace_id = %uuid::Uuid::new_v4())
    };
    ($level:expr, $name:expr, $($field:tt)*) => {
        tracing::span!($level, $name, trace_id = %uuid::Uuid::new_v4(), $($field)*)
    };
}

/// Macro for creating info spans with trace_id
#[macro_export]
macro_rules! info_span {
    ($name:expr) => {
        $crate::trace_span!(tracing::Level::INFO, $name)
    };
    ($name:expr, $($field:tt)*) => {
        $crate::trace_span!(tracing::Level::INFO, $name, $($field)*)
    };
}

/// Macro for creating debug spans with trace_id
#[macro_export]
macro_rules! debug_span {
    ($name:expr) => {
        $crate::trace_span!(tracing::Level::DEBUG, $name)
    };
    ($name:expr, $($field:tt)*) => {
        $crate::trace_span!(tracing::Level::DEBUG, $name, $($field)*)
    };
}
