use crate::error::{MemoryError, MemoryResult};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::env;
use tracing::{event, Level};
use uuid::Uuid;

/// Structured JSON logging service with trace_id injection
#[derive(Clone)]
pub struct LoggingService {
    service_name: String,
    service_version: String,
    environment: String,
}

impl LoggingService {
    pub fn new() -> Self {
        Self {
            service_name: env::var("SERVICE_NAME").unwrap_or_else(|_| "memory-cache-engine".to_string()),
            service_version: env::var("SERVICE_VERSION").unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        }
    }

    /// Log a structured message with trace_id
    pub fn log_structured(&self, level: Level, message: &str, fields: Option<HashMap<String, Value>>) {
        let trace_id = Uuid::new_v4();

        let mut log_entry = json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "level": level.to_string().to_uppercase(),
            "message": message,
            "trace_id": trace_id.to_string(),
            "service": {
                "name": self.service_name,
                "version": self.service_version,
                "environment": self.environment
            }
        });

        if let Some(fields) = fields {
            if let Value::Object(ref mut map) = log_entry {
                for (key, value) in fields {
                    map.insert(key, value);
                }
            }
        }

        match level {
            Level::ERROR => event!(Level::ERROR, %trace_id, "{}", log_entry),
            Level::WARN => event!(Level::WARN, %trace_id, "{}", log_entry),
            Level::INFO => event!(Level::INFO, %trace_id, "{}", log_entry),
            Level::DEBUG => event!(Level::DEBUG, %trace_id, "{}", log_entry),
            Level::TRACE => event!(Level::TRACE, %trace_id, "{}", log_entry),
        }
    }

    /// Log a `search_memory` request with a sanitized query
    pub fn log_search_request(&self, query: &str, limit: usize, user_id: Option<&str>, _trace_id: Uuid) {
        let sanitized_query = self.sanitize_query(query);
        let fields = HashMap::from([
            ("query_length".to_string(), json!(query.len())),
            ("limit".to_string(), json!(limit)),
            ("user_id".to_string(), json!(user_id.unwrap_or("default"))),
            ("sanitized_query".to_string(), json!(sanitized_query)),
        ]);

        self.log_structured(Level::INFO, "search_memory request received", Some(fields));
    }

    /// Log a `search_memory` response with performance and source metrics
    pub fn log_search_response(
        &self,
        _trace_id: Uuid,
        duration_ms: f64,
        result_count: usize,
        cache_hit: bool,
        degraded: bool,
    ) {
        let fields = HashMap::from([
            ("duration_ms".to_string(), json!(duration_ms)),
            ("result_count".to_string(), json!(result_count)),
            ("cache_hit".to_string(), json!(cache_hit)),
            ("degraded".to_string(), json!(degraded)),
        ]);

        self.log_structured(Level::INFO, "search_memory request completed", Some(fields));
    }

    /// Log an error with context
    pub fn log_error(&self, error: &MemoryError, context: Option<HashMap<String, Value>>) {
        let mut fields = HashMap::from([
            ("error_type".to_string(), json!(error.kind())),
            ("error_message".to_string(), json!(error.to_string())),
        ]);

        if let Some(context) = context {
            fields.extend(context);
        }

        self.log_structured(Level::ERROR, "error occurred", Some(fields));
    }

    /// Log a cache tier operation
    pub fn log_cache_operation(&self, operation: &str, tier: &str, key: &str, hit: bool, duration_ms: Option<f64>) {
        let sanitized_key = self.sanitize_cache_key(key);
        let mut fields = HashMap::from([
            ("operation".to_string(), json!(operation)),
            ("tier".to_string(), json!(tier)),
            ("sanitized_key".to_string(), json!(sanitized_key)),
            ("hit".to_string(), json!(hit)),
        ]);

        if let Some(duration) = duration_ms {
            fields.insert("duration_ms".to_string(), json!(duration));
        }

        self.log_structured(Level::DEBUG, "cache operation", Some(fields));
    }

    /// Log one enrichment pass (embed + extract + cache + index)
    pub fn log_enrichment(&self, memory_id: &str, duration_ms: f64, success: bool) {
        let fields = HashMap::from([
            ("memory_id".to_string(), json!(memory_id)),
            ("duration_ms".to_string(), json!(duration_ms)),
            ("success".to_string(), json!(success)),
        ]);

        let level = if success { Level::DEBUG } else { Level::WARN };
        let message = if success { "enrichment completed" } else { "enrichment failed" };
        self.log_structured(level, message, Some(fields));
    }

    /// Log a circuit breaker state change
    pub fn log_circuit_breaker_state(&self, component: &str, old_state: &str, new_state: &str) {
        let fields = HashMap::from([
            ("component".to_string(), json!(component)),
            ("old_state".to_string(), json!(old_state)),
            ("new_state".to_string(), json!(new_state)),
        ]);

        self.log_structured(Level::WARN, "circuit breaker state changed", Some(fields));
    }

    /// Sanitize query for logging (remove PII, truncate)
    fn sanitize_query(&self, query: &str) -> String {
        let mut sanitized = query.to_string();

        sanitized = regex::Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Z|a-z]{2,}\b")
            .unwrap_or_else(|_| regex::Regex::new(r"").unwrap())
            .replace_all(&sanitized, "[EMAIL]")
            .to_string();

        sanitized = regex::Regex::new(r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b")
            .unwrap_or_else(|_| regex::Regex::new(r"").unwrap())
            .replace_all(&sanitized, "[PHONE]")
            .to_string();

        if sanitized.len() > 200 {
            sanitized.truncate(197);
            sanitized.push_str("...");
        }

        sanitized
    }

    /// Sanitize a KV key for logging — shows the pattern, not the full key
    fn sanitize_cache_key(&self, key: &str) -> String {
        if key.len() > 50 {
            format!("{}...{}", &key[..20], &key[key.len() - 10..])
        } else {
            key.to_string()
        }
    }
}

impl Default for LoggingService {
    fn default() -> Self {
        Self::new()
    }
}

/// Initialize global logging configuration. Logging itself is wired through
/// the `tracing` subscriber in `tracing.rs`; this exists for parity with
/// `init_tracing` and future logging-specific setup.
pub fn init_logging() -> MemoryResult<()> {
    Ok(())
}

/// Macro for structured info logging with trace_id
#[macro_export]
macro_rules! log_info {
    ($logger:expr, $message:expr) => {
        $logger.log_structured(tracing::Level::INFO, $message, None)
    };
    ($logger:expr, $message:expr, $($field:tt)*) => {
        {
            let mut fields = std::collections::HashMap::new();
            $(
                fields.insert(stringify!($field).to_string(), serde_json::json!($field));
            )*
            $logger.log_structured(tracing::Level::INFO, $message, Some(fields))
        }
    };
}

/// Macro for structured error logging with trace_id
#[macro_export]
macro_rules! log_error {
    ($logger:expr, $message:expr) => {
        $logger.log_structured(tracing::Level::ERROR, $message, None)
    };
    ($logger:expr, $error:expr, $context:expr) => {
        $logger.log_error($error, Some($context))
    };
}
