//! Tool server (C13): a line-delimited JSON-RPC loop over stdio exposing the
//! eight tools of the external interface, dispatching onto the `Engine`.

use crate::error::MemoryError;
use crate::orchestrator::{AddStatus, Engine};
use crate::types::{
    AddMemoryInput, DeduplicateMemoriesInput, DeleteMemoryInput, GetAllMemoriesInput, OptimizeCacheInput,
    SearchMemoryInput,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct ToolRequest {
    id: serde_json::Value,
    tool: String,
    #[serde(default)]
    input: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ToolResponse {
    id: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ToolResponse {
    fn ok(id: serde_json::Value, output: String) -> Self {
        Self { id, output: Some(output), error: None }
    }

    fn err(id: serde_json::Value, error: impl std::fmt::Display) -> Self {
        Self { id, output: None, error: Some(error.to_string()) }
    }
}

/// Reads one JSON request per line from `stdin`, writes one JSON response per
/// line to `stdout`. Runs until stdin closes; a malformed line gets an error
/// response rather than killing the loop.
pub async fn run(engine: Arc<Engine>) -> Result<(), std::io::Error> {
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<ToolRequest>(&line) {
            Ok(request) => {
                let id = request.id.clone();
                match dispatch(&engine, request).await {
                    Ok(output) => ToolResponse::ok(id, output),
                    Err(e) => ToolResponse::err(id, e),
                }
            }
            Err(e) => {
                warn!("dropping malformed tool request: {e}");
                ToolResponse::err(serde_json::Value::Null, format!("malformed request: {e}"))
            }
        };

        let mut serialized = serde_json::to_string(&response).unwrap_or_else(|e| {
            format!(r#"{{"id":null,"error":"failed to serialize response: {e}"}}"#)
        });
        serialized.push('\n');
        stdout.write_all(serialized.as_bytes()).await?;
        stdout.flush().await?;
    }

    info!("tool server: stdin closed, shutting down");
    Ok(())
}

async fn dispatch(engine: &Arc<Engine>, request: ToolRequest) -> Result<String, MemoryError> {
    match request.tool.as_str() {
        "add_memory" => {
            let input: AddMemoryInput = parse_input(request.input)?;
            let outcome = engine.add(input).await?;
            Ok(match outcome.status {
                AddStatus::Saved | AddStatus::Queued { .. } => "Saved".to_string(),
                AddStatus::AlreadySaved => "Already saved".to_string(),
            })
        }
        "search_memory" => {
            let input: SearchMemoryInput = parse_input(request.input)?;
            let outcome = engine.search(input).await?;
            if outcome.memories.is_empty() {
                Ok("No memories found".to_string())
            } else {
                Ok(outcome
                    .memories
                    .iter()
                    .map(|scored| scored.memory.content.clone())
                    .collect::<Vec<_>>()
                    .join("\n---\n"))
            }
        }
        "get_all_memories" => {
            let input: GetAllMemoriesInput = parse_input(request.input)?;
            let outcome = engine.get_all(input).await?;
            Ok(format!("{} memories retrieved", outcome.returned))
        }
        "delete_memory" => {
            let input: DeleteMemoryInput = parse_input(request.input)?;
            engine.delete(input).await?;
            Ok("Deleted".to_string())
        }
        "deduplicate_memories" => {
            let input: DeduplicateMemoriesInput = parse_input(request.input)?;
            let report = engine.deduplicate(input).await?;
            Ok(summarize_dedup(&report))
        }
        "optimize_cache" => {
            let input: OptimizeCacheInput = parse_input(request.input)?;
            let max_memories = input.max_memories;
            engine.optimize_cache(input).await?;
            Ok(format!("Cache optimized: {max_memories} memories ready"))
        }
        "cache_stats" => {
            let stats = engine.stats().await?;
            Ok(format!("{} memories cached", stats.cached))
        }
        "sync_status" => {
            let status = engine.sync_status().await;
            Ok(if status.pending_operations == 0 {
                "All operations complete".to_string()
            } else {
                format!("{} operations pending", status.pending_operations)
            })
        }
        other => Err(MemoryError::Invalid(format!("unknown tool: {other}"))),
    }
}

fn parse_input<T: for<'de> Deserialize<'de>>(value: serde_json::Value) -> Result<T, MemoryError> {
    serde_json::from_value(value).map_err(|e| MemoryError::Invalid(format!("invalid input: {e}")))
}

fn summarize_dedup(report: &crate::types::DeduplicationReport) -> String {
    if report.groups.is_empty() {
        return "No duplicates found".to_string();
    }
    format!(
        "{} duplicate group(s), {} memory(ies) removed",
        report.groups.len(),
        report.deleted.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TuningConfig;
    use crate::enrichment::{HashEmbedder, HeuristicExtractor};
    use crate::kv::{Kv, MemoryKv};
    use crate::remote::{MemoryRemoteStore, RemoteStore};

    async fn test_engine() -> Arc<Engine> {
        let kv: Arc<dyn Kv> = Arc::new(MemoryKv::new());
        let remote: Arc<dyn RemoteStore> = Arc::new(MemoryRemoteStore::new());
        Arc::new(
            Engine::new(
                kv,
                remote,
                Arc::new(HashEmbedder::new()),
                Arc::new(HeuristicExtractor::new()),
                TuningConfig::default(),
                "default".to_string(),
            )
            .await
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn dispatch_add_memory_returns_saved() {
        let engine = test_engine().await;
        let request = ToolRequest {
            id: serde_json::json!(1),
            tool: "add_memory".to_string(),
            input: serde_json::json!({"content": "remember the milk", "skip_duplicate_check": true, "async": false}),
        };
        let output = dispatch(&engine, request).await.unwrap();
        assert_eq!(output, "Saved");
    }

    #[tokio::test]
    async fn dispatch_unknown_tool_is_invalid() {
        let engine = test_engine().await;
        let request = ToolRequest {
            id: serde_json::json!(1),
            tool: "not_a_tool".to_string(),
            input: serde_json::json!({}),
        };
        let result = dispatch(&engine, request).await;
        assert!(matches!(result, Err(MemoryError::Invalid(_))));
    }

    #[tokio::test]
    async fn dispatch_search_memory_reports_no_results() {
        let engine = test_engine().await;
        let request = ToolRequest {
            id: serde_json::json!(1),
            tool: "search_memory".to_string(),
            input: serde_json::json!({"query": "nothing will match this"}),
        };
        let output = dispatch(&engine, request).await.unwrap();
        assert_eq!(output, "No memories found");
    }

    #[tokio::test]
    async fn dispatch_sync_status_reports_idle() {
        let engine = test_engine().await;
        let request = ToolRequest {
            id: serde_json::json!(1),
            tool: "sync_status".to_string(),
            input: serde_json::json!({}),
        };
        let output = dispatch(&engine, request).await.unwrap();
        assert_eq!(output, "All operations complete");
    }
}
