use super::{AddedMemories, RemoteStore};
use crate::config::RemoteConfig;
use crate::error::{MemoryError, MemoryResult};
use crate::types::Memory;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// HTTP-backed `RemoteStore`, the only implementation that talks to a real
/// network service. Request/response shapes are deliberately loose (the
/// backend is opaque per spec) — only the fields the engine needs are parsed.
pub struct HttpRemoteStore {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct AddResponse {
    results: Vec<Memory>,
}

#[derive(Deserialize)]
struct SearchResponse {
    results: Vec<Memory>,
}

impl HttpRemoteStore {
    pub fn new(config: &RemoteConfig) -> MemoryResult<Self> {
        let mut builder = Client::builder().timeout(Duration::from_secs(config.request_timeout_secs));
        if let Some(api_key) = &config.api_key {
            let mut headers = reqwest::header::HeaderMap::new();
            let value = format!("Bearer {api_key}");
            headers.insert(
                reqwest::header::AUTHORIZATION,
                value
                    .parse()
                    .map_err(|e| MemoryError::Internal(format!("invalid REMOTE_API_KEY: {e}")))?,
            );
            builder = builder.default_headers(headers);
        }
        let client = builder
            .build()
            .map_err(|e| MemoryError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn map_transport_err(context: &str) -> impl Fn(reqwest::Error) -> MemoryError + '_ {
        move |e| MemoryError::BackendUnavailable(format!("{context}: {e}"))
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn add(
        &self,
        user_id: &str,
        content: &str,
        metadata: HashMap<String, serde_json::Value>,
    ) -> MemoryResult<AddedMemories> {
        debug!("POST /memories for user {user_id}");
        let response = self
            .client
            .post(format!("{}/memories", self.base_url))
            .json(&serde_json::json!({ "user_id": user_id, "content": content, "metadata": metadata }))
            .send()
            .await
            .map_err(Self::map_transport_err("add"))?;

        if !response.status().is_success() {
            return Err(MemoryError::BackendUnavailable(format!(
                "add returned status {}",
                response.status()
            )));
        }

        let parsed: AddResponse = response
            .json()
            .await
            .map_err(|e| MemoryError::Internal(format!("failed to parse add response: {e}")))?;
        Ok(parsed.results)
    }

    async fn search(&self, user_id: &str, query: &str, limit: usize) -> MemoryResult<Vec<Memory>> {
        let response = self
            .client
            .get(format!("{}/memories/search", self.base_url))
            .query(&[("user_id", user_id), ("query", query), ("limit", &limit.to_string())])
            .send()
            .await
            .map_err(Self::map_transport_err("search"))?;

        if !response.status().is_success() {
            return Err(MemoryError::BackendUnavailable(format!(
                "search returned status {}",
                response.status()
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| MemoryError::Internal(format!("failed to parse search response: {e}")))?;
        Ok(parsed.results)
    }

    async fn list(&self, user_id: &str, limit: usize, offset: usize) -> MemoryResult<Vec<Memory>> {
        let response = self
            .client
            .get(format!("{}/memories", self.base_url))
            .query(&[
                ("user_id", user_id.to_string()),
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
            ])
            .send()
            .await
            .map_err(Self::map_transport_err("list"))?;

        if !response.status().is_success() {
            return Err(MemoryError::BackendUnavailable(format!(
                "list returned status {}",
                response.status()
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| MemoryError::Internal(format!("failed to parse list response: {e}")))?;
        Ok(parsed.results)
    }

    async fn get(&self, user_id: &str, id: &str) -> MemoryResult<Memory> {
        let response = self
            .client
            .get(format!("{}/memories/{id}", self.base_url))
            .query(&[("user_id", user_id)])
            .send()
            .await
            .map_err(Self::map_transport_err("get"))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(MemoryError::NotFound(id.to_string()));
        }
        if !response.status().is_success() {
            return Err(MemoryError::BackendUnavailable(format!(
                "get returned status {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| MemoryError::Internal(format!("failed to parse get response: {e}")))
    }

    async fn delete(&self, user_id: &str, id: &str) -> MemoryResult<()> {
        let response = self
            .client
            .delete(format!("{}/memories/{id}", self.base_url))
            .query(&[("user_id", user_id)])
            .send()
            .await
            .map_err(Self::map_transport_err("delete"))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(MemoryError::NotFound(id.to_string()));
        }
        if !response.status().is_success() {
            return Err(MemoryError::BackendUnavailable(format!(
                "delete returned status {}",
                response.status()
            )));
        }
        Ok(())
    }
}
