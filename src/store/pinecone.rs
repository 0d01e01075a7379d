//! Pinecone-compatible remote vector store.
//!
//! Talks to an index host over its data-plane HTTP API: `/vectors/upsert`,
//! `/query`, `/vectors/delete`, and `/describe_index_stats`. Upserts are
//! batched at 100 vectors per request. Retry behavior matches the
//! embedding client: 429/5xx and network errors back off and retry, other
//! 4xx fail immediately.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::StoreConfig;
use crate::models::{ScoredMatch, VectorRecord};

use super::{StoreStats, VectorStore};

const UPSERT_BATCH: usize = 100;

pub struct PineconeStore {
    client: reqwest::Client,
    index_host: String,
    api_key: String,
    max_retries: u32,
}

impl PineconeStore {
    /// Create a client from configuration. Fails fast when the API key
    /// environment variable is missing.
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .with_context(|| format!("{} environment variable not set", config.api_key_env))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            index_host: config.index_host.trim_end_matches('/').to_string(),
            api_key,
            max_retries: config.max_retries,
        })
    }

    async fn request(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let endpoint = format!("{}{}", self.index_host, path);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::warn!(attempt, path, "retrying vector store request");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&endpoint)
                .header("Api-Key", &self.api_key)
                .header("Content-Type", "application/json")
                .json(body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.json().await.unwrap_or(serde_json::Value::Null));
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "Vector store error {} on {}: {}",
                            status,
                            path,
                            body_text
                        ));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Vector store error {} on {}: {}", status, path, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| anyhow::anyhow!("Vector store request failed after retries")))
    }
}

#[async_trait]
impl VectorStore for PineconeStore {
    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> Result<usize> {
        let total = records.len();
        for batch in records.chunks(UPSERT_BATCH) {
            let vectors: Vec<serde_json::Value> = batch
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "id": r.id,
                        "values": r.values,
                        "metadata": r.metadata,
                    })
                })
                .collect();
            let body = serde_json::json!({
                "namespace": namespace,
                "vectors": vectors,
            });
            self.request("/vectors/upsert", &body).await?;
        }
        Ok(total)
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
        include_values: bool,
    ) -> Result<Vec<ScoredMatch>> {
        let body = serde_json::json!({
            "namespace": namespace,
            "vector": vector,
            "topK": top_k,
            "includeMetadata": true,
            "includeValues": include_values,
        });
        let json = self.request("/query", &body).await?;
        parse_query_response(&json)
    }

    async fn delete_by_source(&self, namespace: &str, slug: &str) -> Result<()> {
        let body = serde_json::json!({
            "namespace": namespace,
            "filter": {"source_slug": {"$eq": slug}},
        });
        self.request("/vectors/delete", &body).await?;
        Ok(())
    }

    async fn clear_namespace(&self, namespace: &str) -> Result<()> {
        let body = serde_json::json!({
            "namespace": namespace,
            "deleteAll": true,
        });
        self.request("/vectors/delete", &body).await?;
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let json = self
            .request("/describe_index_stats", &serde_json::json!({}))
            .await?;

        let mut namespaces = BTreeMap::new();
        if let Some(ns_map) = json.get("namespaces").and_then(|n| n.as_object()) {
            for (name, info) in ns_map {
                let count = info
                    .get("vectorCount")
                    .and_then(|c| c.as_u64())
                    .unwrap_or(0) as usize;
                namespaces.insert(name.clone(), count);
            }
        }
        Ok(StoreStats { namespaces })
    }
}

fn parse_query_response(json: &serde_json::Value) -> Result<Vec<ScoredMatch>> {
    let matches = json
        .get("matches")
        .and_then(|m| m.as_array())
        .map(|m| m.as_slice())
        .unwrap_or(&[]);

    let mut out = Vec::with_capacity(matches.len());
    for m in matches {
        let id = m
            .get("id")
            .and_then(|i| i.as_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid query response: match missing id"))?;
        let score = m.get("score").and_then(|s| s.as_f64()).unwrap_or(0.0) as f32;
        let metadata = m
            .get("metadata")
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        let values = m.get("values").and_then(|v| v.as_array()).map(|arr| {
            arr.iter()
                .map(|x| x.as_f64().unwrap_or(0.0) as f32)
                .collect()
        });
        out.push(ScoredMatch {
            id: id.to_string(),
            score,
            metadata,
            values,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_query_response() {
        let json = json!({
            "matches": [
                {"id": "a", "score": 0.9, "metadata": {"text": "hi"}, "values": [1.0, 0.0]},
                {"id": "b", "score": 0.5, "metadata": {"text": "lo"}}
            ]
        });
        let matches = parse_query_response(&json).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, "a");
        assert_eq!(matches[0].values, Some(vec![1.0, 0.0]));
        assert!(matches[1].values.is_none());
    }

    #[test]
    fn test_parse_query_response_empty() {
        let matches = parse_query_response(&json!({})).unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_delete_by_source_sends_slug_filter() {
        let server = httpmock::MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(httpmock::Method::POST)
                    .path("/vectors/delete")
                    .json_body(json!({
                        "namespace": "docs",
                        "filter": {"source_slug": {"$eq": "dept-json"}},
                    }));
                then.status(200).json_body(json!({}));
            })
            .await;

        let config = StoreConfig {
            index_host: server.base_url(),
            api_key_env: "KBX_TEST_STORE_KEY".to_string(),
            max_retries: 0,
            ..Default::default()
        };
        std::env::set_var("KBX_TEST_STORE_KEY", "test-key");

        let store = PineconeStore::new(&config).unwrap();
        store.delete_by_source("docs", "dept-json").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_errors_retried_up_to_bound() {
        let server = httpmock::MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(httpmock::Method::POST).path("/query");
                then.status(503).body("unavailable");
            })
            .await;

        let config = StoreConfig {
            index_host: server.base_url(),
            api_key_env: "KBX_TEST_STORE_KEY3".to_string(),
            max_retries: 1,
            ..Default::default()
        };
        std::env::set_var("KBX_TEST_STORE_KEY3", "test-key");

        let store = PineconeStore::new(&config).unwrap();
        let err = store
            .query("docs", &[1.0, 0.0], 5, false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("503"), "unexpected error: {}", err);
        // One initial attempt plus max_retries retries.
        assert_eq!(mock.hits_async().await, 2);
    }

    #[tokio::test]
    async fn test_stats_parses_namespace_counts() {
        let server = httpmock::MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::POST)
                    .path("/describe_index_stats");
                then.status(200).json_body(json!({
                    "namespaces": {"docs": {"vectorCount": 42}},
                    "totalVectorCount": 42
                }));
            })
            .await;

        let config = StoreConfig {
            index_host: server.base_url(),
            api_key_env: "KBX_TEST_STORE_KEY2".to_string(),
            max_retries: 0,
            ..Default::default()
        };
        std::env::set_var("KBX_TEST_STORE_KEY2", "test-key");

        let store = PineconeStore::new(&config).unwrap();
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.namespaces.get("docs"), Some(&42));
    }
}
