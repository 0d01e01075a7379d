//! In-memory vector store.
//!
//! Brute-force cosine scan over a nested map; suitable for tests, demos,
//! and single-node deployments where the corpus fits in memory. Unlike
//! remote backends its stats are exact, never stale.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use crate::embedding::cosine_similarity;
use crate::models::{ScoredMatch, VectorRecord};

use super::{StoreStats, VectorStore};

struct StoredVector {
    values: Vec<f32>,
    metadata: serde_json::Value,
}

/// Thread-safe in-memory store, namespace -> id -> vector.
#[derive(Default)]
pub struct MemoryStore {
    namespaces: RwLock<HashMap<String, HashMap<String, StoredVector>>>,
    delete_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of vectors currently held in a namespace.
    pub fn vector_count(&self, namespace: &str) -> usize {
        self.namespaces
            .read()
            .map(|ns| ns.get(namespace).map(|m| m.len()).unwrap_or(0))
            .unwrap_or(0)
    }

    /// Number of vectors in a namespace whose `source_slug` metadata
    /// matches `slug`.
    pub fn count_by_source(&self, namespace: &str, slug: &str) -> usize {
        self.namespaces
            .read()
            .map(|ns| {
                ns.get(namespace)
                    .map(|m| {
                        m.values()
                            .filter(|v| {
                                v.metadata.get("source_slug").and_then(|s| s.as_str())
                                    == Some(slug)
                            })
                            .count()
                    })
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }

    /// How many times `delete_by_source` has been invoked, across all
    /// namespaces.
    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> Result<usize> {
        let count = records.len();
        let mut namespaces = self
            .namespaces
            .write()
            .map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        let ns = namespaces.entry(namespace.to_string()).or_default();
        for record in records {
            ns.insert(
                record.id,
                StoredVector {
                    values: record.values,
                    metadata: record.metadata,
                },
            );
        }
        Ok(count)
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
        include_values: bool,
    ) -> Result<Vec<ScoredMatch>> {
        let namespaces = self
            .namespaces
            .read()
            .map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        let Some(ns) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<ScoredMatch> = ns
            .iter()
            .map(|(id, stored)| ScoredMatch {
                id: id.clone(),
                score: cosine_similarity(vector, &stored.values),
                metadata: stored.metadata.clone(),
                values: include_values.then(|| stored.values.clone()),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn delete_by_source(&self, namespace: &str, slug: &str) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut namespaces = self
            .namespaces
            .write()
            .map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        if let Some(ns) = namespaces.get_mut(namespace) {
            ns.retain(|_, v| {
                v.metadata.get("source_slug").and_then(|s| s.as_str()) != Some(slug)
            });
        }
        Ok(())
    }

    async fn clear_namespace(&self, namespace: &str) -> Result<()> {
        let mut namespaces = self
            .namespaces
            .write()
            .map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        namespaces.remove(namespace);
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let namespaces = self
            .namespaces
            .read()
            .map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        let counts: BTreeMap<String, usize> = namespaces
            .iter()
            .filter(|(_, m)| !m.is_empty())
            .map(|(k, m)| (k.clone(), m.len()))
            .collect();
        Ok(StoreStats { namespaces: counts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, values: Vec<f32>, slug: &str) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            values,
            metadata: json!({"source_slug": slug, "text": id}),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_query() {
        let store = MemoryStore::new();
        store
            .upsert(
                "docs",
                vec![
                    record("a", vec![1.0, 0.0], "src-a"),
                    record("b", vec![0.0, 1.0], "src-b"),
                ],
            )
            .await
            .unwrap();

        let matches = store.query("docs", &[1.0, 0.1], 1, false).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "a");
        assert!(matches[0].values.is_none());
    }

    #[tokio::test]
    async fn test_upsert_overwrites_same_id() {
        let store = MemoryStore::new();
        store
            .upsert("docs", vec![record("a", vec![1.0, 0.0], "src-a")])
            .await
            .unwrap();
        store
            .upsert("docs", vec![record("a", vec![0.0, 1.0], "src-a")])
            .await
            .unwrap();
        assert_eq!(store.vector_count("docs"), 1);
    }

    #[tokio::test]
    async fn test_namespace_isolation() {
        let store = MemoryStore::new();
        store
            .upsert("alpha", vec![record("a", vec![1.0, 0.0], "src-a")])
            .await
            .unwrap();

        let matches = store.query("beta", &[1.0, 0.0], 5, false).await.unwrap();
        assert!(matches.is_empty());

        store.clear_namespace("beta").await.unwrap();
        assert_eq!(store.vector_count("alpha"), 1);
    }

    #[tokio::test]
    async fn test_delete_by_source_only_hits_matching_slug() {
        let store = MemoryStore::new();
        store
            .upsert(
                "docs",
                vec![
                    record("a1", vec![1.0, 0.0], "src-a"),
                    record("a2", vec![0.5, 0.5], "src-a"),
                    record("b1", vec![0.0, 1.0], "src-b"),
                ],
            )
            .await
            .unwrap();

        store.delete_by_source("docs", "src-a").await.unwrap();
        assert_eq!(store.vector_count("docs"), 1);
        assert_eq!(store.count_by_source("docs", "src-b"), 1);
        assert_eq!(store.delete_calls(), 1);
    }

    #[tokio::test]
    async fn test_delete_from_unknown_namespace_is_noop() {
        let store = MemoryStore::new();
        store.delete_by_source("ghost", "src-a").await.unwrap();
        store.clear_namespace("ghost").await.unwrap();
    }

    #[tokio::test]
    async fn test_stats_counts_per_namespace() {
        let store = MemoryStore::new();
        store
            .upsert("alpha", vec![record("a", vec![1.0], "s")])
            .await
            .unwrap();
        store
            .upsert(
                "beta",
                vec![record("b", vec![1.0], "s"), record("c", vec![1.0], "s")],
            )
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.namespaces.get("alpha"), Some(&1));
        assert_eq!(stats.namespaces.get("beta"), Some(&2));
        assert_eq!(stats.total_vectors(), 3);
    }
}
