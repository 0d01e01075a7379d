//! Vector store abstraction.
//!
//! Implementations hold `(id, vector, metadata)` records partitioned into
//! namespaces; writes to one namespace never affect another. Callers
//! address records by namespace and, for deletion, by the `source_slug`
//! metadata field.

pub mod memory;
pub mod pinecone;

pub use memory::MemoryStore;
pub use pinecone::PineconeStore;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::models::{ScoredMatch, VectorRecord};

/// Per-namespace vector counts, as reported by the backend.
///
/// Remote backends serve these counts eventually-consistently; freshly
/// written vectors may be missing for a while. The namespace registry,
/// not these stats, is the authority on whether a namespace holds data.
#[derive(Debug, Default)]
pub struct StoreStats {
    pub namespaces: BTreeMap<String, usize>,
}

impl StoreStats {
    pub fn total_vectors(&self) -> usize {
        self.namespaces.values().sum()
    }
}

/// Namespaced vector store.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or overwrite records by id. Returns the number of records
    /// written.
    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> Result<usize>;

    /// Nearest-neighbor query within one namespace. Matches come back in
    /// descending score order with metadata attached; vector values are
    /// included only when `include_values` is set.
    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
        include_values: bool,
    ) -> Result<Vec<ScoredMatch>>;

    /// Delete every record whose `source_slug` metadata equals `slug`.
    /// Deleting from an empty or unknown namespace is a no-op.
    async fn delete_by_source(&self, namespace: &str, slug: &str) -> Result<()>;

    /// Delete every record in the namespace.
    async fn clear_namespace(&self, namespace: &str) -> Result<()>;

    /// Backend-reported vector counts per namespace (possibly stale).
    async fn stats(&self) -> Result<StoreStats>;
}
