//! End-to-end pipeline demo against the in-memory store.
//!
//! Run with:
//!
//! ```bash
//! cargo run --example memory_pipeline
//! ```
//!
//! Uses a stub embedder so no API keys are needed; the point is to show
//! the ingestion and retrieval flow, not real relevance.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use kbx::chunk::SplitPolicy;
use kbx::embedding::Embedder;
use kbx::ingest::chunk_document;
use kbx::models::{Document, VectorRecord};
use kbx::store::{MemoryStore, VectorStore};

const DIMS: usize = 8;

struct StubEmbedder;

#[async_trait]
impl Embedder for StubEmbedder {
    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                (0..DIMS)
                    .map(|i| {
                        let mut hasher = DefaultHasher::new();
                        text.hash(&mut hasher);
                        i.hash(&mut hasher);
                        (hasher.finish() % 1000) as f32 / 1000.0
                    })
                    .collect()
            })
            .collect())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let document = Document {
        source_name: "dept.json".to_string(),
        raw: serde_json::json!({
            "Head": "Dr. Smith",
            "office": "Building B, Room 12",
            "courses": [
                {"code": "CS101", "title": "Intro to Programming"},
                {"code": "CS330", "title": "Databases"}
            ]
        }),
    };

    let chunks = chunk_document(&document, SplitPolicy::Token, 800, 160);
    println!("Chunked '{}' into {} chunk(s):", document.source_name, chunks.len());
    for chunk in &chunks {
        println!("  {}  [{} chars]", chunk.id, chunk.text.len());
    }

    let embedder = StubEmbedder;
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embedder.embed_batch(&texts).await?;

    let store = MemoryStore::new();
    let records: Vec<VectorRecord> = chunks
        .iter()
        .zip(vectors)
        .map(|(chunk, values)| VectorRecord {
            id: chunk.id.clone(),
            values,
            metadata: serde_json::json!({
                "source": chunk.source_name,
                "source_slug": "dept-json",
                "chunk": chunk.sequence_index,
                "text": chunk.text,
            }),
        })
        .collect();
    store.upsert("docs", records).await?;

    let query = embedder.embed_query("who runs the department").await?;
    let matches = store.query("docs", &query, 3, false).await?;

    println!("\nTop matches:");
    for m in &matches {
        let text = m.metadata["text"].as_str().unwrap_or("");
        let preview: String = text.chars().take(60).collect();
        println!("  {:.3}  {}  {}", m.score, m.id, preview);
    }

    Ok(())
}
