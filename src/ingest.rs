//! Ingestion pipeline: discover JSON documents, normalize and chunk them,
//! embed the chunks, and upsert them into the vector store.
//!
//! Identity is stable across runs: re-ingesting unchanged documents
//! rewrites the same ids (a harmless overwrite), and re-ingesting a
//! changed document first deletes everything stored under its source slug
//! so stale chunks never linger. The supersede-delete is skipped on the
//! very first ingestion into a namespace, as recorded by the registry.
//!
//! Failures are contained per document: a malformed file or an exhausted
//! retry budget on the backends fails that document alone and the run
//! continues.

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::chunk::{self, SplitPolicy};
use crate::config::Config;
use crate::embedding::{Embedder, OpenAiEmbedder};
use crate::identity;
use crate::models::{Chunk, Document, IngestReport, VectorRecord};
use crate::normalize;
use crate::registry::NamespaceRegistry;
use crate::store::{PineconeStore, VectorStore};

/// Walk the document directory and collect files matching the include
/// globs, sorted by path for a deterministic processing order.
pub fn discover_documents(dir: &Path, include_globs: &[String]) -> Result<Vec<PathBuf>> {
    let mut builder = GlobSetBuilder::new();
    for pattern in include_globs {
        let glob = Glob::new(pattern)
            .with_context(|| format!("Invalid include glob: '{}'", pattern))?;
        builder.add(glob);
    }
    let globs: GlobSet = builder.build()?;

    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(dir).unwrap_or(entry.path());
        if globs.is_match(rel) {
            paths.push(entry.path().to_path_buf());
        }
    }
    paths.sort();
    Ok(paths)
}

/// Read and parse one JSON document. The filename becomes its
/// `source_name`.
pub fn load_document(path: &Path) -> Result<Document> {
    let source_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid document filename: {}", path.display()))?;

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let raw: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Malformed JSON in {}", path.display()))?;

    Ok(Document { source_name, raw })
}

/// Normalize, flatten, split, and assign ids. Deterministic: the same
/// document and parameters always produce the same chunk ids.
pub fn chunk_document(
    document: &Document,
    policy: SplitPolicy,
    max_tokens: usize,
    overlap_tokens: usize,
) -> Vec<Chunk> {
    let normalized = normalize::normalize_value(&document.raw);
    let text = normalize::flatten_document(&normalized);
    let segments = chunk::split(&text, policy, max_tokens, overlap_tokens);

    segments
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk {
            id: identity::assign_id(&document.source_name, index, &text),
            source_name: document.source_name.clone(),
            sequence_index: index,
            content_digest: identity::content_digest(&text),
            text,
        })
        .collect()
}

fn chunk_metadata(chunk: &Chunk, source_slug: &str) -> serde_json::Value {
    serde_json::json!({
        "source": chunk.source_name,
        "source_slug": source_slug,
        "chunk": chunk.sequence_index,
        "text": chunk.text,
    })
}

/// Ingest the given documents into `namespace`.
///
/// Embedding is all-or-nothing per document: every chunk embeds before
/// anything is deleted or written, so a failed document leaves its
/// previously stored chunks untouched.
pub async fn ingest_documents(
    paths: &[PathBuf],
    config: &Config,
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    registry: &NamespaceRegistry,
    namespace: &str,
) -> Result<IngestReport> {
    let policy = SplitPolicy::from_config(&config.chunking)?;
    let mut report = IngestReport::default();

    for path in paths {
        let document = match load_document(path) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping document");
                report.documents_skipped += 1;
                continue;
            }
        };

        let chunks = chunk_document(
            &document,
            policy,
            config.chunking.max_tokens,
            config.chunking.overlap_tokens,
        );
        if chunks.is_empty() {
            tracing::warn!(source = %document.source_name, "document produced no chunks, skipping");
            report.documents_skipped += 1;
            continue;
        }

        match ingest_one(&document, &chunks, store, embedder, registry, namespace).await {
            Ok(written) => {
                report.documents_ingested += 1;
                report.chunks_written += written;
            }
            Err(e) => {
                tracing::error!(source = %document.source_name, error = %e, "document failed");
                report.documents_failed += 1;
            }
        }
    }

    Ok(report)
}

async fn ingest_one(
    document: &Document,
    chunks: &[Chunk],
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    registry: &NamespaceRegistry,
    namespace: &str,
) -> Result<usize> {
    let source_slug = identity::slugify(&document.source_name);

    // Embed everything up front; nothing is deleted until the whole
    // document has vectors.
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embedder.embed_batch(&texts).await?;

    let records: Vec<VectorRecord> = chunks
        .iter()
        .zip(vectors)
        .map(|(chunk, values)| VectorRecord {
            id: chunk.id.clone(),
            values,
            metadata: chunk_metadata(chunk, &source_slug),
        })
        .collect();

    if registry.is_populated(namespace).await? {
        store.delete_by_source(namespace, &source_slug).await?;
    }

    let written = store.upsert(namespace, records).await?;

    registry.mark_populated(namespace).await?;
    registry
        .record_source(namespace, &source_slug, written)
        .await?;

    tracing::info!(source = %document.source_name, chunks = written, "ingested");
    Ok(written)
}

/// `kbx ingest` entry point.
///
/// With `dry_run` set, documents are discovered, parsed, and chunked but
/// no clients are constructed and nothing is embedded or written.
pub async fn run_ingest(config: &Config, file: Option<&Path>, dry_run: bool) -> Result<()> {
    let paths = match file {
        Some(f) => vec![f.to_path_buf()],
        None => discover_documents(&config.documents.dir, &config.documents.include_globs)?,
    };

    if paths.is_empty() {
        println!(
            "No documents matched under {}",
            config.documents.dir.display()
        );
        return Ok(());
    }

    if dry_run {
        let policy = SplitPolicy::from_config(&config.chunking)?;
        let mut total_chunks = 0usize;
        let mut skipped = 0usize;
        for path in &paths {
            match load_document(path) {
                Ok(document) => {
                    let chunks = chunk_document(
                        &document,
                        policy,
                        config.chunking.max_tokens,
                        config.chunking.overlap_tokens,
                    );
                    println!("  {} -> {} chunks", document.source_name, chunks.len());
                    total_chunks += chunks.len();
                }
                Err(e) => {
                    println!("  {} -> skipped ({})", path.display(), e);
                    skipped += 1;
                }
            }
        }
        println!();
        println!("Dry run: {} documents, {} chunks, {} skipped. Nothing written.",
            paths.len() - skipped, total_chunks, skipped);
        return Ok(());
    }

    let store = PineconeStore::new(&config.store)?;
    let embedder = OpenAiEmbedder::new(&config.embedding)?;
    let registry = NamespaceRegistry::connect(&config.registry.path).await?;
    let namespace = config.store.namespace.clone();

    let report =
        ingest_documents(&paths, config, &store, &embedder, &registry, &namespace).await?;
    registry.close().await;

    println!("Ingestion complete:");
    println!("  Documents ingested: {}", report.documents_ingested);
    println!("  Documents skipped:  {}", report.documents_skipped);
    println!("  Documents failed:   {}", report.documents_failed);
    println!("  Chunks written:     {}", report.chunks_written);

    if report.documents_failed > 0 {
        anyhow::bail!("{} document(s) failed to ingest", report.documents_failed);
    }
    Ok(())
}

/// `kbx clear` entry point: wipe the namespace in the store and forget it
/// in the registry.
pub async fn run_clear(config: &Config) -> Result<()> {
    let store = PineconeStore::new(&config.store)?;
    let registry = NamespaceRegistry::connect(&config.registry.path).await?;
    let namespace = &config.store.namespace;

    store.clear_namespace(namespace).await?;
    registry.forget_namespace(namespace).await?;
    registry.close().await;

    println!("Cleared namespace '{}'", namespace);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_discover_documents_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hi").unwrap();

        let paths =
            discover_documents(dir.path(), &["**/*.json".to_string()]).unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
    }

    #[test]
    fn test_discover_documents_bad_glob() {
        let dir = TempDir::new().unwrap();
        assert!(discover_documents(dir.path(), &["[".to_string()]).is_err());
    }

    #[test]
    fn test_load_document_malformed_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load_document(&path).is_err());
    }

    #[test]
    fn test_chunk_document_assigns_stable_ids() {
        let document = Document {
            source_name: "dept.json".to_string(),
            raw: serde_json::json!({"Head": "Dr. Smith", "office": "B12"}),
        };

        let first = chunk_document(&document, SplitPolicy::Token, 800, 160);
        let second = chunk_document(&document, SplitPolicy::Token, 800, 160);
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
        assert!(first[0].id.starts_with("dept-json-00000-"));
        assert_eq!(first[0].id.len(), "dept-json-".len() + 5 + 1 + 10);
        // Legacy key renamed during normalization.
        assert!(first[0].text.contains("chair: Dr. Smith"));
    }

    #[test]
    fn test_chunk_document_empty_object() {
        let document = Document {
            source_name: "empty.json".to_string(),
            raw: serde_json::json!({}),
        };
        let chunks = chunk_document(&document, SplitPolicy::Token, 800, 160);
        assert!(chunks.is_empty());
    }
}
