//! Core data models used throughout kbx.
//!
//! These types represent the documents, chunks, and vector records that flow
//! through the ingestion and retrieval pipeline.

use serde::Serialize;

/// One unit of source knowledge: a single JSON file from the document
/// directory. Identity for replacement purposes is `source_name`, not a
/// content hash — re-ingesting a document with the same name supersedes
/// all of its previously stored chunks.
#[derive(Debug, Clone)]
pub struct Document {
    /// Stable human-readable key (the filename, e.g. `dept.json`).
    pub source_name: String,
    /// Arbitrary nested JSON structure as parsed from disk.
    pub raw: serde_json::Value,
}

/// A bounded segment of a normalized document's serialized text.
///
/// `id` is deterministic: identical text at the same position in the same
/// document always yields the same id, which is what makes re-upsert
/// idempotent.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// `slug(source_name)-{index:05}-{sha1(text)[..10]}`.
    pub id: String,
    /// Original filename this chunk came from.
    pub source_name: String,
    /// 0-based position within the document.
    pub sequence_index: usize,
    /// The chunk text itself.
    pub text: String,
    /// First 10 hex chars of the SHA-1 of `text`.
    pub content_digest: String,
}

/// An `(id, vector, metadata)` triple ready to be written to the vector
/// store.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: serde_json::Value,
}

/// A scored match returned from a vector store query.
///
/// `values` is populated only when the caller asked for vectors (the MMR
/// re-ranker needs them; plain similarity retrieval does not).
#[derive(Debug, Clone)]
pub struct ScoredMatch {
    pub id: String,
    pub score: f32,
    pub metadata: serde_json::Value,
    pub values: Option<Vec<f32>>,
}

/// A chunk as seen by the query path, reconstructed from match metadata.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub id: String,
    pub text: String,
    pub source: String,
    pub score: f32,
}

/// Per-run ingestion summary. Per-document failures are contained and
/// reported here rather than aborting the whole run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    /// Documents fully chunked, embedded, and upserted.
    pub documents_ingested: usize,
    /// Documents skipped (unreadable or malformed JSON).
    pub documents_skipped: usize,
    /// Documents that failed after the backend retry budget was exhausted.
    pub documents_failed: usize,
    /// Total vectors written across all ingested documents.
    pub chunks_written: usize,
}
