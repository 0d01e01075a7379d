//! kbx — a JSON knowledge-base ingestion and question-answering pipeline.
//!
//! Ingestion normalizes nested JSON documents into flat text, splits the
//! text into bounded chunks with deterministic identities, embeds the
//! chunks, and upserts them into a namespaced vector store. The query
//! path embeds a question, retrieves the nearest chunks from the same
//! namespace, and composes a grounded answer.
//!
//! The library surface exists so the pipeline can run against swappable
//! backends: [`embedding::Embedder`], [`store::VectorStore`], and
//! [`generate::Generator`] are the seams, with HTTP-backed production
//! implementations and an in-memory store for tests and demos.

pub mod answer;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod generate;
pub mod identity;
pub mod ingest;
pub mod models;
pub mod normalize;
pub mod registry;
pub mod retrieve;
pub mod server;
pub mod stats;
pub mod store;

pub use config::{load_config, Config};
pub use models::{Chunk, Document, IngestReport, RetrievedChunk, ScoredMatch, VectorRecord};
