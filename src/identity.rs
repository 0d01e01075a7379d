//! Stable, content-addressed chunk identity.
//!
//! A chunk id ties together the document it came from, its position, and a
//! digest of its text: `slug(source_name)-{index:05}-{sha1(text)[..10]}`.
//! Because the chunker is deterministic, re-ingesting unchanged content
//! re-derives the same ids, making the upsert a change-wise no-op.

use sha1::{Digest, Sha1};

/// Hex chars of the SHA-1 digest kept in the id.
const DIGEST_LEN: usize = 10;
/// Zero-padding width of the sequence index.
const INDEX_WIDTH: usize = 5;

/// Lower-case `input` and replace every run of characters outside
/// `[a-z0-9-]` with a single hyphen.
///
/// Also the normative deletion key for supersede-by-source: deletes match
/// on the slugged source name, so filename casing or whitespace changes
/// cannot orphan old chunks.
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_hyphen = false;
    for ch in input.to_lowercase().chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.push(ch);
        } else {
            pending_hyphen = true;
        }
    }
    out
}

/// First 10 hex chars of the SHA-1 of `text`.
pub fn content_digest(text: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(text.as_bytes());
    let full = hex::encode(hasher.finalize());
    full[..DIGEST_LEN].to_string()
}

/// Derive a chunk's stable id.
///
/// Collision-free within a document for any chunking that does not produce
/// two chunks with identical (index, text).
pub fn assign_id(source_name: &str, sequence_index: usize, chunk_text: &str) -> String {
    format!(
        "{}-{:0width$}-{}",
        slugify(source_name),
        sequence_index,
        content_digest(chunk_text),
        width = INDEX_WIDTH
    )
}
