//! Query-side retrieval: embed the question, query the store, and rank
//! the results.
//!
//! Two modes, chosen by configuration rather than per call:
//!
//! - `similarity`: plain top-k by store score.
//! - `mmr`: fetch a larger candidate pool with vectors attached, then
//!   greedily re-rank by `lambda * relevance - (1 - lambda) * max
//!   similarity to already-selected`, trading a little relevance for
//!   diversity when a document repeats itself.

use anyhow::Result;

use crate::config::Config;
use crate::embedding::{cosine_similarity, Embedder};
use crate::models::{RetrievedChunk, ScoredMatch};
use crate::store::VectorStore;

/// Ranking mode, parsed from config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingMode {
    Similarity,
    Mmr,
}

impl RankingMode {
    pub fn from_config(config: &Config) -> Result<Self> {
        match config.retrieval.mode.as_str() {
            "similarity" => Ok(RankingMode::Similarity),
            "mmr" => Ok(RankingMode::Mmr),
            other => anyhow::bail!("Unknown retrieval mode: '{}'", other),
        }
    }
}

/// Retrieve the chunks most relevant to `question` from `namespace`.
///
/// An empty or whitespace-only question short-circuits to no results
/// without touching the embedder or the store.
pub async fn retrieve(
    question: &str,
    config: &Config,
    namespace: &str,
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
) -> Result<Vec<RetrievedChunk>> {
    if question.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mode = RankingMode::from_config(config)?;
    let query_vector = embedder.embed_query(question).await?;

    let matches = match mode {
        RankingMode::Similarity => {
            store
                .query(namespace, &query_vector, config.retrieval.top_k, false)
                .await?
        }
        RankingMode::Mmr => {
            let candidates = store
                .query(namespace, &query_vector, config.retrieval.candidate_k, true)
                .await?;
            mmr_rerank(
                candidates,
                config.retrieval.mmr_lambda,
                config.retrieval.top_k,
            )
        }
    };

    Ok(matches.iter().map(to_retrieved_chunk).collect())
}

/// Greedy maximal-marginal-relevance selection.
///
/// Candidates arrive in descending relevance order with vectors attached.
/// Each round picks the candidate maximizing
/// `lambda * relevance - (1 - lambda) * max_similarity_to_selected`;
/// `lambda = 1.0` degenerates to plain relevance order.
pub fn mmr_rerank(candidates: Vec<ScoredMatch>, lambda: f32, top_k: usize) -> Vec<ScoredMatch> {
    let mut remaining = candidates;
    let mut selected: Vec<ScoredMatch> = Vec::with_capacity(top_k.min(remaining.len()));

    while selected.len() < top_k && !remaining.is_empty() {
        let mut best_idx = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (idx, candidate) in remaining.iter().enumerate() {
            let redundancy = selected
                .iter()
                .map(|s| match (&candidate.values, &s.values) {
                    (Some(a), Some(b)) => cosine_similarity(a, b),
                    _ => 0.0,
                })
                .fold(0.0f32, f32::max);
            let mmr = lambda * candidate.score - (1.0 - lambda) * redundancy;
            if mmr > best_score {
                best_score = mmr;
                best_idx = idx;
            }
        }

        selected.push(remaining.swap_remove(best_idx));
    }

    selected
}

/// Reconstruct a chunk from match metadata. Records written by older
/// tooling may lack fields; missing text comes back empty rather than
/// failing the query.
fn to_retrieved_chunk(m: &ScoredMatch) -> RetrievedChunk {
    let text = m
        .metadata
        .get("text")
        .and_then(|t| t.as_str())
        .unwrap_or("")
        .to_string();
    let source = m
        .metadata
        .get("source")
        .and_then(|s| s.as_str())
        .unwrap_or("unknown")
        .to_string();
    RetrievedChunk {
        id: m.id.clone(),
        text,
        source,
        score: m.score,
    }
}
