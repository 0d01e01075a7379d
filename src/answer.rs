//! Answer composition: retrieved chunks plus the question become a
//! grounded prompt, and the generator's completion becomes the answer.
//!
//! When retrieval returns nothing, the fallback answer is returned
//! directly and the generator is never called — an ungrounded completion
//! would otherwise invite hallucination.

use anyhow::Result;

use crate::config::Config;
use crate::embedding::{Embedder, OpenAiEmbedder};
use crate::generate::{Generator, OpenAiGenerator};
use crate::models::RetrievedChunk;
use crate::registry::NamespaceRegistry;
use crate::retrieve;
use crate::store::{PineconeStore, VectorStore};

/// Returned verbatim when no context is available.
pub const FALLBACK_ANSWER: &str = "I don't know.";

/// Assemble the grounded prompt: instructions, retrieved context blocks,
/// then the question.
pub fn build_prompt(question: &str, chunks: &[RetrievedChunk]) -> String {
    let context = chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    format!(
        "Use the context to answer concisely. If the answer is not in the context, \
         say \"I don't know\".\n\nContext:\n{}\n\nQuestion: {}\nAnswer:",
        context,
        question.trim()
    )
}

/// Compose an answer from already-retrieved chunks.
pub async fn compose(
    question: &str,
    chunks: &[RetrievedChunk],
    generator: &dyn Generator,
) -> Result<String> {
    if chunks.is_empty() {
        return Ok(FALLBACK_ANSWER.to_string());
    }
    let prompt = build_prompt(question, chunks);
    generator.complete(&prompt).await
}

/// End-to-end question answering: retrieve then compose.
pub async fn answer_question(
    question: &str,
    config: &Config,
    namespace: &str,
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    generator: &dyn Generator,
) -> Result<String> {
    let chunks = retrieve::retrieve(question, config, namespace, store, embedder).await?;
    compose(question, &chunks, generator).await
}

/// `kbx ask` entry point.
pub async fn run_ask(config: &Config, question: &str) -> Result<()> {
    let namespace = config.store.namespace.clone();
    let registry = NamespaceRegistry::connect(&config.registry.path).await?;

    if !registry.is_populated(&namespace).await? {
        registry.close().await;
        println!("{}", FALLBACK_ANSWER);
        println!("(namespace '{}' has no ingested documents; run `kbx ingest` first)", namespace);
        return Ok(());
    }
    registry.close().await;

    let store = PineconeStore::new(&config.store)?;
    let embedder = OpenAiEmbedder::new(&config.embedding)?;
    let generator = OpenAiGenerator::new(&config.generation)?;

    let answer =
        answer_question(question, config, &namespace, &store, &embedder, &generator).await?;
    println!("{}", answer);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingGenerator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Generator for CountingGenerator {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("a generated answer".to_string())
        }
    }

    fn chunk(text: &str) -> RetrievedChunk {
        RetrievedChunk {
            id: "c".to_string(),
            text: text.to_string(),
            source: "test.json".to_string(),
            score: 0.9,
        }
    }

    #[test]
    fn test_build_prompt_layout() {
        let prompt = build_prompt("Who chairs the department?", &[chunk("chair: Dr. Smith")]);
        assert!(prompt.starts_with("Use the context to answer concisely."));
        assert!(prompt.contains("Context:\nchair: Dr. Smith"));
        assert!(prompt.ends_with("Question: Who chairs the department?\nAnswer:"));
    }

    #[test]
    fn test_build_prompt_separates_chunks() {
        let prompt = build_prompt("q", &[chunk("first"), chunk("second")]);
        assert!(prompt.contains("first\n\n---\n\nsecond"));
    }

    #[tokio::test]
    async fn test_compose_empty_context_skips_generator() {
        let generator = CountingGenerator {
            calls: AtomicUsize::new(0),
        };
        let answer = compose("anything", &[], &generator).await.unwrap();
        assert_eq!(answer, FALLBACK_ANSWER);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_compose_with_context_calls_generator() {
        let generator = CountingGenerator {
            calls: AtomicUsize::new(0),
        };
        let answer = compose("q", &[chunk("ctx")], &generator).await.unwrap();
        assert_eq!(answer, "a generated answer");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }
}
