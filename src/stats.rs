//! `kbx stats`: what the registry knows against what the store reports.
//!
//! The registry counts are exact (they reflect this deployment's writes);
//! the store counts come from the backend's stats endpoint and can lag
//! behind recent writes.

use anyhow::Result;
use chrono::{TimeZone, Utc};

use crate::config::Config;
use crate::registry::NamespaceRegistry;
use crate::store::{PineconeStore, VectorStore};

pub async fn run_stats(config: &Config) -> Result<()> {
    let registry = NamespaceRegistry::connect(&config.registry.path).await?;

    println!("Registry ({})", config.registry.path.display());
    let namespaces = registry.namespaces().await?;
    if namespaces.is_empty() {
        println!("  No namespaces populated yet.");
    }
    for namespace in &namespaces {
        let sources = registry.sources(namespace).await?;
        let total: i64 = sources.iter().map(|s| s.chunk_count).sum();
        println!("  {} — {} sources, {} chunks", namespace, sources.len(), total);
        for source in &sources {
            let when = Utc
                .timestamp_opt(source.ingested_at, 0)
                .single()
                .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
                .unwrap_or_else(|| "?".to_string());
            println!(
                "    {:<30} {:>6} chunks  (ingested {})",
                source.source_slug, source.chunk_count, when
            );
        }
    }
    registry.close().await;

    println!();
    println!("Store ({})", config.store.index_host);
    match PineconeStore::new(&config.store) {
        Ok(store) => {
            let stats = store.stats().await?;
            if stats.namespaces.is_empty() {
                println!("  No vectors reported.");
            }
            for (namespace, count) in &stats.namespaces {
                println!("  {} — {} vectors", namespace, count);
            }
            println!("  Total: {} vectors (counts may lag recent writes)",
                stats.total_vectors());
        }
        Err(e) => {
            println!("  Unavailable: {}", e);
        }
    }

    Ok(())
}
