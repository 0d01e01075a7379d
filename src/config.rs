use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub documents: DocumentsConfig,
    pub registry: RegistryConfig,
    pub store: StoreConfig,
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Where source JSON documents live. Each file in the directory is one
/// document; its filename is the document's `source_name`.
#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    pub dir: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.json".to_string()]
}

/// SQLite file backing the namespace registry.
#[derive(Debug, Deserialize, Clone)]
pub struct RegistryConfig {
    pub path: PathBuf,
}

/// External vector store (Pinecone-style serverless index).
///
/// The API key is read from the environment variable named by
/// `api_key_env`; a missing key is a fatal startup error.
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Index base URL, e.g. `https://my-index-abc123.svc.aped-1.pinecone.io`.
    pub index_host: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_store_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            index_host: String::new(),
            namespace: default_namespace(),
            dims: default_dims(),
            api_key_env: default_store_key_env(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_namespace() -> String {
    "docs".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_store_key_env() -> String {
    "PINECONE_API_KEY".to_string()
}

/// Chunk-boundary policy.
///
/// `policy = "token"` (default) splits on a whitespace-token budget;
/// `policy = "character"` is a separator-based fallback for deployments
/// without a tokenizer. The two are NOT interchangeable mid-lifetime of a
/// namespace: switching changes every downstream chunk id and requires
/// `kbx clear` followed by a full re-ingest.
#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_policy")]
    pub policy: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_overlap_tokens")]
    pub overlap_tokens: usize,
}

fn default_policy() -> String {
    "token".to_string()
}
fn default_max_tokens() -> usize {
    800
}
fn default_overlap_tokens() -> usize {
    160
}

/// Retrieval ranking mode is a deployment choice, not a per-call parameter.
#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// `"similarity"` (plain top-k) or `"mmr"` (diversity re-ranking).
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Candidate pool size fetched before MMR re-ranking.
    #[serde(default = "default_candidate_k")]
    pub candidate_k: usize,
    /// MMR relevance/diversity trade-off in [0, 1]; 1.0 degenerates to
    /// plain similarity.
    #[serde(default = "default_mmr_lambda")]
    pub mmr_lambda: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            top_k: default_top_k(),
            candidate_k: default_candidate_k(),
            mmr_lambda: default_mmr_lambda(),
        }
    }
}

fn default_mode() -> String {
    "similarity".to_string()
}
fn default_top_k() -> usize {
    8
}
fn default_candidate_k() -> usize {
    32
}
fn default_mmr_lambda() -> f32 {
    0.7
}

/// Embedding capability (OpenAI-compatible `/v1/embeddings`).
///
/// The same model must be used at ingestion and query time — a mismatch
/// silently degrades relevance with no error signal, so the model is
/// pinned here rather than passed per call.
#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_openai_url")]
    pub url: String,
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dims: default_dims(),
            url: default_openai_url(),
            api_key_env: default_openai_key_env(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_openai_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

/// Answer generation (OpenAI-compatible `/v1/chat/completions`).
#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_openai_url")]
    pub url: String,
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_generation_model(),
            url: default_openai_url(),
            api_key_env: default_openai_key_env(),
            temperature: 0.0,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_generation_model() -> String {
    "gpt-3.5-turbo".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7878".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

/// Fail-fast validation: a bad config is a fatal startup error, caught
/// before any requests are accepted.
pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_tokens == 0 {
        anyhow::bail!("chunking.max_tokens must be > 0");
    }
    if config.chunking.overlap_tokens >= config.chunking.max_tokens {
        anyhow::bail!("chunking.overlap_tokens must be < chunking.max_tokens");
    }
    match config.chunking.policy.as_str() {
        "token" | "character" => {}
        other => anyhow::bail!(
            "Unknown chunking policy: '{}'. Must be token or character.",
            other
        ),
    }

    match config.retrieval.mode.as_str() {
        "similarity" | "mmr" => {}
        other => anyhow::bail!(
            "Unknown retrieval mode: '{}'. Must be similarity or mmr.",
            other
        ),
    }
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.candidate_k < config.retrieval.top_k {
        anyhow::bail!("retrieval.candidate_k must be >= retrieval.top_k");
    }
    if !(0.0..=1.0).contains(&config.retrieval.mmr_lambda) {
        anyhow::bail!("retrieval.mmr_lambda must be in [0.0, 1.0]");
    }

    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.dims != config.store.dims {
        anyhow::bail!(
            "embedding.dims ({}) must match store.dims ({})",
            config.embedding.dims,
            config.store.dims
        );
    }

    if config.store.namespace.trim().is_empty() {
        anyhow::bail!("store.namespace must not be empty");
    }
    if config.store.index_host.trim().is_empty() {
        anyhow::bail!("store.index_host must not be empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_toml() -> String {
        r#"
[documents]
dir = "./data_sources"

[registry]
path = "./data/kbx.sqlite"

[store]
index_host = "https://example-index.svc.pinecone.io"

[chunking]
max_tokens = 800
overlap_tokens = 160
"#
        .to_string()
    }

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config = parse(&base_toml()).unwrap();
        assert_eq!(config.store.namespace, "docs");
        assert_eq!(config.store.dims, 1536);
        assert_eq!(config.chunking.policy, "token");
        assert_eq!(config.retrieval.mode, "similarity");
        assert_eq!(config.retrieval.top_k, 8);
        assert_eq!(config.embedding.model, "text-embedding-3-small");
        assert_eq!(config.documents.include_globs, vec!["**/*.json"]);
    }

    #[test]
    fn test_overlap_must_be_less_than_budget() {
        let toml_str = base_toml().replace("overlap_tokens = 160", "overlap_tokens = 800");
        let err = parse(&toml_str).unwrap_err();
        assert!(err.to_string().contains("overlap_tokens"));
    }

    #[test]
    fn test_unknown_chunking_policy_rejected() {
        let toml_str = format!("{}policy = \"sentence\"\n", base_toml());
        let err = parse(&toml_str).unwrap_err();
        assert!(err.to_string().contains("Unknown chunking policy"));
    }

    #[test]
    fn test_unknown_retrieval_mode_rejected() {
        let toml_str = format!("{}\n[retrieval]\nmode = \"bm25\"\n", base_toml());
        let err = parse(&toml_str).unwrap_err();
        assert!(err.to_string().contains("Unknown retrieval mode"));
    }

    #[test]
    fn test_dims_mismatch_rejected() {
        let toml_str = format!("{}\n[embedding]\ndims = 768\n", base_toml());
        let err = parse(&toml_str).unwrap_err();
        assert!(err.to_string().contains("must match store.dims"));
    }

    #[test]
    fn test_candidate_k_below_top_k_rejected() {
        let toml_str = format!("{}\n[retrieval]\ntop_k = 10\ncandidate_k = 4\n", base_toml());
        let err = parse(&toml_str).unwrap_err();
        assert!(err.to_string().contains("candidate_k"));
    }
}
