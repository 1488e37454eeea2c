//! TOML configuration parsing and validation.
//!
//! Every section is optional. A missing file or an empty one yields the same
//! values the service has always run with: the `personal-assistant` Pinecone
//! index (384-dim, cosine), top-3 retrieval, `llama2-70b-4096` on Groq, and the
//! `all-minilm-l6-v2` local embedder.
//!
//! Credentials never live in the file. Each client section names the
//! environment variable holding its key (`api_key_env`), and
//! [`CompletionConfig::api_key`] / [`StoreConfig::api_key`] read it at startup.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
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
    "0.0.0.0:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    /// `groq` or `openai`. Both name the same OpenAI-compatible client;
    /// only `base_url` picks the actual endpoint.
    #[serde(default = "default_completion_provider")]
    pub provider: String,
    #[serde(default = "default_completion_url")]
    pub base_url: String,
    #[serde(default = "default_completion_model")]
    pub model: String,
    #[serde(default = "default_completion_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: default_completion_provider(),
            base_url: default_completion_url(),
            model: default_completion_model(),
            api_key_env: default_completion_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl CompletionConfig {
    /// Reads the completion credential from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        read_key(&self.api_key_env)
    }
}

fn default_completion_provider() -> String {
    "groq".to_string()
}
fn default_completion_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}
fn default_completion_model() -> String {
    "llama2-70b-4096".to_string()
}
fn default_completion_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_provider")]
    pub provider: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_metric")]
    pub metric: String,
    #[serde(default = "default_control_url")]
    pub control_url: String,
    #[serde(default = "default_store_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_cloud")]
    pub cloud: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            provider: default_store_provider(),
            collection: default_collection(),
            dims: default_dims(),
            metric: default_metric(),
            control_url: default_control_url(),
            api_key_env: default_store_key_env(),
            cloud: default_cloud(),
            region: default_region(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl StoreConfig {
    /// Reads the vector store credential from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        read_key(&self.api_key_env)
    }
}

fn default_store_provider() -> String {
    "pinecone".to_string()
}
fn default_collection() -> String {
    "personal-assistant".to_string()
}
fn default_dims() -> usize {
    384
}
fn default_metric() -> String {
    "cosine".to_string()
}
fn default_control_url() -> String {
    "https://api.pinecone.io".to_string()
}
fn default_store_key_env() -> String {
    "PINECONE_API_KEY".to_string()
}
fn default_cloud() -> String {
    "aws".to_string()
}
fn default_region() -> String {
    "us-east-1".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    /// Base URL for the `ollama` and `openai` providers.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dims: default_dims(),
            url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "local".to_string()
}
fn default_embedding_model() -> String {
    "all-minilm-l6-v2".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn read_key(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Loads and validates a configuration file.
///
/// A missing file is not an error: the defaults are returned so the server
/// can start with nothing but credentials in the environment.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        parse_config(&content)?
    } else {
        tracing::info!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };

    validate(&config)?;
    Ok(config)
}

/// Parses configuration from a TOML string without validating it.
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

pub fn validate(config: &Config) -> Result<()> {
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if config.store.dims == 0 {
        anyhow::bail!("store.dims must be > 0");
    }
    if config.store.dims != config.embedding.dims {
        anyhow::bail!(
            "store.dims ({}) must match embedding.dims ({})",
            config.store.dims,
            config.embedding.dims
        );
    }

    match config.store.metric.as_str() {
        "cosine" | "dotproduct" | "euclidean" => {}
        other => anyhow::bail!(
            "Unknown store metric: '{}'. Must be cosine, dotproduct, or euclidean.",
            other
        ),
    }

    match config.store.provider.as_str() {
        "pinecone" | "memory" => {}
        other => anyhow::bail!(
            "Unknown store provider: '{}'. Must be pinecone or memory.",
            other
        ),
    }

    match config.completion.provider.as_str() {
        // Aliases for the one OpenAI-compatible client.
        "groq" | "openai" => {}
        other => anyhow::bail!(
            "Unknown completion provider: '{}'. Must be groq or openai.",
            other
        ),
    }

    match config.embedding.provider.as_str() {
        "local" | "ollama" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be local, ollama, or openai.",
            other
        ),
    }

    Ok(())
}
