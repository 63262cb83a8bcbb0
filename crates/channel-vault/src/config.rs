//! TOML configuration for the vault service.
//!
//! Every section except `[store]` may be omitted. Secrets never live in the
//! file: the embedding API key and the vector index token are read from the
//! environment variables named by `api_key_env` and `api_token_env`.
//!
//! ```toml
//! [store]
//! data_dir = "./data/owners"
//!
//! [embedding]
//! provider = "openai"
//! model = "intfloat/multilingual-e5-large"
//! dims = 1024
//!
//! [vector_index]
//! provider = "http"
//! url = "https://api.cloudflare.com/client/v4/accounts/ACCOUNT/vectorize/v2/indexes/telegram-e5"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use channel_vault_core::search::{SearchDefaults, MAX_TOP_K};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub vector_index: VectorIndexConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub actor: ActorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// A configuration with every default and the given data directory.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            store: StoreConfig {
                data_dir: data_dir.into(),
                busy_timeout_ms: default_busy_timeout_ms(),
                max_connections: default_max_connections(),
            },
            embedding: EmbeddingConfig::default(),
            vector_index: VectorIndexConfig::default(),
            search: SearchConfig::default(),
            actor: ActorConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Directory holding one SQLite file per owner.
    pub data_dir: PathBuf,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_busy_timeout_ms() -> u64 {
    5000
}
fn default_max_connections() -> u32 {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `"disabled"` or `"openai"` (any OpenAI-compatible endpoint).
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: Option<String>,
    #[serde(default = "default_dims")]
    pub dims: Option<usize>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_key_env")]
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
            provider: default_provider(),
            model: default_model(),
            dims: default_dims(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_model() -> Option<String> {
    Some("intfloat/multilingual-e5-large".to_string())
}
fn default_dims() -> Option<usize> {
    Some(1024)
}
fn default_base_url() -> String {
    "https://api.deepinfra.com/v1/openai".to_string()
}
fn default_api_key_env() -> String {
    "EMBEDDING_API_KEY".to_string()
}
fn default_batch_size() -> usize {
    channel_vault_core::pipeline::DEFAULT_BATCH_SIZE
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorIndexConfig {
    /// `"disabled"`, `"memory"` or `"http"`.
    #[serde(default = "default_index_provider")]
    pub provider: String,
    /// Base URL of the index; `/query` and `/insert` are appended.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_api_token_env")]
    pub api_token_env: String,
    /// Prefix of every owner namespace.
    #[serde(default = "default_namespace_prefix")]
    pub namespace_prefix: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            provider: default_index_provider(),
            url: None,
            api_token_env: default_api_token_env(),
            namespace_prefix: default_namespace_prefix(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_index_provider() -> String {
    "disabled".to_string()
}
fn default_api_token_env() -> String {
    "VECTORIZE_API_TOKEN".to_string()
}
fn default_namespace_prefix() -> String {
    "telegram".to_string()
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    #[serde(default = "default_context_window_secs")]
    pub context_window_secs: i64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let d = SearchDefaults::default();
        Self {
            top_k: d.top_k,
            threshold: d.threshold,
            context_window_secs: d.context_window_secs,
        }
    }
}

impl SearchConfig {
    pub fn defaults(&self) -> SearchDefaults {
        SearchDefaults {
            top_k: self.top_k,
            threshold: self.threshold,
            context_window_secs: self.context_window_secs,
        }
    }
}

fn default_top_k() -> usize {
    SearchDefaults::default().top_k
}
fn default_threshold() -> f32 {
    SearchDefaults::default().threshold
}
fn default_context_window_secs() -> i64 {
    SearchDefaults::default().context_window_secs
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct ActorConfig {
    /// Bounded mailbox capacity per owner.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: default_mailbox_capacity(),
        }
    }
}

fn default_mailbox_capacity() -> usize {
    64
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// An `EnvFilter` directive, e.g. `"info,channel_vault=debug"`.
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

fn default_filter() -> String {
    "info".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.store.data_dir.as_os_str().is_empty() {
        anyhow::bail!("store.data_dir must not be empty");
    }
    if config.store.max_connections == 0 {
        anyhow::bail!("store.max_connections must be > 0");
    }

    // Embedding
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    // Vector index
    match config.vector_index.provider.as_str() {
        "disabled" | "memory" => {}
        "http" => {
            if config.vector_index.url.as_deref().map_or(true, str::is_empty) {
                anyhow::bail!("vector_index.url must be set when provider is 'http'");
            }
        }
        other => anyhow::bail!(
            "Unknown vector index provider: '{}'. Must be disabled, memory, or http.",
            other
        ),
    }
    if config.vector_index.namespace_prefix.trim().is_empty() {
        anyhow::bail!("vector_index.namespace_prefix must not be empty");
    }

    // Search
    if !(1..=MAX_TOP_K).contains(&config.search.top_k) {
        anyhow::bail!("search.top_k must be in [1, {}]", MAX_TOP_K);
    }
    if !(-1.0..=1.0).contains(&config.search.threshold) {
        anyhow::bail!("search.threshold must be in [-1.0, 1.0]");
    }
    if config.search.context_window_secs < 0 {
        anyhow::bail!("search.context_window_secs must be >= 0");
    }

    if config.actor.mailbox_capacity == 0 {
        anyhow::bail!("actor.mailbox_capacity must be > 0");
    }

    Ok(())
}
