//! TOML configuration.
//!
//! Every section is optional; a missing config file yields [`Config::default`].
//!
//! ```toml
//! [index]
//! root = "."
//! index_dir = ".oracle_index"
//! exclude_globs = ["**/vendor/**"]
//!
//! [embedding]
//! provider = "local"          # local | openai | ollama | hash
//! model = "all-minilm-l6-v2"
//!
//! [server]
//! bind = "127.0.0.1:8000"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable that overrides `index.root`.
pub const ROOT_ENV_VAR: &str = "ORACLE_ROOT_DIR";

/// Upper bound for `retrieval.max_k`.
pub const MAX_K_CEILING: usize = 20;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Relative to `root` unless absolute.
    #[serde(default = "default_index_dir")]
    pub index_dir: PathBuf,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            index_dir: default_index_dir(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_index_dir() -> PathBuf {
    PathBuf::from(".oracle_index")
}
fn default_max_file_bytes() -> u64 {
    1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Syntax chunks must have more than this many characters after trimming.
    #[serde(default = "default_min_syntax_chars")]
    pub min_syntax_chars: usize,
    /// Fallback windows with fewer characters than this after trimming are dropped.
    #[serde(default = "default_min_fallback_chars")]
    pub min_fallback_chars: usize,
    #[serde(default = "default_fallback_window_lines")]
    pub fallback_window_lines: usize,
    #[serde(default = "default_fallback_overlap_lines")]
    pub fallback_overlap_lines: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            min_syntax_chars: default_min_syntax_chars(),
            min_fallback_chars: default_min_fallback_chars(),
            fallback_window_lines: default_fallback_window_lines(),
            fallback_overlap_lines: default_fallback_overlap_lines(),
        }
    }
}

fn default_min_syntax_chars() -> usize {
    50
}
fn default_min_fallback_chars() -> usize {
    60
}
fn default_fallback_window_lines() -> usize {
    700
}
fn default_fallback_overlap_lines() -> usize {
    80
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub default_k: usize,
    /// Hard ceiling applied to every query regardless of caller input.
    #[serde(default = "default_max_k")]
    pub max_k: usize,
    #[serde(default = "default_symbol_k")]
    pub symbol_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: default_k(),
            max_k: default_max_k(),
            symbol_k: default_symbol_k(),
        }
    }
}

fn default_k() -> usize {
    8
}
fn default_max_k() -> usize {
    20
}
fn default_symbol_k() -> usize {
    15
}

#[derive(Debug, Deserialize, Clone)]
pub struct MemoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_state_query")]
    pub state_query: String,
    #[serde(default = "default_memory_k")]
    pub default_k: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            state_query: default_state_query(),
            default_k: default_memory_k(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_state_query() -> String {
    "project overview and decisions".to_string()
}
fn default_memory_k() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
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
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
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
    "127.0.0.1:8000".to_string()
}

impl Config {
    /// Absolute-or-root-relative location of the index directory.
    pub fn index_path(&self) -> PathBuf {
        if self.index.index_dir.is_absolute() {
            self.index.index_dir.clone()
        } else {
            self.index.root.join(&self.index.index_dir)
        }
    }

    pub fn validate(&self) -> Result<()> {
        let c = &self.chunking;
        if c.fallback_window_lines == 0 {
            anyhow::bail!("chunking.fallback_window_lines must be > 0");
        }
        if c.fallback_overlap_lines >= c.fallback_window_lines {
            anyhow::bail!(
                "chunking.fallback_overlap_lines ({}) must be smaller than fallback_window_lines ({})",
                c.fallback_overlap_lines,
                c.fallback_window_lines
            );
        }

        let r = &self.retrieval;
        if r.max_k == 0 || r.max_k > MAX_K_CEILING {
            anyhow::bail!(
                "retrieval.max_k must be between 1 and {} (got {})",
                MAX_K_CEILING,
                r.max_k
            );
        }
        if r.default_k == 0 || r.symbol_k == 0 {
            anyhow::bail!("retrieval.default_k and retrieval.symbol_k must be >= 1");
        }

        match self.embedding.provider.as_str() {
            "local" | "hash" => {}
            "openai" | "ollama" => {
                if self.embedding.model.is_none() {
                    anyhow::bail!(
                        "embedding.model must be specified when provider is '{}'",
                        self.embedding.provider
                    );
                }
                if self.embedding.dims.is_none() || self.embedding.dims == Some(0) {
                    anyhow::bail!(
                        "embedding.dims must be > 0 when provider is '{}'",
                        self.embedding.provider
                    );
                }
            }
            other => anyhow::bail!(
                "Unknown embedding provider: '{}'. Must be local, openai, ollama, or hash.",
                other
            ),
        }
        if self.embedding.dims == Some(0) {
            anyhow::bail!("embedding.dims must be > 0");
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

/// Like [`load_config`], but a missing file yields the defaults.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }
}
