
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// Dimension of the embedding vectors produced by the embedding model.
/// The vector table schema and all similarity queries assume this size.
pub const EMBEDDING_DIMENSION: usize = 1536;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub payments: PaymentsConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub embedding_batch_size: u32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            chat_model: "gpt-4o".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_batch_size: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Result bound for document search requests.
    pub top_k: usize,
    /// Result bound for the question-answering context.
    pub ask_top_k: usize,
    /// Maximum number of query terms used by the keyword leg.
    pub max_keyword_terms: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 8,
            ask_top_k: 3,
            max_keyword_terms: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters before a paragraph starts a new chunk.
    pub max_chunk_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: 900,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PaymentsConfig {
    pub base_url: String,
    pub partner_id: String,
    pub partner_key: String,
    pub auth_key: String,
    /// Public URL of this service, used to build the payment return URL.
    pub site_url: String,
    pub product: String,
    pub price: u64,
    pub currency: String,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://democpay.payple.kr".to_string(),
            partner_id: String::new(),
            partner_key: String::new(),
            auth_key: String::new(),
            site_url: "http://localhost:8787".to_string(),
            product: "PRO subscription".to_string(),
            price: 9900,
            currency: "KRW".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must not be zero)")]
    InvalidPort(u16),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid embedding batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid max chunk size: {0} (must be between 100 and 8192 characters)")]
    InvalidMaxChunkChars(usize),
    #[error("Invalid top_k: {0} (must be between 1 and 100)")]
    InvalidTopK(usize),
    #[error("Invalid keyword term limit: {0} (must be between 1 and 20)")]
    InvalidKeywordTerms(usize),
    #[error("Invalid price: {0} (must not be zero)")]
    InvalidPrice(u64),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Load configuration from `<config_dir>/config.toml`, falling back to
    /// defaults when no file exists. The `OPENAI_API_KEY` environment
    /// variable overrides the key from the file.
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?
        } else {
            Config::default()
        };
        config.base_dir = config_dir.as_ref().to_path_buf();

        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.trim().is_empty() {
                config.openai.api_key = key;
            }
        }

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn load_default() -> Result<Self> {
        Self::load(Self::config_dir()?)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                self.base_dir.display()
            )
        })?;

        let config_path = self.base_dir.join("config.toml");
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Default configuration directory, e.g. `~/.config/workmemo`.
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("workmemo"))
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort(self.server.port));
        }
        self.openai.validate()?;
        self.payments.validate()?;

        if !(100..=8192).contains(&self.chunking.max_chunk_chars) {
            return Err(ConfigError::InvalidMaxChunkChars(
                self.chunking.max_chunk_chars,
            ));
        }

        if !(1..=100).contains(&self.retrieval.top_k) {
            return Err(ConfigError::InvalidTopK(self.retrieval.top_k));
        }
        if !(1..=100).contains(&self.retrieval.ask_top_k) {
            return Err(ConfigError::InvalidTopK(self.retrieval.ask_top_k));
        }
        if !(1..=20).contains(&self.retrieval.max_keyword_terms) {
            return Err(ConfigError::InvalidKeywordTerms(
                self.retrieval.max_keyword_terms,
            ));
        }

        Ok(())
    }

    /// Get the path for the SQLite database
    #[inline]
    pub fn database_path(&self) -> PathBuf {
        self.base_dir.join("workmemo.db")
    }

    /// Get the path for the vector database directory
    #[inline]
    pub fn vector_database_path(&self) -> PathBuf {
        self.base_dir.join("vectors")
    }

    #[inline]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl OpenAiConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.base_url).map_err(|_| ConfigError::InvalidUrl(self.base_url.clone()))?;

        if self.chat_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.chat_model.clone()));
        }
        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding_model.clone()));
        }
        if self.embedding_batch_size == 0 || self.embedding_batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.embedding_batch_size));
        }

        Ok(())
    }

    pub fn api_url(&self) -> Result<Url, ConfigError> {
        let base = self.base_url.trim_end_matches('/');
        Url::parse(&format!("{base}/")).map_err(|_| ConfigError::InvalidUrl(self.base_url.clone()))
    }
}

impl PaymentsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.base_url).map_err(|_| ConfigError::InvalidUrl(self.base_url.clone()))?;
        Url::parse(&self.site_url).map_err(|_| ConfigError::InvalidUrl(self.site_url.clone()))?;

        if self.price == 0 {
            return Err(ConfigError::InvalidPrice(self.price));
        }

        Ok(())
    }

    pub fn return_url(&self) -> String {
        format!(
            "{}/payment/complete",
            self.site_url.trim_end_matches('/')
        )
    }
}
