// Configuration management module
// Handles TOML configuration loading, validation, and defaults

pub mod settings;

pub use settings::{
    ChunkingConfig, Config, ConfigError, OpenAiConfig, PaymentsConfig, RetrievalConfig,
    ServerConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}
