use anyhow::{Context, Result};
use tracing::info;

// Command implementations behind the CLI. `load_default` validates the
// configuration as part of loading.

use crate::config::Config;
use crate::database::lancedb::VectorStore;
use crate::database::sqlite::Database;
use crate::server;

/// Load and validate the configuration, then serve the API.
#[inline]
pub async fn serve() -> Result<()> {
    let config = Config::load_default()?;

    info!("Starting server on {}", config.bind_address());
    server::run(config).await
}

/// Print storage counters for a quick health check.
#[inline]
pub async fn show_status() -> Result<()> {
    let config = Config::load_default()?;

    let database = Database::new(config.database_path())
        .await
        .context("Failed to open database")?;
    let vector_store = VectorStore::new(config.vector_database_path())
        .await
        .context("Failed to open vector store")?;

    println!("Storage: {}", config.base_dir.display());
    println!("  Documents: {}", database.document_count().await?);
    println!("  Chunks: {}", database.chunk_count().await?);
    println!("  QA log entries: {}", database.qa_log_count().await?);
    println!("  Embeddings: {}", vector_store.count_embeddings().await?);

    Ok(())
}

/// Print the active configuration, with the API key masked.
#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load_default()?;

    println!("Config directory: {}", config.base_dir.display());
    println!("Server: {}", config.bind_address());
    println!("OpenAI base URL: {}", config.openai.base_url);
    println!("Chat model: {}", config.openai.chat_model);
    println!("Embedding model: {}", config.openai.embedding_model);
    println!(
        "API key: {}",
        if config.openai.api_key.is_empty() {
            "(not set)"
        } else {
            "(set)"
        }
    );
    println!("Payment gateway: {}", config.payments.base_url);
    println!(
        "Product: {} ({} {})",
        config.payments.product, config.payments.price, config.payments.currency
    );

    Ok(())
}
