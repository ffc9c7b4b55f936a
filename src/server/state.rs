use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::Config;
use crate::database::lancedb::VectorStore;
use crate::database::sqlite::Database;
use crate::llm::OpenAiClient;
use crate::payments::PaymentClient;

/// Shared application state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub database: Database,
    pub vector_store: Arc<RwLock<VectorStore>>,
    pub llm: Arc<OpenAiClient>,
    pub payments: Arc<PaymentClient>,
}

impl AppState {
    /// Open both stores and build the external-service clients.
    pub async fn initialize(config: Config) -> Result<Self> {
        let database = Database::new(config.database_path())
            .await
            .context("Failed to open database")?;
        let vector_store = VectorStore::new(config.vector_database_path())
            .await
            .context("Failed to open vector store")?;
        let llm = OpenAiClient::new(&config.openai).context("Failed to create OpenAI client")?;
        let payments = PaymentClient::new(&config.payments);

        info!("Application state initialized");
        Ok(Self {
            config: Arc::new(config),
            database,
            vector_store: Arc::new(RwLock::new(vector_store)),
            llm: Arc::new(llm),
            payments: Arc::new(payments),
        })
    }
}
