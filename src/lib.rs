use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorkmemoError>;

#[derive(Error, Debug)]
pub enum WorkmemoError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod chunking;
pub mod commands;
pub mod config;
pub mod database;
pub mod ingest;
pub mod llm;
pub mod payments;
pub mod pipeline;
pub mod qa;
pub mod retrieval;
pub mod server;
