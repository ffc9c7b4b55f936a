// LanceDB vector database module
// Handles vector storage and user-scoped similarity search for chunk embeddings

pub mod vector_store;

use serde::{Deserialize, Serialize};

pub use vector_store::{SearchResult, VectorStore};

/// Embedding record stored in LanceDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Unique identifier for this embedding (the chunk's vector_id)
    pub id: String,
    /// The vector embedding (1536 dimensions)
    pub vector: Vec<f32>,
    /// Metadata about the chunk this embedding represents
    pub metadata: ChunkMetadata,
}

/// Metadata for a chunk stored alongside its embedding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// ID of the chunk row in SQLite
    pub chunk_id: String,
    /// ID of the parent document
    pub document_id: String,
    /// ID of the owning user; every search is filtered on this
    pub user_id: String,
    /// Optional section label from the ingestion summary
    pub section: Option<String>,
    /// The actual text content of the chunk
    pub content: String,
    /// Index of this chunk within the document (for ordering)
    pub chunk_index: u32,
    /// Timestamp when this embedding was created
    pub created_at: String,
}
