
// Document ingestion: summarize, chunk, embed, and persist a note, plus
// the update/delete/list operations that share its storage handling.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chunking::{ChunkingConfig, clean_text, split_chunks};
use crate::database::lancedb::{ChunkMetadata, EmbeddingRecord, VectorStore};
use crate::database::sqlite::Database;
use crate::database::sqlite::models::{Document, DocumentUpdate, NewChunk, NewDocument};
use crate::database::sqlite::queries::{ChunkQueries, DocumentQueries};
use crate::llm::{ChatMessage, ChatOptions, OpenAiClient};

const SUMMARY_PROMPT: &str = "\
Convert the following free-form text into JSON with exactly this schema:
{
  \"purpose\": \"...\",
  \"background\": \"...\",
  \"owners_systems\": [\"...\"],
  \"steps\": [\"1. ...\", \"2. ...\"],
  \"cautions\": [\"...\"],
  \"terms\": [\"...\"],
  \"keywords\": [\"...\"]
}";

/// Structured summary of one ingested note. Every field defaults so a
/// partial reply still parses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub background: String,
    #[serde(default)]
    pub owners_systems: Vec<String>,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub cautions: Vec<String>,
    #[serde(default)]
    pub terms: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub document_id: String,
    pub chunks: usize,
}

/// Summarize cleaned note text. A reply that fails to parse degrades to
/// an empty summary; a failed call is an error.
#[inline]
pub fn summarize(llm: &OpenAiClient, text: &str) -> Result<IngestSummary> {
    let messages = [
        ChatMessage::system("You convert messy notes into structured JSON only."),
        ChatMessage::user(format!("{SUMMARY_PROMPT}\n\nTEXT:\n{text}")),
    ];
    let options = ChatOptions {
        temperature: Some(0.2),
        max_tokens: None,
        json_mode: true,
    };
    let reply = llm
        .chat_completion(&messages, &options)
        .context("Failed to summarize note")?;

    match serde_json::from_str(&reply) {
        Ok(summary) => Ok(summary),
        Err(error) => {
            warn!("Summary was not valid JSON, ingesting without one: {error}");
            Ok(IngestSummary::default())
        }
    }
}

/// Resolve the document title: explicit request title, else the summary
/// purpose, else `Untitled`.
#[inline]
pub fn resolve_title(request_title: Option<&str>, summary: &IngestSummary) -> String {
    if let Some(title) = request_title {
        if !title.trim().is_empty() {
            return title.trim().to_string();
        }
    }
    if !summary.purpose.is_empty() {
        return summary.purpose.clone();
    }
    "Untitled".to_string()
}

/// Ingest one note: clean, summarize, chunk, embed, persist.
///
/// Document and chunk rows are written in one transaction; the embedding
/// batch then goes to the vector store, and if that insert fails the
/// committed document is deleted again so no half-ingested note survives.
#[inline]
pub async fn ingest_document(
    database: &Database,
    vector_store: &mut VectorStore,
    llm: &OpenAiClient,
    config: &ChunkingConfig,
    user_id: &str,
    title: Option<&str>,
    raw_text: &str,
) -> Result<IngestOutcome> {
    let cleaned = clean_text(raw_text);
    let summary = summarize(llm, &cleaned)?;
    let resolved_title = resolve_title(title, &summary);

    let chunk_texts = split_chunks(&cleaned, config);
    let embeddings = llm
        .embed_batch(&chunk_texts)
        .context("Failed to embed note chunks")?;

    let document_id = Uuid::new_v4().to_string();
    let structured_json =
        serde_json::to_string(&summary).context("Failed to encode summary")?;
    let section = if summary.steps.is_empty() {
        None
    } else {
        Some("procedure".to_string())
    };
    let keywords = if summary.keywords.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&summary.keywords).context("Failed to encode keywords")?)
    };

    let mut records = Vec::with_capacity(chunk_texts.len());
    let mut new_chunks = Vec::with_capacity(chunk_texts.len());
    let created_at = Utc::now().to_rfc3339();
    for (index, (content, vector)) in chunk_texts.iter().zip(embeddings).enumerate() {
        let chunk_id = Uuid::new_v4().to_string();
        let vector_id = Uuid::new_v4().to_string();

        new_chunks.push(NewChunk {
            id: chunk_id.clone(),
            document_id: document_id.clone(),
            user_id: user_id.to_string(),
            chunk_index: index as i64,
            content: content.clone(),
            section: section.clone(),
            keywords: keywords.clone(),
            vector_id: vector_id.clone(),
        });
        records.push(EmbeddingRecord {
            id: vector_id,
            vector,
            metadata: ChunkMetadata {
                chunk_id,
                document_id: document_id.clone(),
                user_id: user_id.to_string(),
                section: section.clone(),
                content: content.clone(),
                chunk_index: index as u32,
                created_at: created_at.clone(),
            },
        });
    }

    let mut tx = database
        .pool()
        .begin()
        .await
        .context("Failed to begin ingest transaction")?;
    DocumentQueries::create(
        &mut *tx,
        &NewDocument {
            id: document_id.clone(),
            user_id: user_id.to_string(),
            title: resolved_title,
            raw_text: cleaned,
            structured_json: Some(structured_json),
        },
    )
    .await?;
    for chunk in &new_chunks {
        ChunkQueries::create(&mut *tx, chunk).await?;
    }
    tx.commit().await.context("Failed to commit ingest transaction")?;

    if let Err(error) = vector_store.store_embeddings_batch(records).await {
        warn!("Vector insert failed, rolling back document {document_id}");
        DocumentQueries::delete_owned(database.pool(), &document_id, user_id)
            .await
            .context("Failed to remove document after vector insert failure")?;
        return Err(error).context("Failed to store embeddings");
    }

    info!(
        "Ingested document {document_id} for user {user_id} ({} chunks)",
        new_chunks.len()
    );
    Ok(IngestOutcome {
        document_id,
        chunks: new_chunks.len(),
    })
}

/// Replace a document's title and raw text. Chunks keep their original
/// content and embeddings. `None` when the document does not exist for
/// this user.
#[inline]
pub async fn update_document(
    database: &Database,
    user_id: &str,
    document_id: &str,
    update: &DocumentUpdate,
) -> Result<Option<Document>> {
    DocumentQueries::update_owned(database.pool(), document_id, user_id, update).await
}

/// Delete one owned document, its chunks (via cascade), and its vectors.
#[inline]
pub async fn delete_document(
    database: &Database,
    vector_store: &mut VectorStore,
    user_id: &str,
    document_id: &str,
) -> Result<bool> {
    let deleted = DocumentQueries::delete_owned(database.pool(), document_id, user_id).await?;
    if deleted {
        vector_store
            .delete_document_embeddings(document_id)
            .await
            .context("Failed to delete document embeddings")?;
        debug!("Deleted document {document_id} for user {user_id}");
    }
    Ok(deleted)
}

/// Delete a batch of owned documents. Documents the user does not own are
/// skipped; the count of actually deleted documents is returned.
#[inline]
pub async fn delete_documents(
    database: &Database,
    vector_store: &mut VectorStore,
    user_id: &str,
    document_ids: &[String],
) -> Result<u64> {
    let mut deleted = 0;
    for document_id in document_ids {
        if delete_document(database, vector_store, user_id, document_id).await? {
            deleted += 1;
        }
    }
    Ok(deleted)
}

/// All documents for a user, newest first.
#[inline]
pub async fn list_documents(database: &Database, user_id: &str) -> Result<Vec<Document>> {
    DocumentQueries::list_for_user(database.pool(), user_id).await
}
