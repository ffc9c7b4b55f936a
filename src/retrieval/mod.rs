#[cfg(test)]
mod tests;

// Hybrid retrieval: a semantic leg over the vector store and a lexical
// leg over the chunk table, merged by arrival order.

use anyhow::{Context, Result};
use itertools::Itertools;
use tracing::{debug, warn};

use crate::config::RetrievalConfig;
use crate::database::lancedb::VectorStore;
use crate::database::sqlite::Database;
use crate::database::sqlite::queries::ChunkQueries;
use crate::llm::OpenAiClient;

/// One retrieved chunk, from either leg. `similarity` is present only for
/// chunks found by the semantic leg.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub document_id: String,
    pub content: String,
    pub section: Option<String>,
    pub similarity: Option<f32>,
}

/// Build the LIKE patterns for the lexical leg, with a per-pattern row
/// bound. At most `max_terms` whitespace-separated terms are used; each
/// pattern gets a ceiling share of `k`. A query with no terms degrades to
/// a single match-all pattern bounded to `k`.
#[inline]
pub fn keyword_patterns(query: &str, max_terms: usize, k: usize) -> Vec<(String, usize)> {
    let terms: Vec<&str> = query.split_whitespace().take(max_terms).collect();

    if terms.is_empty() {
        return vec![("%".to_string(), k)];
    }

    let per_term_limit = k.div_ceil(terms.len());
    terms
        .into_iter()
        .map(|term| (format!("%{term}%"), per_term_limit))
        .collect()
}

/// Merge the two legs: semantic results first, then lexical, deduplicated
/// by chunk id keeping the first occurrence, truncated to `k`.
#[inline]
pub fn merge_candidates(
    semantic: Vec<RetrievedChunk>,
    lexical: Vec<RetrievedChunk>,
    k: usize,
) -> Vec<RetrievedChunk> {
    semantic
        .into_iter()
        .chain(lexical)
        .unique_by(|chunk| chunk.chunk_id.clone())
        .take(k)
        .collect()
}

/// Retrieve the top `k` chunks for a user's query.
///
/// The query embedding is mandatory; an embedding failure fails the whole
/// search. The semantic leg itself degrades to empty on error so a vector
/// store hiccup does not take keyword search down with it.
#[inline]
pub async fn hybrid_search(
    database: &Database,
    vector_store: &VectorStore,
    llm: &OpenAiClient,
    config: &RetrievalConfig,
    user_id: &str,
    query: &str,
    k: usize,
) -> Result<Vec<RetrievedChunk>> {
    debug!("Hybrid search for user {user_id} (k = {k})");

    let query_embedding = llm.embed(query).context("Failed to embed search query")?;

    let semantic = match vector_store.search_similar(&query_embedding, k, user_id).await {
        Ok(results) => results
            .into_iter()
            .map(|result| RetrievedChunk {
                chunk_id: result.chunk_metadata.chunk_id,
                document_id: result.chunk_metadata.document_id,
                content: result.chunk_metadata.content,
                section: result.chunk_metadata.section,
                similarity: Some(result.similarity_score),
            })
            .collect(),
        Err(error) => {
            warn!("Semantic search failed, continuing with keyword leg only: {error}");
            Vec::new()
        }
    };

    let mut lexical = Vec::new();
    for (pattern, limit) in keyword_patterns(query, config.max_keyword_terms, k) {
        let chunks = ChunkQueries::search_content(database.pool(), user_id, &pattern, limit)
            .await
            .context("Failed to run keyword search")?;
        lexical.extend(chunks.into_iter().map(|chunk| RetrievedChunk {
            chunk_id: chunk.id,
            document_id: chunk.document_id,
            content: chunk.content,
            section: chunk.section,
            similarity: None,
        }));
    }

    let merged = merge_candidates(semantic, lexical, k);
    debug!("Hybrid search returned {} chunks", merged.len());
    Ok(merged)
}
