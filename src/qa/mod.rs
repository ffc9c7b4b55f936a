
// Question answering over the user's own notes. Retrieval grounds the
// answer; the model reports which context entries it used through a
// structural JSON reply, and every exchange lands in the QA log.

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::RetrievalConfig;
use crate::database::lancedb::VectorStore;
use crate::database::sqlite::Database;
use crate::database::sqlite::models::{Citation, NewQaLogEntry};
use crate::database::sqlite::queries::QaLogQueries;
use crate::llm::{ChatMessage, ChatOptions, OpenAiClient};
use crate::retrieval::{RetrievedChunk, hybrid_search};

const EXCERPT_CHARS: usize = 300;

const ANSWER_SYSTEM_PROMPT: &str = "\
You are a capable and friendly work assistant.
Your first duty is to produce the best possible answer to the user's question from the work manuals provided as [Context].

[Rules]
1. Context first: compose your answer by combining and restructuring only the information in [Context].
2. Best answer: reconsider every context entry and give the most accurate, complete, summarized answer to the question.
3. When no context entry is relevant to the question, start your answer with \"I could not find related information in the work manuals.\" and then answer from general knowledge.
4. When answering from general knowledge, cite nothing.
5. For questions about \"how\" or procedures, explain step by step.

Reply with a single JSON object:
{\"answer\": \"your answer text\", \"used_context\": true or false, \"citations\": [indices of the context entries you used, e.g. 1, 3]}";

/// One answered question, with the grounding references that were
/// actually used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub answer: String,
    pub used_context: bool,
    pub citations: Vec<Citation>,
}

#[derive(Debug, Deserialize)]
struct ModelReply {
    answer: String,
    #[serde(default)]
    used_context: bool,
    #[serde(default)]
    citations: Vec<usize>,
}

/// Render retrieved chunks as numbered context blocks, 1-based so the
/// model's cited indices read naturally.
#[inline]
pub fn build_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| format!("[{}] {}", i + 1, chunk.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Parse the structural reply. A reply that is not the expected JSON
/// shape is used verbatim as the answer, with no citations.
#[inline]
pub fn parse_model_reply(reply: &str) -> (String, bool, Vec<usize>) {
    match serde_json::from_str::<ModelReply>(reply) {
        Ok(parsed) => (parsed.answer, parsed.used_context, parsed.citations),
        Err(error) => {
            warn!("Answer was not structural JSON, using it verbatim: {error}");
            (reply.to_string(), false, Vec::new())
        }
    }
}

/// First `EXCERPT_CHARS` characters of a chunk, on a char boundary.
fn excerpt(content: &str) -> String {
    content.chars().take(EXCERPT_CHARS).collect()
}

/// Turn the model's cited indices into citation records. Indices outside
/// the retrieved set are dropped; citing nothing is not an error.
#[inline]
pub fn materialize_citations(chunks: &[RetrievedChunk], indices: &[usize]) -> Vec<Citation> {
    indices
        .iter()
        .filter_map(|&idx| {
            let chunk = chunks.get(idx.checked_sub(1)?)?;
            Some(Citation {
                idx,
                chunk_id: chunk.chunk_id.clone(),
                document_id: chunk.document_id.clone(),
                excerpt: excerpt(&chunk.content),
            })
        })
        .collect()
}

/// Answer a question over the user's notes and log the exchange.
#[inline]
pub async fn ask(
    database: &Database,
    vector_store: &VectorStore,
    llm: &OpenAiClient,
    config: &RetrievalConfig,
    user_id: &str,
    question: &str,
) -> Result<Answer> {
    let chunks = hybrid_search(
        database,
        vector_store,
        llm,
        config,
        user_id,
        question,
        config.ask_top_k,
    )
    .await
    .context("Failed to retrieve context for question")?;

    debug!("Answering with {} context chunks", chunks.len());

    let context_text = build_context(&chunks);
    let user_message = format!("Question: {question}\n\n[Context]\n{context_text}\n\n[Answer]");

    let messages = [
        ChatMessage::system(ANSWER_SYSTEM_PROMPT),
        ChatMessage::user(user_message),
    ];
    let options = ChatOptions {
        temperature: Some(0.1),
        max_tokens: None,
        json_mode: true,
    };
    let reply = llm
        .chat_completion(&messages, &options)
        .context("Failed to generate answer")?;

    let (answer, used_context, cited_indices) = parse_model_reply(&reply);
    let citations = if used_context {
        materialize_citations(&chunks, &cited_indices)
    } else {
        Vec::new()
    };

    QaLogQueries::create(
        database.pool(),
        &NewQaLogEntry {
            user_id: user_id.to_string(),
            question: question.to_string(),
            answer: answer.clone(),
            citations: citations.clone(),
        },
    )
    .await
    .context("Failed to record QA log entry")?;

    Ok(Answer {
        answer,
        used_context,
        citations,
    })
}
