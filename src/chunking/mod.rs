#[cfg(test)]
mod tests;

// Text cleanup and chunking for ingestion.
// Chunks are greedy paragraph packs bounded by a character budget; the
// embedding model sees each chunk as one input.

use tracing::debug;

pub use crate::config::ChunkingConfig;

/// Normalize line endings, collapse runs of three or more newlines into a
/// paragraph break, and trim surrounding whitespace.
#[inline]
pub fn clean_text(input: &str) -> String {
    let unified = input.replace('\r', "\n");

    let mut cleaned = String::with_capacity(unified.len());
    let mut newline_run = 0;
    for ch in unified.chars() {
        if ch == '\n' {
            newline_run += 1;
            if newline_run <= 2 {
                cleaned.push(ch);
            }
        } else {
            newline_run = 0;
            cleaned.push(ch);
        }
    }

    cleaned.trim().to_string()
}

/// Split cleaned text into chunks by packing whole paragraphs until the
/// character budget would be exceeded. A single oversized paragraph still
/// becomes its own chunk; paragraphs are never split internally.
#[inline]
pub fn split_chunks(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buf = String::new();

    for paragraph in text.split("\n\n") {
        if !buf.is_empty() && buf.len() + 2 + paragraph.len() > config.max_chunk_chars {
            chunks.push(buf.trim().to_string());
            buf = paragraph.to_string();
        } else if buf.is_empty() {
            buf = paragraph.to_string();
        } else {
            buf.push_str("\n\n");
            buf.push_str(paragraph);
        }
    }
    if !buf.trim().is_empty() {
        chunks.push(buf.trim().to_string());
    }

    debug!("Split text ({} chars) into {} chunks", text.len(), chunks.len());
    chunks
}
