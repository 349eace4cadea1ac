//! Sentence-aware chunking.
//!
//! Cleaned text is split into sentences after every `.`, `!`, or `?` that is followed by
//! whitespace. Sentences are then packed greedily into chunks whose word count stays within the
//! budget. Abbreviations and decimals are not special-cased.
//!
//! The budget is a soft target: a sentence is never cut in half, so a single sentence longer
//! than the budget becomes a chunk of its own that exceeds it.

use super::types::{Chunk, ChunkingError};

/// Default word budget per chunk.
pub const DEFAULT_MAX_CHUNK_WORDS: usize = 500;

/// Split text into sentences on terminal punctuation followed by whitespace.
///
/// Whitespace runs between sentences are consumed; empty sentences are dropped.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((offset, ch)) = chars.next() {
        if !matches!(ch, '.' | '!' | '?') {
            continue;
        }
        let Some(&(next_offset, next)) = chars.peek() else {
            break;
        };
        if !next.is_whitespace() {
            continue;
        }

        push_sentence(&mut sentences, &text[start..offset + ch.len_utf8()]);
        start = next_offset;
        while let Some(&(ws_offset, ws)) = chars.peek() {
            if !ws.is_whitespace() {
                break;
            }
            start = ws_offset + ws.len_utf8();
            chars.next();
        }
    }

    if start < text.len() {
        push_sentence(&mut sentences, &text[start..]);
    }
    sentences
}

fn push_sentence<'a>(sentences: &mut Vec<&'a str>, candidate: &'a str) {
    let trimmed = candidate.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed);
    }
}

/// Partition cleaned text into ordered chunks of at most `max_chunk` words.
///
/// Returns [`ChunkingError::EmptyInput`] when the text is blank and
/// [`ChunkingError::InvalidChunkSize`] for a zero budget.
pub fn chunk_text(text: &str, max_chunk: usize) -> Result<Vec<Chunk>, ChunkingError> {
    if max_chunk == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if text.trim().is_empty() {
        return Err(ChunkingError::EmptyInput);
    }

    let mut groups: Vec<Vec<&str>> = Vec::new();
    for sentence in split_sentences(text) {
        let words: Vec<&str> = sentence.split_whitespace().collect();
        match groups.last_mut() {
            Some(current) if current.len() + words.len() <= max_chunk => current.extend(words),
            _ => groups.push(words),
        }
    }

    let chunks = groups
        .into_iter()
        .enumerate()
        .map(|(index, words)| Chunk {
            index,
            word_count: words.len(),
            text: words.join(" "),
        })
        .collect::<Vec<_>>();

    tracing::debug!(
        chunks = chunks.len(),
        max_chunk,
        oversized = chunks.iter().filter(|c| c.word_count > max_chunk).count(),
        "Chunked text"
    );
    Ok(chunks)
}
