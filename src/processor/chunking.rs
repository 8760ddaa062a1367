//! # Text Chunking Module
//!
//! Splits extracted page text into passages of at most `chunk_size` characters,
//! preferring the largest natural boundary that fits.
//!
//! ## Chunking Strategy
//!
//! 1. Split on paragraph breaks, then on line breaks, then on spaces, and
//!    finally between characters, descending only for pieces that are still
//!    too large
//! 2. Greedily pack neighbouring pieces back together with their separator
//!    until the next piece would overflow the chunk
//! 3. Start the next chunk with the trailing pieces of the previous one, as
//!    long as they fit in `chunk_overlap` characters
//!
//! Lengths are counted in characters, never bytes, so multi-byte text is never
//! split inside a code point. The output depends only on the input text and
//! the options.

use std::collections::VecDeque;

use tracing::{debug, instrument};

use crate::processor::ChunkOptions;
use crate::processor::error::ProcessError;

const SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

impl ChunkOptions {
    /// Reject options that cannot produce bounded chunks
    pub fn validate(&self) -> Result<(), ProcessError> {
        if self.chunk_size == 0 {
            return Err(ProcessError::Chunking("chunk_size must be greater than 0".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ProcessError::Chunking(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Split text into chunks
///
/// # Arguments
///
/// * `text` - Page text, paragraphs separated by blank lines
/// * `options` - Chunking options
///
/// # Returns
///
/// The non-empty chunks in document order
#[instrument(skip(text), fields(len = text.len()))]
pub fn chunk_text(text: &str, options: &ChunkOptions) -> Result<Vec<String>, ProcessError> {
    options.validate()?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let chunks = split_recursive(text, SEPARATORS, options);
    debug!("Split {} characters into {} chunks", char_len(text), chunks.len());
    Ok(chunks)
}

fn split_recursive(text: &str, separators: &[&str], options: &ChunkOptions) -> Vec<String> {
    // The empty separator always matches, so a separator is always found
    let position = separators
        .iter()
        .position(|sep| sep.is_empty() || text.contains(sep))
        .unwrap_or(separators.len().saturating_sub(1));
    let separator = separators.get(position).copied().unwrap_or("");
    let finer = separators.get(position + 1..).unwrap_or(&[]);

    let pieces: Vec<&str> = if separator.is_empty() {
        text.char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect()
    } else {
        text.split(separator).filter(|piece| !piece.is_empty()).collect()
    };

    let mut chunks = Vec::new();
    let mut fitting: Vec<&str> = Vec::new();

    for piece in pieces {
        if char_len(piece) <= options.chunk_size {
            fitting.push(piece);
            continue;
        }

        if !fitting.is_empty() {
            chunks.extend(merge_pieces(&fitting, separator, options));
            fitting.clear();
        }

        if finer.is_empty() {
            chunks.push(piece.to_string());
        } else {
            chunks.extend(split_recursive(piece, finer, options));
        }
    }

    if !fitting.is_empty() {
        chunks.extend(merge_pieces(&fitting, separator, options));
    }

    chunks
}

fn merge_pieces(pieces: &[&str], separator: &str, options: &ChunkOptions) -> Vec<String> {
    let separator_len = char_len(separator);
    let mut chunks = Vec::new();
    let mut window: VecDeque<&str> = VecDeque::new();
    let mut total = 0;

    for &piece in pieces {
        let len = char_len(piece);
        let joined_len = |window: &VecDeque<&str>| if window.is_empty() { 0 } else { separator_len };

        if total + len + joined_len(&window) > options.chunk_size && !window.is_empty() {
            push_chunk(&mut chunks, &window, separator);

            // Keep only the tail that fits in the overlap and leaves room for the new piece
            while total > options.chunk_overlap
                || (total > 0 && total + len + joined_len(&window) > options.chunk_size)
            {
                let Some(front) = window.pop_front() else {
                    break;
                };
                total -= char_len(front) + if window.is_empty() { 0 } else { separator_len };
            }
        }

        total += len + joined_len(&window);
        window.push_back(piece);
    }

    push_chunk(&mut chunks, &window, separator);
    chunks
}

fn push_chunk(chunks: &mut Vec<String>, window: &VecDeque<&str>, separator: &str) {
    let joined = window.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(chunk_size: usize, chunk_overlap: usize) -> ChunkOptions {
        ChunkOptions {
            chunk_size,
            chunk_overlap,
        }
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = chunk_text("We build tools.", &ChunkOptions::default()).unwrap();
        assert_eq!(chunks, vec!["We build tools."]);
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("", &ChunkOptions::default()).unwrap().is_empty());
        assert!(chunk_text(" \n\n \t", &ChunkOptions::default()).unwrap().is_empty());
    }

    #[test]
    fn test_paragraphs_are_packed_up_to_chunk_size() {
        let text = "aaaa\n\nbbbb\n\ncccc";
        let chunks = chunk_text(text, &options(10, 0)).unwrap();
        assert_eq!(chunks, vec!["aaaa\n\nbbbb", "cccc"]);
    }

    #[test]
    fn test_long_paragraph_splits_on_words_with_overlap() {
        let text = "one two three four five six";
        let chunks = chunk_text(text, &options(13, 5)).unwrap();
        assert_eq!(chunks, vec!["one two three", "three four", "four five six"]);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 13);
        }
    }

    #[test]
    fn test_overlap_only_when_it_fits() {
        // Previous paragraphs are longer than the overlap, so nothing is carried
        let text = "first paragraph\n\nsecond paragraph";
        let chunks = chunk_text(text, &options(20, 5)).unwrap();
        assert_eq!(chunks, vec!["first paragraph", "second paragraph"]);
    }

    #[test]
    fn test_unbroken_word_is_split_by_characters() {
        let chunks = chunk_text("abcdefghij", &options(4, 0)).unwrap();
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_multibyte_text_counts_characters() {
        let text = "é".repeat(6);
        let chunks = chunk_text(&text, &options(4, 0)).unwrap();
        assert_eq!(chunks, vec!["éééé", "éé"]);
    }

    #[test]
    fn test_deterministic() {
        let text = "Lorem ipsum dolor sit amet.\n\n".repeat(40);
        let a = chunk_text(&text, &options(100, 20)).unwrap();
        let b = chunk_text(&text, &options(100, 20)).unwrap();
        assert_eq!(a, b);
        assert!(a.len() > 1);
        assert!(a.iter().all(|chunk| chunk.chars().count() <= 100));
    }

    #[test]
    fn test_invalid_options() {
        assert!(matches!(
            chunk_text("text", &options(0, 0)),
            Err(ProcessError::Chunking(_))
        ));
        assert!(matches!(
            chunk_text("text", &options(10, 10)),
            Err(ProcessError::Chunking(_))
        ));
    }
}
