//! Recursive character text chunker with overlap.
//!
//! Splits loaded text into [`DocumentChunk`]s of at most `chunk_size`
//! characters, with consecutive chunks sharing up to `chunk_overlap`
//! trailing characters so that context is not lost at a boundary.
//!
//! # Algorithm
//!
//! 1. Pick the first separator present in the text, in order: paragraph
//!    (`\n\n`), line (`\n`), sentence (`". "`), word (`" "`), character.
//! 2. Split on it, keeping the separator attached to the preceding piece.
//! 3. Pieces shorter than `chunk_size` are merged greedily into a window;
//!    when the next piece would overflow, the window is emitted and its head
//!    is dropped until at most `chunk_overlap` characters remain.
//! 4. Pieces that are too long on their own are split again with the
//!    remaining, finer separators.
//!
//! Lengths are counted in `char`s, never bytes, so multi-byte text is never
//! cut inside a code point.
//!
//! # Example
//!
//! ```rust
//! use orinda_core::chunk::{split_text, ChunkingParams};
//!
//! let params = ChunkingParams { chunk_size: 1000, chunk_overlap: 150 };
//! let pieces = split_text("Hello world.\n\nSecond paragraph.", &params);
//! assert_eq!(pieces.len(), 1);
//! ```

use std::collections::VecDeque;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{DocumentChunk, RawSegment};

/// Separators tried from coarsest to finest. The empty string means
/// "split into characters" and always applies.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

/// Target size and overlap, both in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingParams {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 150,
        }
    }
}

/// Split `text` into trimmed, non-empty pieces of at most
/// `params.chunk_size` characters.
pub fn split_text(text: &str, params: &ChunkingParams) -> Vec<String> {
    let mut out = Vec::new();
    if params.chunk_size == 0 {
        return out;
    }
    split_recursive(text, SEPARATORS, params, &mut out);
    out
}

/// Chunk every segment of one file, numbering chunks contiguously from 0
/// across all segments.
pub fn chunk_segments(segments: &[RawSegment], params: &ChunkingParams) -> Vec<DocumentChunk> {
    let mut chunks = Vec::new();
    let mut chunk_index: i64 = 0;
    for segment in segments {
        for piece in split_text(&segment.text, params) {
            chunks.push(make_chunk(&segment.source_file, chunk_index, piece));
            chunk_index += 1;
        }
    }
    chunks
}

fn split_recursive(text: &str, separators: &[&str], params: &ChunkingParams, out: &mut Vec<String>) {
    let (idx, separator) = separators
        .iter()
        .enumerate()
        .find(|(_, sep)| sep.is_empty() || text.contains(**sep))
        .map(|(i, sep)| (i, *sep))
        .unwrap_or((separators.len().saturating_sub(1), ""));
    let finer = separators.get(idx + 1..).unwrap_or(&[]);

    let pieces: Vec<&str> = if separator.is_empty() {
        text.char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect()
    } else {
        text.split_inclusive(separator).collect()
    };

    let mut fitting: Vec<&str> = Vec::new();
    for piece in pieces {
        if char_len(piece) < params.chunk_size {
            fitting.push(piece);
            continue;
        }
        if !fitting.is_empty() {
            merge_pieces(&fitting, params, out);
            fitting.clear();
        }
        if finer.is_empty() {
            push_trimmed(piece, out);
        } else {
            split_recursive(piece, finer, params, out);
        }
    }
    if !fitting.is_empty() {
        merge_pieces(&fitting, params, out);
    }
}

fn merge_pieces(pieces: &[&str], params: &ChunkingParams, out: &mut Vec<String>) {
    let mut window: VecDeque<&str> = VecDeque::new();
    let mut total = 0usize;

    for &piece in pieces {
        let len = char_len(piece);
        if total + len > params.chunk_size && !window.is_empty() {
            push_trimmed(&window.iter().copied().collect::<String>(), out);
            // Keep at most `chunk_overlap` chars, and always leave room for `piece`.
            while total > params.chunk_overlap || (total > 0 && total + len > params.chunk_size) {
                match window.pop_front() {
                    Some(front) => total -= char_len(front),
                    None => break,
                }
            }
        }
        window.push_back(piece);
        total += len;
    }

    if !window.is_empty() {
        push_trimmed(&window.iter().copied().collect::<String>(), out);
    }
}

fn push_trimmed(text: &str, out: &mut Vec<String>) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn make_chunk(source_file: &str, index: i64, text: String) -> DocumentChunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    DocumentChunk {
        id: Uuid::new_v4().to_string(),
        text,
        source_file: source_file.to_string(),
        chunk_index: index,
        hash,
        embedding: None,
    }
}
