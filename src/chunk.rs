//! Overlapping-window text chunker.
//!
//! Splits source text into windows of `window_chars` characters with
//! `overlap_chars` characters shared between consecutive windows, so context
//! at a window boundary is never lost. The windows overlap, so this is not
//! a partition. The final chunk may be shorter than the window.
//!
//! Each chunk receives a random UUID plus a SHA-256 hash of its text.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::DocumentChunk;

/// Split `text` into overlapping windows. Splits are clamped to char
/// boundaries, so "units" are Unicode scalar values, never bytes.
/// Requires `overlap < window`; empty input yields no chunks.
pub fn chunk_text(
    source_label: &str,
    text: &str,
    window: usize,
    overlap: usize,
) -> Vec<DocumentChunk> {
    debug_assert!(overlap < window, "overlap must be smaller than window");

    if text.is_empty() {
        return Vec::new();
    }

    // Byte offset of every char boundary, plus the end of the text.
    let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    boundaries.push(text.len());
    let n_chars = boundaries.len() - 1;

    let step = window - overlap;
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index: i64 = 0;

    loop {
        let end = (start + window).min(n_chars);
        let piece = &text[boundaries[start]..boundaries[end]];
        chunks.push(make_chunk(source_label, index, piece));
        index += 1;

        if end == n_chars {
            break;
        }
        start += step;
    }

    chunks
}

fn make_chunk(source_label: &str, index: i64, text: &str) -> DocumentChunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    DocumentChunk {
        id: Uuid::new_v4().to_string(),
        source_label: source_label.to_string(),
        chunk_index: index,
        text: text.to_string(),
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_text_single_chunk() {
        let chunks = chunk_text("technical", "Hello, world!", 1000, 200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(chunk_text("technical", "", 1000, 200).is_empty());
    }

    #[test]
    fn text_exactly_one_window_is_single_chunk() {
        let text: String = std::iter::repeat('a').take(1000).collect();
        let chunks = chunk_text("technical", &text, 1000, 200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text.chars().count(), 1000);
    }

    #[test]
    fn consecutive_chunks_share_exactly_overlap_chars() {
        // 2600 chars, window 1000 / overlap 200 => starts at 0, 800, 1600, 2400
        let text: String = (0..2600).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let chunks = chunk_text("technical", &text, 1000, 200);
        assert_eq!(chunks.len(), 4);

        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].text.chars().collect();
            let tail: String = prev[prev.len() - 200..].iter().collect();
            let head: String = pair[1].text.chars().take(200).collect();
            assert_eq!(tail, head, "consecutive chunks must share 200 chars");
        }

        // Last chunk may be shorter than the window
        assert_eq!(chunks[3].text.chars().count(), 200);
    }

    #[test]
    fn indices_are_contiguous_from_zero() {
        let text: String = std::iter::repeat('x').take(5000).collect();
        let chunks = chunk_text("diet", &text, 1000, 200);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
            assert_eq!(c.source_label, "diet");
        }
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let text: String = std::iter::repeat('é').take(1500).collect();
        let chunks = chunk_text("technical", &text, 1000, 200);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text.chars().count(), 1000);
        assert_eq!(chunks[1].text.chars().count(), 700);
    }

    #[test]
    fn hashes_are_deterministic_per_text() {
        let a = chunk_text("technical", "same text", 1000, 200);
        let b = chunk_text("technical", "same text", 1000, 200);
        assert_eq!(a[0].hash, b[0].hash);
        assert_ne!(a[0].id, b[0].id);
    }
}
