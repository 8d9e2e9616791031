//! Windowed text chunking with page-set mapping
//!
//! Token counts are approximated by a fixed characters-per-token ratio; no
//! tokenizer runs during ingestion. All offsets are character offsets, so the
//! window arithmetic is exact regardless of UTF-8 byte widths.

use crate::config::ChunkingConfig;
use crate::ingestion::extractor::PageSpan;

/// One emitted chunk window
///
/// `start_char`/`end_char` are the untrimmed window bounds; `text` is the
/// whitespace-trimmed window content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpan {
    pub text: String,
    pub start_char: usize,
    pub end_char: usize,
}

/// Overlapping, token-budgeted text chunker
pub struct TextChunker {
    target_tokens: usize,
    overlap_tokens: usize,
    chars_per_token: usize,
}

impl TextChunker {
    pub fn new(target_tokens: usize, overlap_tokens: usize, chars_per_token: usize) -> Self {
        Self {
            target_tokens,
            overlap_tokens,
            chars_per_token,
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(
            config.target_tokens,
            config.overlap_tokens,
            config.chars_per_token,
        )
    }

    /// Window size in characters
    fn window_chars(&self) -> usize {
        self.target_tokens * self.chars_per_token
    }

    /// Overlap between consecutive windows in characters
    fn overlap_chars(&self) -> usize {
        self.overlap_tokens * self.chars_per_token
    }

    /// Split text into overlapping windows
    ///
    /// Starting at offset 0, each window covers `window_chars` characters;
    /// the next window starts `window - overlap` characters later. Windows
    /// that trim to nothing are skipped; the walk stops once a window reaches
    /// the end of the text.
    pub fn chunk(&self, text: &str) -> Vec<ChunkSpan> {
        let window = self.window_chars();
        if window == 0 || text.is_empty() {
            return Vec::new();
        }

        // Byte offset of every char boundary, for O(1) char->byte slicing
        let boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        let total_chars = boundaries.len();
        let byte_at =
            |char_idx: usize| -> usize { boundaries.get(char_idx).copied().unwrap_or(text.len()) };

        // A zero or negative step would never advance
        let step = window.saturating_sub(self.overlap_chars()).max(1);

        let mut chunks = Vec::new();
        let mut start = 0usize;
        loop {
            let end = (start + window).min(total_chars);
            let slice = &text[byte_at(start)..byte_at(end)];
            let trimmed = slice.trim();
            if !trimmed.is_empty() {
                chunks.push(ChunkSpan {
                    text: trimmed.to_string(),
                    start_char: start,
                    end_char: end,
                });
            }
            if end >= total_chars {
                break;
            }
            start += step;
        }
        chunks
    }
}

/// Pages whose span overlaps the half-open chunk interval `[start, end)`
///
/// Produces the citation metadata persisted with each chunk: matching page
/// numbers, de-duplicated and sorted ascending.
pub fn pages_for_span(start_char: usize, end_char: usize, spans: &[PageSpan]) -> Vec<u32> {
    let mut pages: Vec<u32> = spans
        .iter()
        .filter(|span| start_char < span.end_char && span.start_char < end_char)
        .map(|span| span.page_number)
        .collect();
    pages.sort_unstable();
    pages.dedup();
    pages
}
