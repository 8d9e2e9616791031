//! Answer and citation types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::document::RankedChunk;

/// Number of whitespace-delimited words kept in a citation snippet
pub const SNIPPET_WORDS: usize = 15;

/// A citation pointing back into a stored chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerSource {
    pub document_id: Uuid,
    /// Original filename, when known
    pub document_name: Option<String>,
    pub chunk_id: Uuid,
    /// First page of the chunk, if any page mapping exists
    pub page: Option<u32>,
    /// Leading words of the chunk content
    pub snippet: String,
}

impl AnswerSource {
    /// Build a citation from a retrieved chunk
    pub fn from_chunk(chunk: &RankedChunk) -> Self {
        Self {
            document_id: chunk.document_id,
            document_name: chunk.document_name.clone(),
            chunk_id: chunk.chunk_id,
            page: chunk.pages.first().copied(),
            snippet: snippet_of(&chunk.content),
        }
    }
}

/// A grounded answer with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    /// Empty when the answer is not grounded in retrieved content
    pub sources: Vec<AnswerSource>,
}

/// First [`SNIPPET_WORDS`] whitespace-delimited words, with a trailing
/// ellipsis only when words were actually dropped.
pub fn snippet_of(content: &str) -> String {
    let words: Vec<&str> = content.split_whitespace().collect();
    if words.len() <= SNIPPET_WORDS {
        words.join(" ")
    } else {
        format!("{}...", words[..SNIPPET_WORDS].join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_truncates_long_content() {
        let content = (1..=20).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let snippet = snippet_of(&content);
        assert!(snippet.ends_with("..."));
        assert_eq!(snippet.trim_end_matches("..."), {
            (1..=15).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
        });
    }

    #[test]
    fn snippet_keeps_short_content_verbatim() {
        let content = "one two three four five six seven eight nine ten";
        assert_eq!(snippet_of(content), content);
        assert!(!snippet_of(content).ends_with("..."));
    }

    #[test]
    fn snippet_exactly_fifteen_words_has_no_ellipsis() {
        let content = (1..=15).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        assert_eq!(snippet_of(&content), content);
    }
}
