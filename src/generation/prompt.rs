//! Prompt assembly for grounded question answering
//!
//! The system turn pins the model to the retrieved excerpts and gives it one
//! sanctioned way to decline. The user turn carries the labeled excerpts and
//! the question verbatim; the question text is never rewritten.

use crate::providers::ChatMessage;
use crate::types::RankedChunk;

const SYSTEM_PROMPT: &str = "You are a document question answering assistant. \
Answer using ONLY the document excerpts provided. \
Do not use outside knowledge and do not speculate. \
If the excerpts do not contain the answer, reply exactly: \
\"I couldn't find that in the documents.\" \
Keep answers concise and factual.";

/// Builds the chat messages for one question
pub struct PromptBuilder;

impl PromptBuilder {
    /// System turn plus a user turn containing excerpts and the question
    pub fn build(question: &str, chunks: &[RankedChunk]) -> Vec<ChatMessage> {
        let mut context = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let name = chunk.document_name.as_deref().unwrap_or("unknown");
            let pages = if chunk.pages.is_empty() {
                "n/a".to_string()
            } else {
                chunk
                    .pages
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            context.push_str(&format!(
                "[Excerpt {} | chunk: {} | document: {} ({}) | pages: {}]\n{}\n\n",
                i + 1,
                chunk.chunk_id,
                chunk.document_id,
                name,
                pages,
                chunk.content
            ));
        }

        let user = format!("Document excerpts:\n\n{context}Question: {question}");
        vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ChatRole;
    use uuid::Uuid;

    fn chunk(content: &str, pages: Vec<u32>) -> RankedChunk {
        RankedChunk {
            chunk_id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            document_name: Some("report.pdf".to_string()),
            content: content.to_string(),
            pages,
            similarity: 0.9,
        }
    }

    #[test]
    fn includes_question_and_excerpts_verbatim() {
        let chunks = vec![chunk("revenue grew 12%", vec![3, 4])];
        let messages = PromptBuilder::build("How did revenue change?", &chunks);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::System);
        assert_eq!(messages[1].role, ChatRole::User);
        assert!(messages[1].content.contains("Question: How did revenue change?"));
        assert!(messages[1].content.contains("revenue grew 12%"));
        assert!(messages[1].content.contains("pages: 3, 4"));
        assert!(messages[1].content.contains("report.pdf"));
    }

    #[test]
    fn labels_excerpts_with_chunk_and_document_ids() {
        let chunks = vec![chunk("some content", vec![1])];
        let messages = PromptBuilder::build("q", &chunks);

        let body = &messages[1].content;
        assert!(body.contains(&format!("chunk: {}", chunks[0].chunk_id)));
        assert!(body.contains(&format!("document: {}", chunks[0].document_id)));
    }

    #[test]
    fn pageless_chunks_are_labeled_na() {
        let chunks = vec![chunk("plain text body", vec![])];
        let messages = PromptBuilder::build("q", &chunks);
        assert!(messages[1].content.contains("pages: n/a"));
    }
}
