//! Answer engine: retrieval, synthesis and the hallucination guard
//!
//! Citations are only attached when the model actually answered from the
//! excerpts. An empty retrieval never reaches the model at all, and a
//! declined answer is detected by phrase matching and stripped of sources.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{AnswerConfig, SourcePolicy};
use crate::error::{Error, Result};
use crate::generation::PromptBuilder;
use crate::providers::LlmProvider;
use crate::retrieval::Retriever;
use crate::types::{Answer, AnswerSource, RankedChunk};

/// Returned without consulting the model when retrieval finds nothing
pub const NO_CONTEXT_ANSWER: &str =
    "I couldn't find anything about that in your documents.";

/// Lowercase markers of a declined answer; any match empties the sources
const NO_KNOWLEDGE_PHRASES: &[&str] = &[
    "couldn't find",
    "could not find",
    "don't know",
    "do not know",
    "cannot find",
    "can't find",
    "no information",
    "unable to find",
    "can't answer",
    "cannot answer",
    "not available in the provided documents",
];

/// Answers questions against a user's ingested documents
pub struct AnswerEngine {
    retriever: Arc<Retriever>,
    llm: Arc<dyn LlmProvider>,
    config: AnswerConfig,
}

impl AnswerEngine {
    pub fn new(retriever: Arc<Retriever>, llm: Arc<dyn LlmProvider>, config: AnswerConfig) -> Self {
        Self {
            retriever,
            llm,
            config,
        }
    }

    /// Answer one question scoped to the owner's documents
    pub async fn answer(&self, question: &str, owner_id: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::validation("question must not be empty"));
        }
        if question.chars().count() > self.config.max_question_len {
            return Err(Error::validation(format!(
                "question exceeds {} characters",
                self.config.max_question_len
            )));
        }

        let chunks = self
            .retriever
            .retrieve(question, owner_id, self.config.top_k)
            .await?;
        if chunks.is_empty() {
            info!(owner_id, "no relevant chunks, skipping model call");
            return Ok(Answer {
                answer: NO_CONTEXT_ANSWER.to_string(),
                sources: Vec::new(),
            });
        }

        let messages = PromptBuilder::build(question, &chunks);
        let answer = self.llm.complete(&messages).await?;

        if is_no_knowledge(&answer) {
            debug!(owner_id, "model declined to answer, dropping sources");
            return Ok(Answer {
                answer,
                sources: Vec::new(),
            });
        }

        Ok(Answer {
            sources: select_sources(&chunks, self.config.source_policy),
            answer,
        })
    }
}

/// True when the model says it has no grounded answer
fn is_no_knowledge(answer: &str) -> bool {
    let lowered = answer.to_lowercase();
    NO_KNOWLEDGE_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase))
}

/// Apply the citation cap to relevance-ordered chunks
fn select_sources(chunks: &[RankedChunk], policy: SourcePolicy) -> Vec<AnswerSource> {
    match policy {
        SourcePolicy::SingleBest => chunks
            .first()
            .map(AnswerSource::from_chunk)
            .into_iter()
            .collect(),
        SourcePolicy::OnePerDocument => {
            let mut seen = HashSet::new();
            chunks
                .iter()
                .filter(|chunk| seen.insert(chunk.document_id))
                .map(AnswerSource::from_chunk)
                .collect()
        }
    }
}
