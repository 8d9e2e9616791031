//! Owner-scoped similarity search
//!
//! The question is embedded with the same model as the chunks; results come
//! back ranked by descending cosine similarity and never cross user
//! boundaries.

use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::providers::EmbeddingClient;
use crate::storage::Database;
use crate::types::RankedChunk;

/// Retrieves the chunks most relevant to a question
pub struct Retriever {
    embeddings: Arc<EmbeddingClient>,
    database: Arc<Database>,
}

impl Retriever {
    pub fn new(embeddings: Arc<EmbeddingClient>, database: Arc<Database>) -> Self {
        Self {
            embeddings,
            database,
        }
    }

    /// Top `limit` chunks for the question among the owner's documents
    pub async fn retrieve(
        &self,
        question: &str,
        owner_id: &str,
        limit: usize,
    ) -> Result<Vec<RankedChunk>> {
        let query = self.embeddings.embed_one(question).await?;
        let ranked = self.database.nearest(&query, owner_id, limit)?;
        debug!(
            owner_id,
            retrieved = ranked.len(),
            limit,
            "similarity retrieval complete"
        );
        Ok(ranked)
    }
}
