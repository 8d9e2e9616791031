//! Ingestion coordinator: one queue message in, one document state out
//!
//! The coordinator owns the idempotent state machine. A delivery for a
//! terminal attempt is a no-op; a claimed attempt runs the full pipeline
//! (fetch, extract, chunk, embed, persist) and lands on READY or FAILED.
//! Failure marking is best-effort and never masks the pipeline error.

use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::ingestion::{pages_for_span, ExtractorRegistry, TextChunker};
use crate::providers::{EmbeddingClient, ObjectStore, StatusPublisher};
use crate::storage::{ClaimOutcome, Database};
use crate::types::{Document, DocumentChunk, DocumentStatus, IngestionAttempt, IngestionMessage, StatusEvent};

/// Drives one ingestion attempt end to end
pub struct IngestionCoordinator {
    database: Arc<Database>,
    object_store: Arc<dyn ObjectStore>,
    embeddings: EmbeddingClient,
    registry: ExtractorRegistry,
    chunker: TextChunker,
    publisher: Arc<dyn StatusPublisher>,
    bucket: String,
}

impl IngestionCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        database: Arc<Database>,
        object_store: Arc<dyn ObjectStore>,
        embeddings: EmbeddingClient,
        registry: ExtractorRegistry,
        chunker: TextChunker,
        publisher: Arc<dyn StatusPublisher>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            database,
            object_store,
            embeddings,
            registry,
            chunker,
            publisher,
            bucket: bucket.into(),
        }
    }

    /// Process one raw queue delivery
    ///
    /// Returns `Ok(())` both for a completed run and for an idempotent no-op
    /// on a terminal attempt. An error means the attempt failed (and was
    /// marked FAILED where possible); the caller decides redelivery.
    pub async fn handle(&self, raw: &[u8]) -> Result<()> {
        let message = IngestionMessage::parse(raw)?;

        let (document, attempt) = match self.database.claim_attempt(&message) {
            Ok(ClaimOutcome::AlreadyHandled { status }) => {
                info!(
                    document_id = %message.document_id,
                    attempt_id = %message.attempt_id,
                    status = status.as_str(),
                    "attempt already terminal, skipping redelivery"
                );
                return Ok(());
            }
            Ok(ClaimOutcome::Claimed { document, attempt }) => (document, attempt),
            Err(e) => {
                error!(
                    document_id = %message.document_id,
                    attempt_id = %message.attempt_id,
                    code = e.code(),
                    "attempt claim rejected: {e}"
                );
                self.fail_unclaimed(&message, &e).await;
                return Err(e);
            }
        };

        info!(
            document_id = %document.id,
            attempt_id = %attempt.id,
            filename = %document.filename,
            "ingestion attempt claimed"
        );
        self.publish_status(&document, DocumentStatus::Processing, &attempt)
            .await;

        match self.run_pipeline(&document, &attempt).await {
            Ok(chunk_count) => {
                self.database.mark_ready(&attempt.id, &document.id)?;
                info!(
                    document_id = %document.id,
                    attempt_id = %attempt.id,
                    chunk_count,
                    "ingestion attempt complete"
                );
                self.publish_status(&document, DocumentStatus::Ready, &attempt)
                    .await;
                Ok(())
            }
            Err(e) => {
                error!(
                    document_id = %document.id,
                    attempt_id = %attempt.id,
                    code = e.code(),
                    "ingestion attempt failed: {e}"
                );
                self.mark_failure(&document.id, &attempt.id, e.code(), &e.to_string());
                self.publish_status(&document, DocumentStatus::Failed, &attempt)
                    .await;
                Err(e)
            }
        }
    }

    /// Fetch, extract, chunk, embed and persist; returns the chunk count
    async fn run_pipeline(
        &self,
        document: &Document,
        attempt: &IngestionAttempt,
    ) -> Result<usize> {
        let raw = self
            .object_store
            .get(&self.bucket, &document.storage_key)
            .await?;

        let extracted = self
            .registry
            .extract(&document.mime_type, &document.filename, &raw)?;

        let spans = self.chunker.chunk(&extracted.text);
        let mut chunks = Vec::with_capacity(spans.len());
        for (index, span) in spans.into_iter().enumerate() {
            let pages = pages_for_span(span.start_char, span.end_char, &extracted.page_spans);
            chunks.push(DocumentChunk::new(
                document.id,
                attempt.id,
                index as u32,
                span.text,
                pages,
            ));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embeddings.embed_many(&texts).await?;

        self.database.replace_chunks(&attempt.id, &chunks, &vectors)?;
        Ok(chunks.len())
    }

    /// Best-effort failure marking; a write error here is logged, not raised,
    /// so the original pipeline error stays the reported one
    fn mark_failure(&self, document_id: &Uuid, attempt_id: &Uuid, code: &str, message: &str) {
        if let Err(e) = self.database.mark_failed(attempt_id, document_id, code, message) {
            warn!(
                document_id = %document_id,
                attempt_id = %attempt_id,
                "failed to persist failure state: {e}"
            );
        }
    }

    /// Best-effort FAILED marking for a message whose claim was rejected
    ///
    /// A missing attempt row has nothing to mark. An attempt that exists but
    /// could not be claimed (e.g. a referential mismatch) is failed in place
    /// so it cannot linger non-terminal, and the owning document's
    /// subscribers are told.
    async fn fail_unclaimed(&self, message: &IngestionMessage, error: &Error) {
        let attempt = match self.database.get_attempt(&message.attempt_id) {
            Ok(Some(attempt)) if !attempt.status.is_terminal() => attempt,
            Ok(_) => return,
            Err(e) => {
                warn!(
                    attempt_id = %message.attempt_id,
                    "failed to load attempt for failure marking: {e}"
                );
                return;
            }
        };

        self.mark_failure(
            &attempt.document_id,
            &attempt.id,
            error.code(),
            &error.to_string(),
        );

        match self.database.get_document(&attempt.document_id) {
            Ok(Some(document)) => {
                self.publish_status(&document, DocumentStatus::Failed, &attempt)
                    .await;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(
                    document_id = %attempt.document_id,
                    "failed to load document for failure event: {e}"
                );
            }
        }
    }

    async fn publish_status(
        &self,
        document: &Document,
        status: DocumentStatus,
        attempt: &IngestionAttempt,
    ) {
        let event = StatusEvent::new(document.id, &document.owner_id, status, Some(attempt.id));
        self.publisher.publish(&event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ChannelStatusPublisher, EmbeddingProvider, FsObjectStore};
    use crate::types::AttemptStatus;
    use async_trait::async_trait;

    struct HashEmbedder;

    #[async_trait]
    impl EmbeddingProvider for HashEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.len() as f32, 1.0, 0.5])
        }

        fn dimensions(&self) -> usize {
            3
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "hash"
        }
    }

    struct Fixture {
        database: Arc<Database>,
        store: Arc<FsObjectStore>,
        publisher: Arc<ChannelStatusPublisher>,
        coordinator: IngestionCoordinator,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let database = Arc::new(Database::in_memory().unwrap());
        let store = Arc::new(FsObjectStore::new(dir.path().to_path_buf()).unwrap());
        let publisher = Arc::new(ChannelStatusPublisher::new());
        let coordinator = IngestionCoordinator::new(
            database.clone(),
            store.clone(),
            EmbeddingClient::new(Arc::new(HashEmbedder), 2),
            ExtractorRegistry::with_defaults(),
            TextChunker::new(10, 2, 4),
            publisher.clone(),
            "documents",
        );
        Fixture {
            database,
            store,
            publisher,
            coordinator,
            _dir: dir,
        }
    }

    async fn seed_document(fx: &Fixture, content: &[u8]) -> (Document, IngestionAttempt) {
        let mut document = Document::new("user-1", "notes.txt", "text/plain", 0, "u1/notes.txt");
        document.status = DocumentStatus::Uploaded;
        fx.database.insert_document(&document).unwrap();
        let attempt = IngestionAttempt::new(document.id);
        fx.database.insert_attempt(&attempt).unwrap();
        fx.store
            .put("documents", &document.storage_key, content)
            .await
            .unwrap();
        (document, attempt)
    }

    fn message(document: &Document, attempt: &IngestionAttempt) -> Vec<u8> {
        IngestionMessage {
            document_id: document.id,
            attempt_id: attempt.id,
        }
        .to_json()
    }

    #[tokio::test]
    async fn successful_run_lands_on_ready_with_chunks() {
        let fx = fixture();
        let (document, attempt) = seed_document(&fx, b"the quick brown fox jumps over the lazy dog, many times over, across one hundred chars of text").await;
        let mut events = fx.publisher.subscribe("user-1");

        fx.coordinator.handle(&message(&document, &attempt)).await.unwrap();

        let stored = fx.database.get_attempt(&attempt.id).unwrap().unwrap();
        assert_eq!(stored.status, AttemptStatus::Ready);
        assert_eq!(stored.progress, 100);
        assert!(stored.finished_at.is_some());

        let doc = fx.database.get_document(&document.id).unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Ready);
        assert!(fx.database.count_chunks(&attempt.id).unwrap() > 0);

        assert_eq!(events.next_event().await.unwrap().status, DocumentStatus::Processing);
        assert_eq!(events.next_event().await.unwrap().status, DocumentStatus::Ready);
    }

    #[tokio::test]
    async fn redelivery_of_completed_attempt_is_a_no_op() {
        let fx = fixture();
        let (document, attempt) = seed_document(&fx, b"some document body long enough to chunk").await;
        let body = message(&document, &attempt);

        fx.coordinator.handle(&body).await.unwrap();
        let count = fx.database.count_chunks(&attempt.id).unwrap();

        // Second delivery of the same message must change nothing
        fx.coordinator.handle(&body).await.unwrap();
        assert_eq!(fx.database.count_chunks(&attempt.id).unwrap(), count);
        let stored = fx.database.get_attempt(&attempt.id).unwrap().unwrap();
        assert_eq!(stored.status, AttemptStatus::Ready);
    }

    #[tokio::test]
    async fn missing_object_marks_attempt_failed() {
        let fx = fixture();
        // No object is written for this key
        let mut document = Document::new("user-1", "gone.txt", "text/plain", 0, "u1/missing.txt");
        document.status = DocumentStatus::Uploaded;
        fx.database.insert_document(&document).unwrap();
        let attempt = IngestionAttempt::new(document.id);
        fx.database.insert_attempt(&attempt).unwrap();

        let err = fx
            .coordinator
            .handle(&message(&document, &attempt))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");

        let stored = fx.database.get_attempt(&attempt.id).unwrap().unwrap();
        assert_eq!(stored.status, AttemptStatus::Failed);
        assert_eq!(stored.error_code.as_deref(), Some("NOT_FOUND"));
        let doc = fx.database.get_document(&document.id).unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Failed);

        // Redelivery after the failure is absorbed as a no-op
        fx.coordinator.handle(&message(&document, &attempt)).await.unwrap();
    }

    #[tokio::test]
    async fn unsupported_type_fails_without_retry_value() {
        let fx = fixture();
        let mut document = Document::new("user-1", "archive.zip", "application/zip", 0, "u1/a.zip");
        document.status = DocumentStatus::Uploaded;
        fx.database.insert_document(&document).unwrap();
        let attempt = IngestionAttempt::new(document.id);
        fx.database.insert_attempt(&attempt).unwrap();
        fx.store.put("documents", "u1/a.zip", b"PK\x03\x04").await.unwrap();

        let err = fx
            .coordinator
            .handle(&message(&document, &attempt))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_TYPE");

        let stored = fx.database.get_attempt(&attempt.id).unwrap().unwrap();
        assert_eq!(stored.status, AttemptStatus::Failed);
        assert_eq!(stored.error_code.as_deref(), Some("UNSUPPORTED_TYPE"));
    }

    #[tokio::test]
    async fn malformed_message_is_a_validation_error() {
        let fx = fixture();
        let err = fx.coordinator.handle(b"{\"nope\":true}").await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION");
    }

    #[tokio::test]
    async fn rejected_claim_still_fails_the_attempt() {
        let fx = fixture();
        let (document, attempt) = seed_document(&fx, b"content").await;
        let mut events = fx.publisher.subscribe("user-1");

        // Message pairs the attempt with a different document
        let mut other = Document::new("user-1", "other.txt", "text/plain", 0, "u1/other.txt");
        other.status = DocumentStatus::Uploaded;
        fx.database.insert_document(&other).unwrap();

        let body = IngestionMessage {
            document_id: other.id,
            attempt_id: attempt.id,
        }
        .to_json();
        let err = fx.coordinator.handle(&body).await.unwrap_err();
        assert_eq!(err.code(), "INTEGRITY");

        // The attempt must not linger INITIATED; its own document follows
        let stored = fx.database.get_attempt(&attempt.id).unwrap().unwrap();
        assert_eq!(stored.status, AttemptStatus::Failed);
        assert_eq!(stored.error_code.as_deref(), Some("INTEGRITY"));
        let doc = fx.database.get_document(&document.id).unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Failed);
        assert_eq!(events.next_event().await.unwrap().status, DocumentStatus::Failed);
    }

    #[tokio::test]
    async fn missing_attempt_claim_has_nothing_to_mark() {
        let fx = fixture();
        let (document, _attempt) = seed_document(&fx, b"content").await;

        let body = IngestionMessage {
            document_id: document.id,
            attempt_id: Uuid::new_v4(),
        }
        .to_json();
        let err = fx.coordinator.handle(&body).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");

        // The document is untouched by a message for an unknown attempt
        let doc = fx.database.get_document(&document.id).unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Uploaded);
    }
}
