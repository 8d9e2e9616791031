//! SQLite database for documents, ingestion attempts and chunk vectors
//!
//! One connection behind a mutex; every state transition runs in a single
//! transaction, which is the only mutual-exclusion mechanism the ingestion
//! state machine relies on. Embeddings are stored as little-endian f32 blobs
//! and similarity search scans the owner's chunks with an exact cosine
//! computation.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{
    AttemptStatus, Document, DocumentChunk, DocumentStatus, IngestionAttempt, IngestionMessage,
    RankedChunk,
};

/// Persisted error messages are truncated to this many characters
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Outcome of the transactional attempt claim
#[derive(Debug)]
pub enum ClaimOutcome {
    /// The attempt is already terminal; the message is an idempotent no-op
    AlreadyHandled { status: AttemptStatus },
    /// The attempt was promoted to PROCESSING and the pipeline should run
    Claimed {
        document: Document,
        attempt: IngestionAttempt,
    },
}

/// Row counts for operational visibility
#[derive(Debug, Clone, Serialize)]
pub struct DbStats {
    pub documents: usize,
    pub attempts: usize,
    pub chunks: usize,
    pub embedded_chunks: usize,
}

/// SQLite-backed store for the ingestion and retrieval pipelines
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Create or open the database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| Error::database(format!("failed to open database: {e}")))?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Create an in-memory database (tests and local development)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::database(format!("failed to open in-memory database: {e}")))?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=ON;
        "#,
        )
        .map_err(|e| Error::database(format!("failed to set pragmas: {e}")))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                filename TEXT NOT NULL,
                mime_type TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                storage_key TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_owner ON documents(owner_id);

            CREATE TABLE IF NOT EXISTS ingestion_attempts (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
                status TEXT NOT NULL,
                progress INTEGER NOT NULL DEFAULT 0,
                error_code TEXT,
                error_message TEXT,
                started_at TEXT,
                finished_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_attempts_document ON ingestion_attempts(document_id);

            CREATE TABLE IF NOT EXISTS document_chunks (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
                attempt_id TEXT NOT NULL REFERENCES ingestion_attempts(id) ON DELETE CASCADE,
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                pages TEXT NOT NULL,
                embedding BLOB
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_attempt ON document_chunks(attempt_id);
            CREATE INDEX IF NOT EXISTS idx_chunks_document ON document_chunks(document_id);
        "#,
        )
        .map_err(|e| Error::database(format!("migration failed: {e}")))?;

        Ok(())
    }

    /// Insert a new document record
    pub fn insert_document(&self, document: &Document) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"INSERT INTO documents
               (id, owner_id, filename, mime_type, size_bytes, storage_key, status, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
            params![
                document.id.to_string(),
                document.owner_id,
                document.filename,
                document.mime_type,
                document.size_bytes as i64,
                document.storage_key,
                document.status.as_str(),
                document.created_at,
                document.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Insert a new ingestion attempt record
    pub fn insert_attempt(&self, attempt: &IngestionAttempt) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"INSERT INTO ingestion_attempts
               (id, document_id, status, progress, error_code, error_message, started_at, finished_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            params![
                attempt.id.to_string(),
                attempt.document_id.to_string(),
                attempt.status.as_str(),
                attempt.progress as i64,
                attempt.error_code,
                attempt.error_message,
                attempt.started_at,
                attempt.finished_at,
            ],
        )?;
        Ok(())
    }

    /// Load a document by id
    pub fn get_document(&self, id: &Uuid) -> Result<Option<Document>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, owner_id, filename, mime_type, size_bytes, storage_key, status, created_at, updated_at
             FROM documents WHERE id = ?1",
            params![id.to_string()],
            row_to_document,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Load an attempt by id
    pub fn get_attempt(&self, id: &Uuid) -> Result<Option<IngestionAttempt>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, document_id, status, progress, error_code, error_message, started_at, finished_at
             FROM ingestion_attempts WHERE id = ?1",
            params![id.to_string()],
            row_to_attempt,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Transactionally claim an attempt for processing
    ///
    /// In one transaction: loads attempt and document, validates the message
    /// against them, short-circuits on terminal attempts, and otherwise
    /// promotes attempt and document to PROCESSING. A concurrent delivery of
    /// the same message serializes behind this transaction and observes the
    /// already-promoted state.
    pub fn claim_attempt(&self, message: &IngestionMessage) -> Result<ClaimOutcome> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let attempt = tx
            .query_row(
                "SELECT id, document_id, status, progress, error_code, error_message, started_at, finished_at
                 FROM ingestion_attempts WHERE id = ?1",
                params![message.attempt_id.to_string()],
                row_to_attempt,
            )
            .optional()?
            .ok_or_else(|| Error::not_found(format!("attempt {}", message.attempt_id)))?;

        let document = tx
            .query_row(
                "SELECT id, owner_id, filename, mime_type, size_bytes, storage_key, status, created_at, updated_at
                 FROM documents WHERE id = ?1",
                params![message.document_id.to_string()],
                row_to_document,
            )
            .optional()?
            .ok_or_else(|| Error::not_found(format!("document {}", message.document_id)))?;

        if attempt.document_id != message.document_id {
            return Err(Error::integrity(format!(
                "attempt {} belongs to document {}, message references {}",
                attempt.id, attempt.document_id, message.document_id
            )));
        }

        if attempt.status.is_terminal() {
            return Ok(ClaimOutcome::AlreadyHandled {
                status: attempt.status,
            });
        }

        let now = Utc::now();
        if attempt.status == AttemptStatus::Initiated {
            tx.execute(
                "UPDATE ingestion_attempts
                 SET status = ?1, started_at = COALESCE(started_at, ?2)
                 WHERE id = ?3",
                params![
                    AttemptStatus::Processing.as_str(),
                    now,
                    attempt.id.to_string()
                ],
            )?;
        }
        tx.execute(
            "UPDATE documents SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![
                DocumentStatus::Processing.as_str(),
                now,
                document.id.to_string()
            ],
        )?;
        tx.commit()?;

        let mut attempt = attempt;
        attempt.status = AttemptStatus::Processing;
        attempt.started_at = attempt.started_at.or(Some(now));
        let mut document = document;
        document.status = DocumentStatus::Processing;
        document.updated_at = now;

        Ok(ClaimOutcome::Claimed { document, attempt })
    }

    /// Mark a successful run: attempt READY with full progress, document READY
    pub fn mark_ready(&self, attempt_id: &Uuid, document_id: &Uuid) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let now = Utc::now();

        tx.execute(
            "UPDATE ingestion_attempts
             SET status = ?1, progress = 100, finished_at = ?2, error_code = NULL, error_message = NULL
             WHERE id = ?3",
            params![AttemptStatus::Ready.as_str(), now, attempt_id.to_string()],
        )?;
        tx.execute(
            "UPDATE documents SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![DocumentStatus::Ready.as_str(), now, document_id.to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Mark a failed run with a truncated message and code
    ///
    /// Terminal attempts stay immutable: a READY attempt is never demoted,
    /// and the document only follows the attempt. A late failure mark after
    /// a concurrent redelivery already finished updates zero attempt rows
    /// and must then leave the document alone too.
    pub fn mark_failed(
        &self,
        attempt_id: &Uuid,
        document_id: &Uuid,
        error_code: &str,
        error_message: &str,
    ) -> Result<()> {
        let message: String = error_message.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let now = Utc::now();

        let changed = tx.execute(
            "UPDATE ingestion_attempts
             SET status = ?1, finished_at = ?2, error_code = ?3, error_message = ?4
             WHERE id = ?5 AND status NOT IN ('READY', 'FAILED')",
            params![
                AttemptStatus::Failed.as_str(),
                now,
                error_code,
                message,
                attempt_id.to_string()
            ],
        )?;
        if changed > 0 {
            tx.execute(
                "UPDATE documents SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![
                    DocumentStatus::Failed.as_str(),
                    now,
                    document_id.to_string()
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Replace all chunks of an attempt in one transaction
    ///
    /// Deleting before inserting keeps retries safe: a partially-written
    /// previous run can never leave duplicates or stranded chunk sets. A
    /// vector/chunk count divergence aborts before any write.
    pub fn replace_chunks(
        &self,
        attempt_id: &Uuid,
        chunks: &[DocumentChunk],
        vectors: &[Vec<f32>],
    ) -> Result<()> {
        if chunks.len() != vectors.len() {
            return Err(Error::CountMismatch {
                expected: chunks.len(),
                actual: vectors.len(),
            });
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM document_chunks WHERE attempt_id = ?1",
            params![attempt_id.to_string()],
        )?;

        {
            let mut stmt = tx.prepare(
                r#"INSERT INTO document_chunks
                   (id, document_id, attempt_id, chunk_index, content, pages, embedding)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            )?;
            for (chunk, vector) in chunks.iter().zip(vectors) {
                stmt.execute(params![
                    chunk.id.to_string(),
                    chunk.document_id.to_string(),
                    chunk.attempt_id.to_string(),
                    chunk.chunk_index as i64,
                    chunk.content,
                    serde_json::to_string(&chunk.pages)?,
                    vector_to_blob(vector),
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Number of chunks stored for an attempt
    pub fn count_chunks(&self, attempt_id: &Uuid) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM document_chunks WHERE attempt_id = ?1",
            params![attempt_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Nearest chunks to a query vector, scoped to one owner's documents
    ///
    /// Ranked by descending cosine similarity (`1 - cosine_distance`); ties
    /// break by chunk insertion order, which the stable sort preserves from
    /// the rowid scan order.
    pub fn nearest(&self, query: &[f32], owner_id: &str, limit: usize) -> Result<Vec<RankedChunk>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"SELECT c.id, c.document_id, d.filename, c.content, c.pages, c.embedding
               FROM document_chunks c
               JOIN documents d ON d.id = c.document_id
               WHERE d.owner_id = ?1 AND c.embedding IS NOT NULL
               ORDER BY c.rowid ASC"#,
        )?;

        let rows = stmt.query_map(params![owner_id], |row| {
            let id: String = row.get(0)?;
            let document_id: String = row.get(1)?;
            let filename: String = row.get(2)?;
            let content: String = row.get(3)?;
            let pages: String = row.get(4)?;
            let embedding: Vec<u8> = row.get(5)?;
            Ok((id, document_id, filename, content, pages, embedding))
        })?;

        let mut ranked = Vec::new();
        for row in rows {
            let (id, document_id, filename, content, pages, embedding) = row?;
            let vector = blob_to_vector(&embedding);
            ranked.push(RankedChunk {
                chunk_id: parse_uuid(&id)?,
                document_id: parse_uuid(&document_id)?,
                document_name: Some(filename),
                content,
                pages: serde_json::from_str(&pages)?,
                similarity: cosine_similarity(query, &vector),
            });
        }

        // Stable sort keeps insertion order for equal similarities
        ranked.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(limit);
        Ok(ranked)
    }

    /// Row counts across the main tables
    pub fn stats(&self) -> Result<DbStats> {
        let conn = self.conn.lock();
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };
        Ok(DbStats {
            documents: count("SELECT COUNT(*) FROM documents")?,
            attempts: count("SELECT COUNT(*) FROM ingestion_attempts")?,
            chunks: count("SELECT COUNT(*) FROM document_chunks")?,
            embedded_chunks: count(
                "SELECT COUNT(*) FROM document_chunks WHERE embedding IS NOT NULL",
            )?,
        })
    }
}

/// Cosine similarity; zero-norm vectors compare as 0
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

fn blob_to_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        .collect()
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| Error::database(format!("corrupt uuid '{raw}': {e}")))
}

fn row_to_document(row: &Row<'_>) -> rusqlite::Result<Document> {
    let id: String = row.get(0)?;
    let status: String = row.get(6)?;
    Ok(Document {
        id: Uuid::parse_str(&id).map_err(|e| conversion_error(0, e))?,
        owner_id: row.get(1)?,
        filename: row.get(2)?,
        mime_type: row.get(3)?,
        size_bytes: row.get::<_, i64>(4)? as u64,
        storage_key: row.get(5)?,
        status: DocumentStatus::parse(&status)
            .ok_or_else(|| conversion_error(6, format!("unknown document status '{status}'")))?,
        created_at: row.get::<_, DateTime<Utc>>(7)?,
        updated_at: row.get::<_, DateTime<Utc>>(8)?,
    })
}

fn row_to_attempt(row: &Row<'_>) -> rusqlite::Result<IngestionAttempt> {
    let id: String = row.get(0)?;
    let document_id: String = row.get(1)?;
    let status: String = row.get(2)?;
    Ok(IngestionAttempt {
        id: Uuid::parse_str(&id).map_err(|e| conversion_error(0, e))?,
        document_id: Uuid::parse_str(&document_id).map_err(|e| conversion_error(1, e))?,
        status: AttemptStatus::parse(&status)
            .ok_or_else(|| conversion_error(2, format!("unknown attempt status '{status}'")))?,
        progress: row.get::<_, i64>(3)? as u8,
        error_code: row.get(4)?,
        error_message: row.get(5)?,
        started_at: row.get::<_, Option<DateTime<Utc>>>(6)?,
        finished_at: row.get::<_, Option<DateTime<Utc>>>(7)?,
    })
}

fn conversion_error(
    index: usize,
    source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, source.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocumentChunk;

    fn seeded_db() -> (Database, Document, IngestionAttempt) {
        let db = Database::in_memory().unwrap();
        let mut document = Document::new("user-1", "report.pdf", "application/pdf", 42, "k/report");
        document.status = DocumentStatus::Uploaded;
        db.insert_document(&document).unwrap();
        let attempt = IngestionAttempt::new(document.id);
        db.insert_attempt(&attempt).unwrap();
        (db, document, attempt)
    }

    fn chunk(document: &Document, attempt: &IngestionAttempt, index: u32) -> DocumentChunk {
        DocumentChunk::new(
            document.id,
            attempt.id,
            index,
            format!("chunk {index}"),
            vec![1],
        )
    }

    #[test]
    fn claim_promotes_initiated_attempt() {
        let (db, document, attempt) = seeded_db();
        let message = IngestionMessage {
            document_id: document.id,
            attempt_id: attempt.id,
        };

        match db.claim_attempt(&message).unwrap() {
            ClaimOutcome::Claimed { document, attempt } => {
                assert_eq!(attempt.status, AttemptStatus::Processing);
                assert!(attempt.started_at.is_some());
                assert_eq!(document.status, DocumentStatus::Processing);
            }
            other => panic!("expected claim, got {other:?}"),
        }

        let stored = db.get_attempt(&attempt.id).unwrap().unwrap();
        assert_eq!(stored.status, AttemptStatus::Processing);
    }

    #[test]
    fn terminal_attempt_short_circuits() {
        let (db, document, attempt) = seeded_db();
        db.mark_ready(&attempt.id, &document.id).unwrap();

        let message = IngestionMessage {
            document_id: document.id,
            attempt_id: attempt.id,
        };
        match db.claim_attempt(&message).unwrap() {
            ClaimOutcome::AlreadyHandled { status } => assert_eq!(status, AttemptStatus::Ready),
            other => panic!("expected no-op, got {other:?}"),
        }
    }

    #[test]
    fn mismatched_document_is_integrity_error() {
        let (db, _document, attempt) = seeded_db();
        let other = Document::new("user-1", "other.pdf", "application/pdf", 1, "k/other");
        db.insert_document(&other).unwrap();

        let message = IngestionMessage {
            document_id: other.id,
            attempt_id: attempt.id,
        };
        let err = db.claim_attempt(&message).unwrap_err();
        assert_eq!(err.code(), "INTEGRITY");
    }

    #[test]
    fn missing_rows_are_not_found() {
        let (db, document, _attempt) = seeded_db();
        let message = IngestionMessage {
            document_id: document.id,
            attempt_id: Uuid::new_v4(),
        };
        assert_eq!(db.claim_attempt(&message).unwrap_err().code(), "NOT_FOUND");
    }

    #[test]
    fn replace_chunks_is_retry_safe() {
        let (db, document, attempt) = seeded_db();

        // First (partial) run wrote 3 chunks
        let partial: Vec<_> = (0..3).map(|i| chunk(&document, &attempt, i)).collect();
        let vectors = vec![vec![0.1f32; 4]; 3];
        db.replace_chunks(&attempt.id, &partial, &vectors).unwrap();
        assert_eq!(db.count_chunks(&attempt.id).unwrap(), 3);

        // Retry writes the full set; no duplicates, no stranded rows
        let full: Vec<_> = (0..5).map(|i| chunk(&document, &attempt, i)).collect();
        let vectors = vec![vec![0.2f32; 4]; 5];
        db.replace_chunks(&attempt.id, &full, &vectors).unwrap();
        assert_eq!(db.count_chunks(&attempt.id).unwrap(), 5);
    }

    #[test]
    fn count_mismatch_aborts_before_any_write() {
        let (db, document, attempt) = seeded_db();
        let chunks: Vec<_> = (0..2).map(|i| chunk(&document, &attempt, i)).collect();
        let err = db
            .replace_chunks(&attempt.id, &chunks, &[vec![0.0f32; 4]])
            .unwrap_err();
        assert_eq!(err.code(), "COUNT_MISMATCH");
        assert_eq!(db.count_chunks(&attempt.id).unwrap(), 0);
    }

    #[test]
    fn mark_failed_truncates_and_respects_terminal_attempts() {
        let (db, document, attempt) = seeded_db();
        let long_message = "x".repeat(2_000);
        db.mark_failed(&attempt.id, &document.id, "DEPENDENCY", &long_message)
            .unwrap();

        let stored = db.get_attempt(&attempt.id).unwrap().unwrap();
        assert_eq!(stored.status, AttemptStatus::Failed);
        assert_eq!(stored.error_code.as_deref(), Some("DEPENDENCY"));
        assert_eq!(stored.error_message.unwrap().len(), MAX_ERROR_MESSAGE_LEN);

        // A READY attempt is never demoted
        let attempt2 = IngestionAttempt::new(document.id);
        db.insert_attempt(&attempt2).unwrap();
        db.mark_ready(&attempt2.id, &document.id).unwrap();
        db.mark_failed(&attempt2.id, &document.id, "DEPENDENCY", "late failure")
            .unwrap();
        let stored = db.get_attempt(&attempt2.id).unwrap().unwrap();
        assert_eq!(stored.status, AttemptStatus::Ready);
    }

    #[test]
    fn late_failure_mark_never_demotes_ready_document() {
        let (db, document, attempt) = seeded_db();
        db.mark_ready(&attempt.id, &document.id).unwrap();

        // A slow first delivery reporting failure after the redelivery
        // already completed must leave both records READY
        db.mark_failed(&attempt.id, &document.id, "DEPENDENCY", "timed out")
            .unwrap();

        let stored = db.get_attempt(&attempt.id).unwrap().unwrap();
        assert_eq!(stored.status, AttemptStatus::Ready);
        assert!(stored.error_code.is_none());
        let doc = db.get_document(&document.id).unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Ready);
    }

    #[test]
    fn nearest_ranks_by_similarity_and_scopes_by_owner() {
        let (db, document, attempt) = seeded_db();

        let chunks: Vec<_> = (0..3).map(|i| chunk(&document, &attempt, i)).collect();
        // Cosine similarities against [1, 0]: 0.95-ish, ~1.0, ~0.8
        let vectors = vec![
            vec![0.95f32, 0.312],
            vec![1.0f32, 0.0],
            vec![0.8f32, 0.6],
        ];
        db.replace_chunks(&attempt.id, &chunks, &vectors).unwrap();

        // Another user's chunks must never appear
        let foreign_doc = {
            let mut d = Document::new("user-2", "other.pdf", "application/pdf", 1, "k/o");
            d.status = DocumentStatus::Ready;
            d
        };
        db.insert_document(&foreign_doc).unwrap();
        let foreign_attempt = IngestionAttempt::new(foreign_doc.id);
        db.insert_attempt(&foreign_attempt).unwrap();
        let foreign_chunk = DocumentChunk::new(
            foreign_doc.id,
            foreign_attempt.id,
            0,
            "foreign".to_string(),
            vec![],
        );
        db.replace_chunks(&foreign_attempt.id, &[foreign_chunk], &[vec![1.0f32, 0.0]])
            .unwrap();

        let results = db.nearest(&[1.0, 0.0], "user-1", 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "chunk 1");
        assert_eq!(results[1].content, "chunk 0");
        assert!(results[0].similarity > results[1].similarity);
        assert!(results.iter().all(|r| r.document_id == document.id));
    }

    #[test]
    fn nearest_breaks_ties_by_insertion_order() {
        let (db, document, attempt) = seeded_db();
        let chunks: Vec<_> = (0..3).map(|i| chunk(&document, &attempt, i)).collect();
        let vectors = vec![vec![1.0f32, 0.0]; 3];
        db.replace_chunks(&attempt.id, &chunks, &vectors).unwrap();

        let results = db.nearest(&[1.0, 0.0], "user-1", 3).unwrap();
        let contents: Vec<_> = results.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["chunk 0", "chunk 1", "chunk 2"]);
    }

    #[test]
    fn nearest_returns_empty_for_user_without_chunks() {
        let db = Database::in_memory().unwrap();
        let results = db.nearest(&[1.0, 0.0], "nobody", 5).unwrap();
        assert!(results.is_empty());
    }
}
