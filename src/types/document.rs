//! Document, attempt and chunk types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Document lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Created,
    Uploaded,
    Processing,
    Ready,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Uploaded => "UPLOADED",
            Self::Processing => "PROCESSING",
            Self::Ready => "READY",
            Self::Failed => "FAILED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "CREATED" => Some(Self::Created),
            "UPLOADED" => Some(Self::Uploaded),
            "PROCESSING" => Some(Self::Processing),
            "READY" => Some(Self::Ready),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One user-owned upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document ID
    pub id: Uuid,
    /// Owning user
    pub owner_id: String,
    /// Original filename
    pub filename: String,
    /// Declared MIME type
    pub mime_type: String,
    /// Size in bytes
    pub size_bytes: u64,
    /// Object store key for the raw bytes
    pub storage_key: String,
    /// Lifecycle status
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Create a document record in its initial state
    pub fn new(
        owner_id: impl Into<String>,
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        size_bytes: u64,
        storage_key: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            filename: filename.into(),
            mime_type: mime_type.into(),
            size_bytes,
            storage_key: storage_key.into(),
            status: DocumentStatus::Created,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Status of one ingestion run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    Initiated,
    Processing,
    Ready,
    Failed,
}

impl AttemptStatus {
    /// READY and FAILED absorb repeat deliveries as no-ops
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initiated => "INITIATED",
            Self::Processing => "PROCESSING",
            Self::Ready => "READY",
            Self::Failed => "FAILED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "INITIATED" => Some(Self::Initiated),
            "PROCESSING" => Some(Self::Processing),
            "READY" => Some(Self::Ready),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One processing run for a document
///
/// A document may accumulate several attempts across retries, but only one is
/// active at a time; terminal attempts are immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionAttempt {
    /// Unique attempt ID
    pub id: Uuid,
    /// Document this attempt processes
    pub document_id: Uuid,
    /// Run status
    pub status: AttemptStatus,
    /// Completion percentage (0-100)
    pub progress: u8,
    /// Machine-readable failure code
    pub error_code: Option<String>,
    /// Truncated failure message
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl IngestionAttempt {
    /// Create a fresh attempt for a document
    pub fn new(document_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            status: AttemptStatus::Initiated,
            progress: 0,
            error_code: None,
            error_message: None,
            started_at: None,
            finished_at: None,
        }
    }
}

/// A contiguous text span of a document produced by one attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Unique chunk ID
    pub id: Uuid,
    /// Parent document
    pub document_id: Uuid,
    /// Attempt that produced this chunk
    pub attempt_id: Uuid,
    /// 0-based position within the document, stable ordering
    pub chunk_index: u32,
    /// Text content
    pub content: String,
    /// Source pages, sorted ascending and de-duplicated
    pub pages: Vec<u32>,
    /// Embedding vector; None until written
    pub embedding: Option<Vec<f32>>,
}

impl DocumentChunk {
    pub fn new(
        document_id: Uuid,
        attempt_id: Uuid,
        chunk_index: u32,
        content: String,
        pages: Vec<u32>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            attempt_id,
            chunk_index,
            content,
            pages,
            embedding: None,
        }
    }
}

/// A chunk returned from similarity search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedChunk {
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    /// Filename of the owning document
    pub document_name: Option<String>,
    pub content: String,
    pub pages: Vec<u32>,
    /// 1 minus cosine distance; higher is more relevant
    pub similarity: f32,
}
