//! Error types for the ingestion and answer pipelines

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline errors
///
/// The variants mirror how failures are handled downstream: validation and
/// integrity problems are never retried productively, dependency failures may
/// be transient and are left for queue redelivery, and count mismatches are
/// invariant violations that always fail the attempt.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input at a boundary (queue payload, question text)
    #[error("Validation error: {0}")]
    Validation(String),

    /// A referenced entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Referential mismatch between entities (e.g. attempt vs. message)
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Document type outside the supported set
    #[error("Unsupported document type: {0}")]
    UnsupportedType(String),

    /// Parsing succeeded but produced no extractable text
    #[error("No extractable text in document: {0}")]
    EmptyContent(String),

    /// Produced vector count diverged from chunk count
    #[error("Count mismatch: expected {expected} vectors, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    /// An external collaborator (object store, embeddings, LLM) failed
    #[error("Dependency '{service}' failed: {message}")]
    Dependency { service: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a not-found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create an integrity error
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity(message.into())
    }

    /// Create a dependency error for a named service
    pub fn dependency(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Dependency {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create a database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    /// Stable machine-readable code persisted on failed attempts
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Integrity(_) => "INTEGRITY",
            Self::UnsupportedType(_) => "UNSUPPORTED_TYPE",
            Self::EmptyContent(_) => "EMPTY_CONTENT",
            Self::CountMismatch { .. } => "COUNT_MISMATCH",
            Self::Dependency { .. } => "DEPENDENCY",
            Self::Config(_) => "CONFIG",
            Self::Database(_) => "DATABASE",
            Self::Io(_) => "IO",
            Self::Json(_) => "JSON",
            Self::Http(_) => "HTTP",
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(err.to_string())
    }
}
