//! Core domain types

pub mod answer;
pub mod document;
pub mod message;

pub use answer::{Answer, AnswerSource};
pub use document::{
    AttemptStatus, Document, DocumentChunk, DocumentStatus, IngestionAttempt, RankedChunk,
};
pub use message::{IngestionMessage, StatusEvent, STATUS_EVENT_TYPE};
