//! askdocs: ask questions of your own documents
//!
//! Two pipelines share one SQLite store:
//!
//! - **Ingestion**: a queue-driven worker fetches uploaded files from the
//!   object store, extracts text with page tracking, chunks it, embeds the
//!   chunks and persists them. The state machine is idempotent under
//!   at-least-once delivery.
//! - **Answering**: questions are embedded, matched against the owner's
//!   chunks by cosine similarity, and answered by an LLM pinned to the
//!   retrieved excerpts, with citations back to document and page.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod processing;
pub mod providers;
pub mod retrieval;
pub mod storage;
pub mod types;

pub use config::AppConfig;
pub use error::{Error, Result};
