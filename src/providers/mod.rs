//! Provider abstractions for the external collaborators
//!
//! The pipelines consume the object store, queue, embedding provider, LLM and
//! status channel through these narrow traits so every component can run
//! against fakes in tests and against managed services in production.

pub mod embedding;
pub mod llm;
pub mod object_store;
pub mod ollama;
pub mod queue;
pub mod status;

pub use embedding::{EmbeddingClient, EmbeddingProvider};
pub use llm::{ChatMessage, ChatRole, LlmProvider};
pub use object_store::{FsObjectStore, ObjectStore};
pub use ollama::{OllamaClient, OllamaEmbedder, OllamaLlm};
pub use queue::{Delivery, InMemoryQueue, MessageQueue, QueueDepths};
pub use status::{ChannelStatusPublisher, StatusPublisher, StatusSubscription};
