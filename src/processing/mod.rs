//! Queue-driven ingestion processing

mod coordinator;
mod worker;

pub use coordinator::IngestionCoordinator;
pub use worker::IngestWorker;
