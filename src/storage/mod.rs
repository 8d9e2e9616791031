//! SQLite-backed persistence for documents, attempts and chunks

mod database;

pub use database::{ClaimOutcome, Database, DbStats};
