//! Similarity retrieval over ingested chunks

mod search;

pub use search::Retriever;
