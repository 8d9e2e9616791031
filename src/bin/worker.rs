//! Ingestion worker binary
//!
//! Wires the SQLite store, filesystem object store, in-process queue and
//! Ollama providers together and consumes ingestion messages until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use askdocs::config::AppConfig;
use askdocs::ingestion::{ExtractorRegistry, TextChunker};
use askdocs::processing::{IngestWorker, IngestionCoordinator};
use askdocs::providers::{
    ChannelStatusPublisher, EmbeddingClient, FsObjectStore, InMemoryQueue, MessageQueue,
    OllamaClient, OllamaEmbedder,
};
use askdocs::storage::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::var("ASKDOCS_CONFIG") {
        Ok(path) => {
            info!(path = %path, "loading configuration file");
            AppConfig::load(&path)?
        }
        Err(_) => AppConfig::default(),
    };

    let database = Arc::new(Database::new(&config.storage.database_path)?);
    let object_store = Arc::new(FsObjectStore::new(config.storage.object_root.clone())?);
    let queue = Arc::new(InMemoryQueue::new(Duration::from_secs(
        config.queue.visibility_timeout_secs,
    )));

    let ollama = Arc::new(OllamaClient::new(
        config.llm.base_url.clone(),
        config.llm.timeout_secs,
        config.llm.max_retries,
    )?);
    if !ollama.health_check().await? {
        tracing::warn!(base_url = %config.llm.base_url, "ollama endpoint not reachable at startup");
    }
    let embedder = Arc::new(OllamaEmbedder::new(ollama.clone(), &config.embeddings));

    let coordinator = Arc::new(IngestionCoordinator::new(
        database.clone(),
        object_store,
        EmbeddingClient::new(embedder, config.embeddings.batch_size),
        ExtractorRegistry::with_defaults(),
        TextChunker::from_config(&config.chunking),
        Arc::new(ChannelStatusPublisher::new()),
        config.storage.bucket.clone(),
    ));

    let worker = Arc::new(IngestWorker::new(
        queue.clone(),
        coordinator,
        &config.queue,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_count = num_cpus::get().min(4);
    info!(worker_count, queue = queue.name(), "starting ingest workers");

    let mut handles = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        let worker = worker.clone();
        let shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move { worker.run(shutdown).await }));
    }

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    for handle in handles {
        let _ = handle.await;
    }

    let stats = database.stats()?;
    info!(
        documents = stats.documents,
        attempts = stats.attempts,
        chunks = stats.chunks,
        "worker stopped"
    );
    Ok(())
}
