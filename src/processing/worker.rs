//! Long-polling queue consumer
//!
//! The worker receives deliveries, hands them to the coordinator, and decides
//! the message's fate: ack on success or idempotent no-op, nack for
//! redelivery on failure, dead-letter once the delivery cap is reached.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::QueueConfig;
use crate::error::Result;
use crate::processing::IngestionCoordinator;
use crate::providers::MessageQueue;

/// Queue consumer loop for ingestion messages
pub struct IngestWorker {
    queue: Arc<dyn MessageQueue>,
    coordinator: Arc<IngestionCoordinator>,
    poll_wait: Duration,
    max_deliveries: u32,
}

impl IngestWorker {
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        coordinator: Arc<IngestionCoordinator>,
        config: &QueueConfig,
    ) -> Self {
        Self {
            queue,
            coordinator,
            poll_wait: Duration::from_secs(config.poll_wait_secs),
            max_deliveries: config.max_deliveries.max(1),
        }
    }

    /// Consume messages until the shutdown signal flips
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(queue = self.queue.name(), "ingest worker started");
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    // A dropped sender means nobody can signal us anymore;
                    // treat it like a shutdown instead of spinning on Err
                    if changed.is_err() || *shutdown.borrow() {
                        info!("ingest worker shutting down");
                        return;
                    }
                }
                result = self.poll_once() => {
                    if let Err(e) = result {
                        // Queue transport failure; back off briefly before retrying
                        error!("queue receive failed: {e}");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }
    }

    /// One receive/process/settle cycle; returns whether a message was handled
    pub async fn poll_once(&self) -> Result<bool> {
        let Some(delivery) = self.queue.receive(self.poll_wait).await? else {
            return Ok(false);
        };

        match self.coordinator.handle(&delivery.body).await {
            Ok(()) => {
                self.queue.ack(delivery.receipt).await?;
            }
            Err(e) => {
                if delivery.delivery_count >= self.max_deliveries {
                    warn!(
                        receipt = delivery.receipt,
                        delivery_count = delivery.delivery_count,
                        code = e.code(),
                        "delivery cap reached, dead-lettering message"
                    );
                    self.queue.dead_letter(delivery.receipt).await?;
                } else {
                    warn!(
                        receipt = delivery.receipt,
                        delivery_count = delivery.delivery_count,
                        code = e.code(),
                        "processing failed, returning message for redelivery"
                    );
                    self.queue.nack(delivery.receipt).await?;
                }
            }
        }
        Ok(true)
    }
}
