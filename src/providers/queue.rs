//! Message queue contract with at-least-once delivery semantics
//!
//! A received message stays invisible for a visibility window; if it is not
//! acknowledged before the window elapses it returns to the ready queue and
//! may be redelivered. The ingestion coordinator's idempotency rules make
//! redelivery safe.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

use crate::error::Result;

/// A message handed to a consumer
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Receipt handle for ack/nack
    pub receipt: u64,
    /// Raw message body
    pub body: Vec<u8>,
    /// How many times this message has been delivered, including this one
    pub delivery_count: u32,
}

/// Queue depth snapshot
#[derive(Debug, Clone, Serialize)]
pub struct QueueDepths {
    pub ready: usize,
    pub in_flight: usize,
    pub dead_letter: usize,
}

/// Trait for the ingestion message queue
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Enqueue a message body
    async fn send(&self, body: Vec<u8>) -> Result<()>;

    /// Long-poll for the next message, waiting up to `wait`
    async fn receive(&self, wait: Duration) -> Result<Option<Delivery>>;

    /// Acknowledge successful processing; the message is removed for good
    async fn ack(&self, receipt: u64) -> Result<()>;

    /// Return the message to the ready queue for redelivery
    async fn nack(&self, receipt: u64) -> Result<()>;

    /// Park the message on the dead-letter queue
    async fn dead_letter(&self, receipt: u64) -> Result<()>;

    /// Current queue depths
    fn depths(&self) -> QueueDepths;

    /// Provider name for logging
    fn name(&self) -> &str;
}

#[derive(Debug)]
struct StoredMessage {
    body: Vec<u8>,
    delivery_count: u32,
}

#[derive(Debug)]
struct InFlightMessage {
    message: StoredMessage,
    deadline: Instant,
}

#[derive(Default)]
struct QueueInner {
    next_receipt: u64,
    ready: VecDeque<StoredMessage>,
    in_flight: HashMap<u64, InFlightMessage>,
    dead: Vec<StoredMessage>,
}

impl QueueInner {
    /// Move expired in-flight messages back to the ready queue
    fn requeue_expired(&mut self, now: Instant) {
        let expired: Vec<u64> = self
            .in_flight
            .iter()
            .filter(|(_, m)| m.deadline <= now)
            .map(|(receipt, _)| *receipt)
            .collect();

        for receipt in expired {
            if let Some(in_flight) = self.in_flight.remove(&receipt) {
                tracing::debug!(receipt, "visibility timeout elapsed, requeueing message");
                self.ready.push_back(in_flight.message);
            }
        }
    }

    /// Earliest in-flight deadline, if any
    fn next_deadline(&self) -> Option<Instant> {
        self.in_flight.values().map(|m| m.deadline).min()
    }
}

/// In-process queue used for development and tests
///
/// Faithful to the at-least-once contract: unacknowledged messages become
/// visible again after the configured visibility timeout with an incremented
/// delivery count.
pub struct InMemoryQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
    visibility_timeout: Duration,
}

impl InMemoryQueue {
    pub fn new(visibility_timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(QueueInner::default()),
            notify: Notify::new(),
            visibility_timeout,
        }
    }

    fn try_receive(&self) -> Option<Delivery> {
        let mut inner = self.inner.lock();
        inner.requeue_expired(Instant::now());

        let mut message = inner.ready.pop_front()?;
        message.delivery_count += 1;
        let delivery = Delivery {
            receipt: {
                inner.next_receipt += 1;
                inner.next_receipt
            },
            body: message.body.clone(),
            delivery_count: message.delivery_count,
        };
        inner.in_flight.insert(
            delivery.receipt,
            InFlightMessage {
                message,
                deadline: Instant::now() + self.visibility_timeout,
            },
        );
        Some(delivery)
    }

    /// How long a waiting receiver may sleep before it must re-check
    fn sleep_budget(&self, wait_deadline: Instant) -> Duration {
        let inner = self.inner.lock();
        let mut until = wait_deadline;
        if let Some(deadline) = inner.next_deadline() {
            until = until.min(deadline);
        }
        until.saturating_duration_since(Instant::now())
    }
}

#[async_trait]
impl MessageQueue for InMemoryQueue {
    async fn send(&self, body: Vec<u8>) -> Result<()> {
        self.inner.lock().ready.push_back(StoredMessage {
            body,
            delivery_count: 0,
        });
        self.notify.notify_waiters();
        Ok(())
    }

    async fn receive(&self, wait: Duration) -> Result<Option<Delivery>> {
        let wait_deadline = Instant::now() + wait;

        loop {
            if let Some(delivery) = self.try_receive() {
                return Ok(Some(delivery));
            }
            if Instant::now() >= wait_deadline {
                return Ok(None);
            }
            let budget = self.sleep_budget(wait_deadline).max(Duration::from_millis(1));
            let _ = tokio::time::timeout(budget, self.notify.notified()).await;
        }
    }

    async fn ack(&self, receipt: u64) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.in_flight.remove(&receipt).is_none() {
            // The visibility window may already have elapsed; at-least-once
            // semantics make a late ack a harmless no-op.
            tracing::debug!(receipt, "ack for unknown receipt ignored");
        }
        Ok(())
    }

    async fn nack(&self, receipt: u64) -> Result<()> {
        let mut inner = self.inner.lock();
        if let Some(in_flight) = inner.in_flight.remove(&receipt) {
            inner.ready.push_back(in_flight.message);
            self.notify.notify_waiters();
        }
        Ok(())
    }

    async fn dead_letter(&self, receipt: u64) -> Result<()> {
        let mut inner = self.inner.lock();
        if let Some(in_flight) = inner.in_flight.remove(&receipt) {
            tracing::warn!(
                receipt,
                delivery_count = in_flight.message.delivery_count,
                "message routed to dead-letter queue"
            );
            inner.dead.push(in_flight.message);
        }
        Ok(())
    }

    fn depths(&self) -> QueueDepths {
        let inner = self.inner.lock();
        QueueDepths {
            ready: inner.ready.len(),
            in_flight: inner.in_flight.len(),
            dead_letter: inner.dead.len(),
        }
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}
