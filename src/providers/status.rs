//! Best-effort fan-out of document lifecycle events

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::types::StatusEvent;

/// Capacity of each per-user broadcast channel
const CHANNEL_CAPACITY: usize = 64;

/// Trait for publishing document status events
///
/// Publishing is best-effort: a failure here must never fail the ingestion
/// pipeline, so implementations log and swallow their own errors.
#[async_trait]
pub trait StatusPublisher: Send + Sync {
    /// Publish one lifecycle event on the owning user's channel
    async fn publish(&self, event: &StatusEvent);

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// In-process publisher with lazily created per-user broadcast channels
///
/// Channels are created on first use (publish or subscribe); events published
/// while nobody listens are dropped, which is the intended best-effort
/// behavior.
pub struct ChannelStatusPublisher {
    channels: DashMap<String, broadcast::Sender<String>>,
}

impl ChannelStatusPublisher {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    fn channel(&self, user_id: &str) -> broadcast::Sender<String> {
        self.channels
            .entry(user_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Subscribe to one user's event stream
    pub fn subscribe(&self, user_id: &str) -> StatusSubscription {
        StatusSubscription {
            receiver: self.channel(user_id).subscribe(),
        }
    }
}

impl Default for ChannelStatusPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatusPublisher for ChannelStatusPublisher {
    async fn publish(&self, event: &StatusEvent) {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("failed to serialize status event: {e}");
                return;
            }
        };
        // A send error only means there are no subscribers right now.
        let _ = self.channel(&event.user_id).send(payload);
    }

    fn name(&self) -> &str {
        "channel-status"
    }
}

/// A subscription to one user's status events
///
/// Malformed payloads are discarded silently so a bad message can never crash
/// the subscriber loop.
pub struct StatusSubscription {
    receiver: broadcast::Receiver<String>,
}

impl StatusSubscription {
    /// Wait for the next parseable event; ends with `None` when the channel
    /// closes.
    pub async fn next_event(&mut self) -> Option<StatusEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(payload) => match StatusEvent::parse(&payload) {
                    Ok(event) => return Some(event),
                    Err(e) => {
                        tracing::debug!("discarding unparseable status payload: {e}");
                    }
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "status subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocumentStatus;
    use uuid::Uuid;

    #[tokio::test]
    async fn delivers_events_to_matching_user() {
        let publisher = ChannelStatusPublisher::new();
        let mut sub = publisher.subscribe("user-1");

        let event = StatusEvent::new(Uuid::new_v4(), "user-1", DocumentStatus::Ready, None);
        publisher.publish(&event).await;

        let received = sub.next_event().await.unwrap();
        assert_eq!(received.document_id, event.document_id);
        assert_eq!(received.status, DocumentStatus::Ready);
    }

    #[tokio::test]
    async fn other_users_do_not_receive_the_event() {
        let publisher = ChannelStatusPublisher::new();
        let mut other = publisher.subscribe("user-2");

        let event = StatusEvent::new(Uuid::new_v4(), "user-1", DocumentStatus::Failed, None);
        publisher.publish(&event).await;

        let got = tokio::time::timeout(std::time::Duration::from_millis(20), other.next_event())
            .await;
        assert!(got.is_err(), "user-2 must not see user-1 events");
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_no_op() {
        let publisher = ChannelStatusPublisher::new();
        let event = StatusEvent::new(Uuid::new_v4(), "user-3", DocumentStatus::Processing, None);
        // Must not panic or error
        publisher.publish(&event).await;
    }
}
