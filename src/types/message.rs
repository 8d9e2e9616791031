//! Wire payloads: ingestion queue messages and status events
//!
//! Payloads are parsed into strongly-typed structures at the boundary;
//! anything that does not match the expected shape is rejected there instead
//! of being trusted at every call site.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::document::DocumentStatus;

/// Event type discriminator for document lifecycle events
pub const STATUS_EVENT_TYPE: &str = "document.status.changed";

/// Queue payload triggering one ingestion run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IngestionMessage {
    pub document_id: Uuid,
    pub attempt_id: Uuid,
}

impl IngestionMessage {
    /// Parse a raw queue body
    ///
    /// Non-JSON bodies and missing fields are validation failures; they are
    /// never retried productively.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw)
            .map_err(|e| Error::validation(format!("malformed ingestion message: {e}")))
    }

    pub fn to_json(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("ingestion message serializes")
    }
}

/// Document lifecycle event published on a per-user channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    /// Always [`STATUS_EVENT_TYPE`]
    #[serde(rename = "type")]
    pub event_type: String,
    pub document_id: Uuid,
    pub user_id: String,
    pub status: DocumentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt_id: Option<Uuid>,
    pub ts: DateTime<Utc>,
}

impl StatusEvent {
    pub fn new(
        document_id: Uuid,
        user_id: impl Into<String>,
        status: DocumentStatus,
        attempt_id: Option<Uuid>,
    ) -> Self {
        Self {
            event_type: STATUS_EVENT_TYPE.to_string(),
            document_id,
            user_id: user_id.into(),
            status,
            attempt_id,
            ts: Utc::now(),
        }
    }

    /// Parse a published payload, rejecting unknown event types
    ///
    /// Consumers discard anything that fails here rather than crashing the
    /// subscriber loop.
    pub fn parse(raw: &str) -> Result<Self> {
        let event: StatusEvent = serde_json::from_str(raw)
            .map_err(|e| Error::validation(format!("malformed status event: {e}")))?;
        if event.event_type != STATUS_EVENT_TYPE {
            return Err(Error::validation(format!(
                "unexpected event type '{}'",
                event.event_type
            )));
        }
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_message() {
        let doc = Uuid::new_v4();
        let attempt = Uuid::new_v4();
        let raw = format!(r#"{{"documentId":"{doc}","attemptId":"{attempt}"}}"#);
        let msg = IngestionMessage::parse(raw.as_bytes()).unwrap();
        assert_eq!(msg.document_id, doc);
        assert_eq!(msg.attempt_id, attempt);
    }

    #[test]
    fn rejects_non_json_body() {
        let err = IngestionMessage::parse(b"not json").unwrap_err();
        assert_eq!(err.code(), "VALIDATION");
    }

    #[test]
    fn rejects_missing_fields() {
        let raw = format!(r#"{{"documentId":"{}"}}"#, Uuid::new_v4());
        let err = IngestionMessage::parse(raw.as_bytes()).unwrap_err();
        assert_eq!(err.code(), "VALIDATION");
    }

    #[test]
    fn status_event_round_trip() {
        let event = StatusEvent::new(
            Uuid::new_v4(),
            "user-1",
            DocumentStatus::Ready,
            Some(Uuid::new_v4()),
        );
        let raw = serde_json::to_string(&event).unwrap();
        assert!(raw.contains("\"document.status.changed\""));
        assert!(raw.contains("\"READY\""));
        let parsed = StatusEvent::parse(&raw).unwrap();
        assert_eq!(parsed.document_id, event.document_id);
    }

    #[test]
    fn status_event_rejects_wrong_type() {
        let raw = format!(
            r#"{{"type":"something.else","documentId":"{}","userId":"u","status":"READY","ts":"2026-01-01T00:00:00Z"}}"#,
            Uuid::new_v4()
        );
        assert!(StatusEvent::parse(&raw).is_err());
    }
}
