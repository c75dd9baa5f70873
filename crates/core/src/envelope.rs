//! The inbound event envelope and its validation rules.

use crate::error::EnvelopeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The message carried by an [`Event`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payload {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<HashMap<String, serde_json::Value>>,
}

/// A normalized inbound event, the unit handed to `HandleEvent`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub source: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub ts: DateTime<Utc>,
    pub payload: Payload,
}

impl Event {
    /// Decode and validate an event from its JSON wire form.
    pub fn parse(bytes: &[u8]) -> Result<Self, EventParseError> {
        let event: Event = serde_json::from_slice(bytes).map_err(EventParseError::Decode)?;
        event.validate().map_err(EventParseError::Invalid)?;
        Ok(event)
    }

    /// Structural validation: non-blank `source`/`type`, non-zero `ts`.
    pub fn validate(&self) -> Result<(), EnvelopeError> {
        if self.source.trim().is_empty() {
            return Err(EnvelopeError::MissingSource);
        }
        if self.event_type.trim().is_empty() {
            return Err(EnvelopeError::MissingType);
        }
        if self.ts.timestamp() == 0 && self.ts.timestamp_subsec_nanos() == 0 {
            return Err(EnvelopeError::MissingTimestamp);
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventParseError {
    #[error("malformed event body: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("invalid event: {0}")]
    Invalid(#[source] EnvelopeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> Event {
        Event {
            source: "scheduler".into(),
            event_type: "cron.tick".into(),
            ts: Utc::now(),
            payload: Payload {
                message: "tick".into(),
                data: None,
            },
        }
    }

    #[test]
    fn valid_event_passes() {
        assert!(sample_event().validate().is_ok());
    }

    #[test]
    fn blank_source_rejected() {
        let mut e = sample_event();
        e.source = "  ".into();
        assert!(matches!(e.validate(), Err(EnvelopeError::MissingSource)));
    }

    #[test]
    fn blank_type_rejected() {
        let mut e = sample_event();
        e.event_type = "".into();
        assert!(matches!(e.validate(), Err(EnvelopeError::MissingType)));
    }

    #[test]
    fn zero_timestamp_rejected() {
        let mut e = sample_event();
        e.ts = DateTime::from_timestamp(0, 0).unwrap();
        assert!(matches!(
            e.validate(),
            Err(EnvelopeError::MissingTimestamp)
        ));
    }

    #[test]
    fn round_trips_through_json() {
        let event = sample_event();
        let bytes = serde_json::to_vec(&event).unwrap();
        let parsed = Event::parse(&bytes).unwrap();
        assert_eq!(parsed.source, event.source);
        assert_eq!(parsed.event_type, event.event_type);
        assert_eq!(parsed.ts.timestamp(), event.ts.timestamp());
        assert_eq!(parsed.payload, event.payload);
    }

    #[test]
    fn data_omitted_when_absent() {
        let event = sample_event();
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("\"data\""));
    }

    #[test]
    fn parse_rejects_malformed_json() {
        assert!(matches!(
            Event::parse(b"not json"),
            Err(EventParseError::Decode(_))
        ));
    }

    #[test]
    fn parse_rejects_invalid_envelope() {
        let bytes = br#"{"source":"","type":"x","ts":"2026-01-01T00:00:00Z","payload":{"message":"m"}}"#;
        assert!(matches!(
            Event::parse(bytes),
            Err(EventParseError::Invalid(EnvelopeError::MissingSource))
        ));
    }
}
