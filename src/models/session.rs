use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::event::Event;

/// A bounded run of one user's activity.
///
/// `events` holds the interior events in arrival order. When a boundary is
/// synthesized from ordinary activity, that event also appears in `events`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub start_event: Event,
    pub end_event: Event,
    pub events: Vec<Event>,
}

impl Session {
    pub fn new(start_event: Event, end_event: Event, events: Vec<Event>) -> Self {
        Self {
            start_event,
            end_event,
            events,
        }
    }

    /// Absolute wall-clock span between the two boundaries.
    pub fn duration(&self) -> Duration {
        (self.end_event.timestamp - self.start_event.timestamp).abs()
    }

    pub fn user_id(&self) -> &str {
        &self.start_event.user_id
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum IgnoreReason {
    /// A flush found nothing but a start marker.
    StartOnly,
    /// Activity or an end marker with no opening marker before it.
    OrphanedTail,
    /// An end marker replaced by a later one before the session closed.
    SupersededEnd,
}

impl IgnoreReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            IgnoreReason::StartOnly => "startOnly",
            IgnoreReason::OrphanedTail => "orphanedTail",
            IgnoreReason::SupersededEnd => "supersededEnd",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            IgnoreReason::StartOnly => "session consists only of its opening event",
            IgnoreReason::OrphanedTail => "events without a preceding session_start",
            IgnoreReason::SupersededEnd => "session_end replaced by a later session_end",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IgnoredEvent {
    pub event: Event,
    pub reason: IgnoreReason,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_labels_match_serialized_form() {
        for reason in [
            IgnoreReason::StartOnly,
            IgnoreReason::OrphanedTail,
            IgnoreReason::SupersededEnd,
        ] {
            let serialized = serde_json::to_string(&reason).unwrap();
            assert_eq!(serialized, format!("\"{}\"", reason.as_str()));
        }
    }
}
