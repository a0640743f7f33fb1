//! Tracking event data model.
//!
//! Events arrive already classified by the Android app or the browser
//! extension. Only `action` and `timestamp` matter for segmentation; the
//! remaining fields ride along untouched.

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const SESSION_START: &str = "session_start";
pub const SESSION_END: &str = "session_end";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Browser,
    Android,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Browser => "BROWSER",
            EventType::Android => "ANDROID",
        }
    }
}

pub fn event_type_from_str(value: &str) -> Result<EventType> {
    match value {
        "BROWSER" => Ok(EventType::Browser),
        "ANDROID" => Ok(EventType::Android),
        other => Err(anyhow!("unknown event type '{other}'")),
    }
}

/// A single timestamped user interaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(alias = "event_type")]
    pub event_type: EventType,
    #[serde(alias = "user_id")]
    pub user_id: String,
    pub action: String,
    #[serde(
        serialize_with = "serialize_timestamp",
        deserialize_with = "deserialize_timestamp"
    )]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(
        default,
        alias = "scroll_position",
        skip_serializing_if = "Option::is_none"
    )]
    pub scroll_position: Option<i64>,
    #[serde(
        default,
        alias = "estimated_tweets_scrolled",
        skip_serializing_if = "Option::is_none"
    )]
    pub estimated_tweets_scrolled: Option<i64>,
}

impl Event {
    pub fn new(
        event_type: EventType,
        user_id: impl Into<String>,
        action: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type,
            user_id: user_id.into(),
            action: action.into(),
            timestamp,
            target: None,
            selector: None,
            scroll_position: None,
            estimated_tweets_scrolled: None,
        }
    }

    pub fn is_session_start(&self) -> bool {
        self.action == SESSION_START
    }

    pub fn is_session_end(&self) -> bool {
        self.action == SESSION_END
    }
}

/// Parse an event timestamp into an absolute UTC instant.
///
/// Accepts RFC 3339 with any offset. The Android app writes local date-times
/// without a zone designator (`2020-11-03T14:00:05.603`); those are taken as UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|err| anyhow!("invalid timestamp '{value}': {err}"))
}

/// RFC 3339 in UTC with milliseconds, widened to nanoseconds when finer
/// digits are present.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    let format = if timestamp.timestamp_subsec_nanos() % 1_000_000 == 0 {
        SecondsFormat::Millis
    } else {
        SecondsFormat::Nanos
    };
    timestamp.to_rfc3339_opts(format, true)
}

fn serialize_timestamp<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_timestamp(timestamp))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}
