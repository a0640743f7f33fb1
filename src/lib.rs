//! Reconstructs interaction sessions from timestamped tracking events.
//!
//! Producers (the Android app and the browser extension) post classified
//! events; [`db::Database`] keeps them as a local event log, and
//! [`segmentation`] turns each user's sorted stream into [`models::Session`]s
//! plus the events that could not be attached to any session.

pub mod analysis;
pub mod db;
pub mod metrics;
pub mod models;
pub mod segmentation;
pub mod settings;
pub mod utils;

pub use analysis::AnalysisController;
pub use db::Database;
pub use models::{Event, EventType, IgnoreReason, IgnoredEvent, Session};
pub use segmentation::{
    segment_events, segment_events_with, segment_users, SegmentationConfig, SegmentationObserver,
    SegmentationResult, SessionSegmenter,
};
pub use settings::SettingsStore;
