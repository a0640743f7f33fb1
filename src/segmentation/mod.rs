pub mod algorithm;
pub mod config;
pub mod observer;
pub mod users;

pub use algorithm::{segment_events, segment_events_with, SegmentationResult, SessionSegmenter};
pub use config::{SegmentationConfig, DEFAULT_GAP_THRESHOLD_SECS};
pub use observer::{LogObserver, NoopObserver, RecordingObserver, SegmentationObserver};
pub use users::{partition_by_user, segment_users};
