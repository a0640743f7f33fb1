//! Side channel for segmentation diagnostics.
//!
//! The segmenter reports every dropped fragment and every recovered anomaly
//! through a [`SegmentationObserver`] instead of logging on its own, so the
//! pass stays a pure function of its input.

use crate::models::{Event, IgnoreReason};

const ENABLE_LOGS: bool = true;

pub trait SegmentationObserver {
    /// An event was routed to the ignored output.
    fn on_ignored(&mut self, event: &Event, reason: IgnoreReason);

    /// A malformed stream was repaired without dropping anything.
    fn on_warning(&mut self, message: &str);
}

/// Default observer: forwards everything to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl SegmentationObserver for LogObserver {
    fn on_ignored(&mut self, event: &Event, reason: IgnoreReason) {
        crate::log_warn!(
            "dropping event '{}' of user {} at {} ({}): {}",
            event.action,
            event.user_id,
            event.timestamp,
            reason.as_str(),
            reason.description()
        );
    }

    fn on_warning(&mut self, message: &str) {
        crate::log_debug!("{message}");
    }
}

/// Observer that swallows everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SegmentationObserver for NoopObserver {
    fn on_ignored(&mut self, _event: &Event, _reason: IgnoreReason) {}

    fn on_warning(&mut self, _message: &str) {}
}

/// Observer that keeps what it was told, mostly for tests and audits.
#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    pub ignored: Vec<(String, IgnoreReason)>,
    pub warnings: Vec<String>,
}

impl SegmentationObserver for RecordingObserver {
    fn on_ignored(&mut self, event: &Event, reason: IgnoreReason) {
        self.ignored.push((event.action.clone(), reason));
    }

    fn on_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }
}

impl<T: SegmentationObserver + ?Sized> SegmentationObserver for &mut T {
    fn on_ignored(&mut self, event: &Event, reason: IgnoreReason) {
        (**self).on_ignored(event, reason);
    }

    fn on_warning(&mut self, message: &str) {
        (**self).on_warning(message);
    }
}
