use chrono::Duration;

/// Default inactivity window before an open session is force-closed.
pub const DEFAULT_GAP_THRESHOLD_SECS: u64 = 60 * 60;

/// Configuration for the session segmentation pass.
#[derive(Debug, Clone)]
pub struct SegmentationConfig {
    /// Inactivity of at least this many seconds between the latest activity
    /// and the next event splits the session.
    pub gap_threshold_secs: u64,
}

impl SegmentationConfig {
    pub fn with_gap_threshold_secs(gap_threshold_secs: u64) -> Self {
        Self { gap_threshold_secs }
    }

    pub fn gap_threshold(&self) -> Duration {
        // chrono caps durations at i64::MAX milliseconds
        let secs = i64::try_from(self.gap_threshold_secs)
            .unwrap_or(i64::MAX)
            .min(i64::MAX / 1_000);
        Duration::seconds(secs)
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            gap_threshold_secs: DEFAULT_GAP_THRESHOLD_SECS,
        }
    }
}
