//! Multi-user driver: one independent segmentation pass per user.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;

use crate::models::Event;
use crate::segmentation::algorithm::{segment_events, SegmentationResult};
use crate::segmentation::config::SegmentationConfig;
use crate::{log_debug, log_info};

const ENABLE_LOGS: bool = true;

/// Split a mixed event list into per-user streams sorted by timestamp.
///
/// The sort is stable, so events sharing a timestamp keep their input order.
pub fn partition_by_user<I>(events: I) -> BTreeMap<String, Vec<Event>>
where
    I: IntoIterator<Item = Event>,
{
    let mut streams: BTreeMap<String, Vec<Event>> = BTreeMap::new();
    for event in events {
        streams.entry(event.user_id.clone()).or_default().push(event);
    }

    for stream in streams.values_mut() {
        stream.sort_by_key(|event| event.timestamp);
    }

    streams
}

/// Segment every user's stream in parallel on the blocking pool.
pub async fn segment_users<I>(
    events: I,
    config: &SegmentationConfig,
) -> Result<BTreeMap<String, SegmentationResult>>
where
    I: IntoIterator<Item = Event>,
{
    let streams = partition_by_user(events);
    log_debug!("segmenting {} user streams", streams.len());

    let handles: Vec<(String, JoinHandle<SegmentationResult>)> = streams
        .into_iter()
        .map(|(user_id, stream)| {
            let config = config.clone();
            let handle = tokio::task::spawn_blocking(move || segment_events(stream, &config));
            (user_id, handle)
        })
        .collect();

    let mut results = BTreeMap::new();
    for (user_id, handle) in handles {
        let result = handle
            .await
            .with_context(|| format!("segmentation task for user {user_id} failed"))?;
        log_info!(
            "finished session extraction for user {}: {} sessions, {} ignored events",
            user_id,
            result.sessions.len(),
            result.ignored.len()
        );
        results.insert(user_id, result);
    }

    Ok(results)
}
