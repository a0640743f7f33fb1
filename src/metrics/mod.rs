//! Per-session figures the downstream charts are built from.

mod types;

pub use types::{InteractionCounts, SessionMetrics, UserMetrics};

use crate::models::Session;

const SCROLL_ACTION: &str = "scroll";

/// Sessions spanning a day or more are tracking artifacts, not usage.
pub const MAX_PLAUSIBLE_SESSION_SECS: i64 = 24 * 60 * 60;

/// Tweets scrolled during a session: the last scroll estimate minus the first.
///
/// `None` when no scroll event carries an estimate.
pub fn scrolled_tweets(session: &Session) -> Option<i64> {
    let mut estimates = session
        .events
        .iter()
        .filter(|event| event.action == SCROLL_ACTION)
        .map(|event| event.estimated_tweets_scrolled);

    let first = estimates.next()?;
    let last = estimates.last().unwrap_or(first)?;
    Some(last - first.unwrap_or(0))
}

pub fn summarize_session(session: &Session) -> SessionMetrics {
    let mut interactions = InteractionCounts::default();
    for event in &session.events {
        interactions.record(event.target.as_deref());
    }

    SessionMetrics {
        user_id: session.user_id().to_string(),
        started_at: session.start_event.timestamp,
        ended_at: session.end_event.timestamp,
        duration_secs: session.duration().num_seconds(),
        event_count: session.events.len(),
        scrolled_tweets: scrolled_tweets(session),
        interactions,
    }
}

/// Aggregate one user's sessions, skipping implausibly long or empty spans
/// when averaging durations.
pub fn summarize_user(sessions: &[Session]) -> UserMetrics {
    let mut metrics = UserMetrics {
        session_count: sessions.len(),
        ..UserMetrics::default()
    };

    let mut counted = 0usize;
    for session in sessions {
        let summary = summarize_session(session);
        metrics.interactions.merge(&summary.interactions);

        if summary.duration_secs > 0 && summary.duration_secs < MAX_PLAUSIBLE_SESSION_SECS {
            metrics.total_duration_secs += summary.duration_secs;
            counted += 1;
        }
    }

    if counted > 0 {
        metrics.mean_duration_secs = metrics.total_duration_secs as f64 / counted as f64;
    }

    metrics
}
