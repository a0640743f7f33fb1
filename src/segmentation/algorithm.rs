use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::models::{Event, IgnoreReason, IgnoredEvent, Session};
use crate::segmentation::config::SegmentationConfig;
use crate::segmentation::observer::{LogObserver, SegmentationObserver};

/// Output of one segmentation pass over a single user's stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentationResult {
    /// Sessions in the order they were closed.
    pub sessions: Vec<Session>,
    /// Events that could not be attached, in the order they were dropped.
    pub ignored: Vec<IgnoredEvent>,
}

impl SegmentationResult {
    pub fn ignored_events(&self) -> impl Iterator<Item = &Event> {
        self.ignored.iter().map(|ignored| &ignored.event)
    }
}

/// Closing side of the session under construction.
#[derive(Debug, Clone)]
enum PendingEnd {
    /// An explicit `session_end` marker.
    Marker(Event),
    /// The pending start is a stale `session_end` that reopened a session;
    /// it doubles as a degenerate end.
    SameAsStart,
}

/// Single-pass session builder over one user's timestamp-sorted events.
///
/// Feed events with [`push`](Self::push) in stream order and collect the
/// result with [`finish`](Self::finish).
pub struct SessionSegmenter<O: SegmentationObserver = LogObserver> {
    gap_threshold: Duration,
    observer: O,
    pending_start: Option<Event>,
    pending_end: Option<PendingEnd>,
    interior: Vec<Event>,
    result: SegmentationResult,
}

impl<O: SegmentationObserver> SessionSegmenter<O> {
    pub fn new(config: &SegmentationConfig, observer: O) -> Self {
        Self {
            gap_threshold: config.gap_threshold(),
            observer,
            pending_start: None,
            pending_end: None,
            interior: Vec::new(),
            result: SegmentationResult::default(),
        }
    }

    pub fn push(&mut self, event: Event) {
        if event.is_session_start() {
            self.on_session_start(event);
        } else if event.is_session_end() {
            self.on_session_end(event);
        } else {
            self.on_activity(event);
        }
    }

    /// Close whatever is still pending and hand back the accumulated output.
    pub fn finish(mut self) -> SegmentationResult {
        // An incomplete trailing session is stored nevertheless
        self.flush(true);
        self.result
    }

    fn on_session_start(&mut self, event: Event) {
        self.flush(false);
        self.pending_start = Some(event);
    }

    fn on_session_end(&mut self, event: Event) {
        if self.within_gap(&event) {
            // Stay open past the marker: more activity may still follow.
            if let Some(PendingEnd::Marker(previous)) =
                self.pending_end.replace(PendingEnd::Marker(event))
            {
                self.ignore(previous, IgnoreReason::SupersededEnd);
            }
            return;
        }

        self.observer.on_warning(&format!(
            "session_end of user {} at {} arrived after the inactivity gap - closing at latest activity",
            event.user_id, event.timestamp
        ));
        self.flush(true);
        self.pending_start = Some(event);
        self.pending_end = Some(PendingEnd::SameAsStart);
    }

    fn on_activity(&mut self, event: Event) {
        if self.pending_start.is_some() && self.pending_end.is_some() {
            self.observer.on_warning(&format!(
                "creating new session with event of action '{}' because there was no session_start event",
                event.action
            ));
            self.flush(false);
            self.interior.push(event);
            return;
        }

        if !self.within_gap(&event) {
            self.observer.on_warning(&format!(
                "event '{}' of user {} at {} follows the inactivity gap - splitting session",
                event.action, event.user_id, event.timestamp
            ));
            self.flush(true);
        }
        self.interior.push(event);
    }

    fn latest_activity(&self) -> Option<&Event> {
        self.interior.last().or(self.pending_start.as_ref())
    }

    fn within_gap(&self, event: &Event) -> bool {
        match self.latest_activity() {
            Some(latest) => event.timestamp - latest.timestamp < self.gap_threshold,
            None => true,
        }
    }

    /// Turn the pending state into a session or into ignored events.
    ///
    /// With `promote_first`, a missing start is filled by the first interior
    /// event, which stays in the interior as well.
    fn flush(&mut self, promote_first: bool) {
        let interior = std::mem::take(&mut self.interior);
        let end = self.pending_end.take();
        let start = self.pending_start.take().or_else(|| {
            if promote_first {
                interior.first().cloned()
            } else {
                None
            }
        });

        match (start, end) {
            (Some(start), Some(PendingEnd::Marker(end))) => {
                self.result.sessions.push(Session::new(start, end, interior));
            }
            (Some(start), _) => match interior.last().cloned() {
                Some(last) => {
                    self.observer.on_warning(&format!(
                        "session of user {} has no session_end - closing it at its last '{}' event",
                        start.user_id, last.action
                    ));
                    self.result.sessions.push(Session::new(start, last, interior));
                }
                None => self.ignore(start, IgnoreReason::StartOnly),
            },
            (None, end) => {
                for event in interior {
                    self.ignore(event, IgnoreReason::OrphanedTail);
                }
                if let Some(PendingEnd::Marker(end)) = end {
                    self.ignore(end, IgnoreReason::OrphanedTail);
                }
            }
        }
    }

    fn ignore(&mut self, event: Event, reason: IgnoreReason) {
        self.observer.on_ignored(&event, reason);
        self.result.ignored.push(IgnoredEvent { event, reason });
    }
}

/// Segment one user's timestamp-sorted events, logging dropped fragments.
pub fn segment_events<I>(events: I, config: &SegmentationConfig) -> SegmentationResult
where
    I: IntoIterator<Item = Event>,
{
    segment_events_with(events, config, LogObserver)
}

/// Segment one user's timestamp-sorted events, reporting to `observer`.
pub fn segment_events_with<I, O>(
    events: I,
    config: &SegmentationConfig,
    observer: O,
) -> SegmentationResult
where
    I: IntoIterator<Item = Event>,
    O: SegmentationObserver,
{
    let mut segmenter = SessionSegmenter::new(config, observer);
    for event in events {
        segmenter.push(event);
    }
    segmenter.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventType, SESSION_END, SESSION_START};
    use crate::segmentation::observer::RecordingObserver;
    use chrono::{DateTime, TimeZone, Utc};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 11, 3, 14, 0, 5).unwrap()
    }

    fn at(action: &str, minutes: i64) -> Event {
        Event::new(
            EventType::Android,
            "123",
            action,
            base() + Duration::minutes(minutes),
        )
    }

    fn run(events: &[Event]) -> SegmentationResult {
        segment_events(events.to_vec(), &SegmentationConfig::default())
    }

    fn reasons(result: &SegmentationResult) -> Vec<(String, IgnoreReason)> {
        result
            .ignored
            .iter()
            .map(|ignored| (ignored.event.action.clone(), ignored.reason))
            .collect()
    }

    /// Every input event shows up somewhere, and nothing ignored is also in a session.
    fn assert_accounted(input: &[Event], result: &SegmentationResult) {
        let in_sessions = |event: &Event| {
            result.sessions.iter().any(|session| {
                &session.start_event == event
                    || &session.end_event == event
                    || session.events.contains(event)
            })
        };
        for event in input {
            let ignored = result.ignored_events().filter(|e| *e == event).count();
            assert!(
                in_sessions(event) ^ (ignored == 1),
                "event {event:?} not accounted exactly once"
            );
        }
    }

    #[test]
    fn start_and_end() {
        let (start, scroll, click, end) = (
            at(SESSION_START, 0),
            at("scroll", 1),
            at("click", 2),
            at(SESSION_END, 3),
        );
        let input = vec![start.clone(), scroll.clone(), click.clone(), end.clone()];
        let result = run(&input);

        assert_eq!(result.sessions, vec![Session::new(start, end, vec![scroll, click])]);
        assert!(result.ignored.is_empty());
        assert_accounted(&input, &result);
    }

    #[test]
    fn start_without_end_closes_at_last_activity() {
        let (start, scroll, click) = (at(SESSION_START, 0), at("scroll", 1), at("click", 2));
        let result = run(&[start.clone(), scroll.clone(), click.clone()]);

        assert_eq!(
            result.sessions,
            vec![Session::new(start, click.clone(), vec![scroll, click])]
        );
        assert!(result.ignored.is_empty());
    }

    #[test]
    fn end_without_start_promotes_first_activity() {
        let (scroll, click, end) = (at("scroll", 1), at("click", 2), at(SESSION_END, 3));
        let result = run(&[scroll.clone(), click.clone(), end.clone()]);

        assert_eq!(
            result.sessions,
            vec![Session::new(scroll.clone(), end, vec![scroll, click])]
        );
    }

    #[test]
    fn no_markers_at_all() {
        let (scroll, click) = (at("scroll", 1), at("click", 2));
        let result = run(&[scroll.clone(), click.clone()]);

        assert_eq!(
            result.sessions,
            vec![Session::new(scroll.clone(), click.clone(), vec![scroll, click])]
        );
    }

    #[test]
    fn two_complete_sessions() {
        let input = vec![
            at(SESSION_START, 0),
            at("scroll", 1),
            at("click", 2),
            at(SESSION_END, 3),
            at(SESSION_START, 10),
            at("scroll", 11),
            at("click", 12),
            at(SESSION_END, 13),
        ];
        let result = run(&input);

        assert_eq!(result.sessions.len(), 2);
        assert_eq!(result.sessions[0].start_event, input[0]);
        assert_eq!(result.sessions[0].end_event, input[3]);
        assert_eq!(result.sessions[0].events, input[1..3].to_vec());
        assert_eq!(result.sessions[1].start_event, input[4]);
        assert_eq!(result.sessions[1].end_event, input[7]);
        assert_eq!(result.sessions[1].events, input[5..7].to_vec());
        assert!(result.ignored.is_empty());
        assert_accounted(&input, &result);
    }

    #[test]
    fn previous_session_without_end() {
        let input = vec![
            at(SESSION_START, 0),
            at("scroll", 1),
            at("click", 2),
            at(SESSION_START, 10),
            at("scroll", 11),
            at("click", 12),
            at(SESSION_END, 13),
        ];
        let result = run(&input);

        assert_eq!(result.sessions.len(), 2);
        assert_eq!(result.sessions[0].start_event, input[0]);
        assert_eq!(result.sessions[0].end_event, input[2]);
        assert_eq!(result.sessions[0].events, input[1..3].to_vec());
        assert_eq!(result.sessions[1].start_event, input[3]);
        assert_eq!(result.sessions[1].end_event, input[6]);
        assert_eq!(result.sessions[1].events, input[4..6].to_vec());
    }

    #[test]
    fn activity_after_closed_session_seeds_next_one() {
        let input = vec![
            at(SESSION_START, 0),
            at("scroll", 1),
            at("click", 2),
            at(SESSION_END, 3),
            at("scroll", 11),
            at("click", 12),
            at(SESSION_END, 13),
        ];
        let mut observer = RecordingObserver::default();
        let result = segment_events_with(input.clone(), &SegmentationConfig::default(), &mut observer);

        assert_eq!(result.sessions.len(), 2);
        assert_eq!(result.sessions[0].start_event, input[0]);
        assert_eq!(result.sessions[0].end_event, input[3]);
        assert_eq!(result.sessions[1].start_event, input[4]);
        assert_eq!(result.sessions[1].end_event, input[6]);
        assert_eq!(result.sessions[1].events, input[4..6].to_vec());
        assert!(observer
            .warnings
            .iter()
            .any(|w| w.contains("because there was no session_start event")));
        assert_accounted(&input, &result);
    }

    #[test]
    fn dangling_starts_and_ends() {
        let input = vec![
            at(SESSION_START, 0),
            at(SESSION_START, 1),
            at("scroll", 2),
            at("click", 3),
            at(SESSION_END, 4),
            at(SESSION_END, 5),
            at(SESSION_START, 10),
            at(SESSION_START, 11),
            at("scroll", 12),
            at("click", 13),
            at("click", 14),
            at(SESSION_END, 15),
            at(SESSION_END, 16),
        ];
        let result = run(&input);

        assert_eq!(result.sessions.len(), 2);
        assert_eq!(result.sessions[0].start_event, input[1]);
        assert_eq!(result.sessions[0].end_event, input[5]);
        assert_eq!(result.sessions[0].events, input[2..4].to_vec());
        assert_eq!(result.sessions[1].start_event, input[7]);
        assert_eq!(result.sessions[1].end_event, input[12]);
        assert_eq!(result.sessions[1].events, input[8..11].to_vec());
        assert_eq!(
            reasons(&result),
            vec![
                (SESSION_START.to_string(), IgnoreReason::StartOnly),
                (SESSION_END.to_string(), IgnoreReason::SupersededEnd),
                (SESSION_START.to_string(), IgnoreReason::StartOnly),
                (SESSION_END.to_string(), IgnoreReason::SupersededEnd),
            ]
        );
        assert_accounted(&input, &result);
    }

    #[test]
    fn inactivity_gap_splits_session() {
        let input = vec![
            at(SESSION_START, 0),
            at("scroll", 1),
            at("click", 2),
            at("scroll", 122),
            at(SESSION_END, 123),
        ];
        let result = run(&input);

        assert_eq!(result.sessions.len(), 2);
        assert_eq!(
            result.sessions[0],
            Session::new(input[0].clone(), input[2].clone(), input[1..3].to_vec())
        );
        assert_eq!(
            result.sessions[1],
            Session::new(input[3].clone(), input[4].clone(), vec![input[3].clone()])
        );
        assert!(result.ignored.is_empty());
        assert_accounted(&input, &result);
    }

    #[test]
    fn gap_threshold_is_inclusive() {
        let exactly = vec![at("click", 0), at("click", 60)];
        assert_eq!(run(&exactly).sessions.len(), 2);

        let just_below = vec![
            at("click", 0),
            Event::new(
                EventType::Android,
                "123",
                "click",
                base() + Duration::minutes(60) - Duration::milliseconds(1),
            ),
        ];
        assert_eq!(run(&just_below).sessions.len(), 1);
    }

    #[test]
    fn gap_threshold_is_configurable() {
        let input = vec![at("scroll", 0), at("click", 10)];
        let config = SegmentationConfig::with_gap_threshold_secs(5 * 60);
        let result = segment_events(input, &config);
        assert_eq!(result.sessions.len(), 2);
    }

    #[test]
    fn stale_end_reopens_and_is_dropped_alone() {
        let input = vec![at(SESSION_START, 0), at("scroll", 1), at(SESSION_END, 180)];
        let result = run(&input);

        assert_eq!(
            result.sessions,
            vec![Session::new(
                input[0].clone(),
                input[1].clone(),
                vec![input[1].clone()]
            )]
        );
        assert_eq!(
            reasons(&result),
            vec![(SESSION_END.to_string(), IgnoreReason::StartOnly)]
        );
        assert_accounted(&input, &result);
    }

    #[test]
    fn recorded_end_closes_gap_split_session() {
        let input = vec![at("scroll", 0), at(SESSION_END, 1), at("click", 180)];
        let result = run(&input);

        assert_eq!(result.sessions.len(), 2);
        assert_eq!(
            result.sessions[0],
            Session::new(input[0].clone(), input[1].clone(), vec![input[0].clone()])
        );
        assert_eq!(
            result.sessions[1],
            Session::new(input[2].clone(), input[2].clone(), vec![input[2].clone()])
        );
        assert_accounted(&input, &result);
    }

    #[test]
    fn orphaned_tail_is_dropped_on_next_start() {
        let input = vec![
            at(SESSION_START, 0),
            at("scroll", 1),
            at(SESSION_END, 2),
            at("scroll", 3),
            at(SESSION_END, 4),
            at(SESSION_START, 5),
            at("click", 6),
            at(SESSION_END, 7),
        ];
        let result = run(&input);

        assert_eq!(result.sessions.len(), 2);
        assert_eq!(result.sessions[1].start_event, input[5]);
        assert_eq!(
            reasons(&result),
            vec![
                ("scroll".to_string(), IgnoreReason::OrphanedTail),
                (SESSION_END.to_string(), IgnoreReason::OrphanedTail),
            ]
        );
        assert_accounted(&input, &result);
    }

    #[test]
    fn unopened_activity_before_start_is_ignored() {
        let input = vec![
            at("scroll", 0),
            at("click", 1),
            at(SESSION_START, 2),
            at(SESSION_END, 3),
        ];
        let result = run(&input);

        assert_eq!(
            result.sessions,
            vec![Session::new(input[2].clone(), input[3].clone(), Vec::new())]
        );
        assert_eq!(
            reasons(&result),
            vec![
                ("scroll".to_string(), IgnoreReason::OrphanedTail),
                ("click".to_string(), IgnoreReason::OrphanedTail),
            ]
        );
    }

    #[test]
    fn lone_markers_are_ignored() {
        let result = run(&[at(SESSION_START, 0)]);
        assert!(result.sessions.is_empty());
        assert_eq!(
            reasons(&result),
            vec![(SESSION_START.to_string(), IgnoreReason::StartOnly)]
        );

        let result = run(&[at(SESSION_END, 0)]);
        assert!(result.sessions.is_empty());
        assert_eq!(
            reasons(&result),
            vec![(SESSION_END.to_string(), IgnoreReason::OrphanedTail)]
        );
    }

    #[test]
    fn empty_stream() {
        assert_eq!(run(&[]), SegmentationResult::default());
    }

    #[test]
    fn observer_sees_every_drop() {
        let input = vec![at(SESSION_START, 0), at(SESSION_START, 1), at(SESSION_END, 2)];
        let mut observer = RecordingObserver::default();
        let result = segment_events_with(input, &SegmentationConfig::default(), &mut observer);

        assert_eq!(observer.ignored, reasons(&result));
        assert_eq!(result.sessions.len(), 1);
    }

    #[test]
    fn rerun_is_deterministic() {
        let input = vec![
            at("scroll", 0),
            at(SESSION_START, 1),
            at(SESSION_START, 2),
            at("click", 3),
            at(SESSION_END, 200),
            at("scroll", 201),
            at(SESSION_END, 202),
        ];
        assert_eq!(run(&input), run(&input));
        assert_accounted(&input, &run(&input));
    }
}
