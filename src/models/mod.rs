pub mod event;
pub mod session;

pub use event::{
    event_type_from_str, format_timestamp, parse_timestamp, Event, EventType, SESSION_END,
    SESSION_START,
};
pub use session::{IgnoreReason, IgnoredEvent, Session};
