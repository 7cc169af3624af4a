//! iCal feed parsing: line unfolding, VEVENT scanning and date normalization.

pub mod datetime;
pub mod event;
pub mod parse;

pub use datetime::{normalize, Params};
pub use event::{CalendarEvent, EventStatus};
pub use parse::{parse, parse_blocks, unfold, InvalidEvent, RawEventBlock};
