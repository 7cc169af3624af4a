//! Flat VEVENT scanner for booking feeds.
//!
//! Only the handful of properties a booking ledger needs are read; nested
//! components are not tracked (a second `BEGIN:VEVENT` restarts the block).

use tracing::{debug, warn};

use super::datetime::{normalize, Params};
use super::event::{CalendarEvent, EventStatus};

/// A property value together with its parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawValue {
    pub value: String,
    pub params: Params,
}

/// One `BEGIN:VEVENT` .. `END:VEVENT` block before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEventBlock {
    pub uid: Option<String>,
    pub summary: Option<String>,
    pub status: Option<String>,
    pub description: Option<String>,
    pub dtstart: Option<RawValue>,
    pub dtend: Option<RawValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidEvent {
    #[error("missing UID")]
    MissingUid,

    #[error("missing DTSTART")]
    MissingStart,

    #[error("missing DTEND")]
    MissingEnd,

    #[error("unparsable DTSTART {0:?}")]
    InvalidStart(String),

    #[error("unparsable DTEND {0:?}")]
    InvalidEnd(String),
}

impl RawEventBlock {
    /// Validate the block and normalize its dates.
    pub fn into_event(self) -> Result<CalendarEvent, InvalidEvent> {
        let uid = self
            .uid
            .filter(|u| !u.trim().is_empty())
            .ok_or(InvalidEvent::MissingUid)?;

        let dtstart = self.dtstart.ok_or(InvalidEvent::MissingStart)?;
        let start = normalize(&dtstart.value, &dtstart.params)
            .ok_or_else(|| InvalidEvent::InvalidStart(dtstart.value.clone()))?;

        let dtend = self.dtend.ok_or(InvalidEvent::MissingEnd)?;
        let end = normalize(&dtend.value, &dtend.params)
            .ok_or_else(|| InvalidEvent::InvalidEnd(dtend.value.clone()))?;

        let status = self
            .status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(EventStatus::parse)
            .unwrap_or_default();

        Ok(CalendarEvent {
            uid,
            summary: self.summary,
            description: self.description,
            status,
            start,
            end,
        })
    }
}

/// Normalize line endings and unfold continuation lines.
///
/// A line starting with a space or tab continues the previous one; its first
/// character is dropped. Blank lines are discarded.
pub fn unfold(raw: &str) -> Vec<String> {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");
    let mut lines: Vec<String> = Vec::new();

    for line in normalized.split('\n') {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = lines.last_mut() {
                last.push_str(&line[1..]);
            }
        } else if !line.trim().is_empty() {
            lines.push(line.to_string());
        }
    }

    lines
}

/// Split `NAME;P1=V1;P2=V2:value` into name, params and value.
fn split_property(line: &str) -> Option<(String, Params, String)> {
    let colon = line.find(':')?;
    if colon == 0 {
        return None;
    }

    let (key_part, value) = (&line[..colon], &line[colon + 1..]);
    let mut params = Params::new();

    let name = match key_part.find(';') {
        Some(semicolon) if semicolon > 0 => {
            for pair in key_part[semicolon + 1..].split(';') {
                if let Some((k, v)) = pair.split_once('=') {
                    if !k.is_empty() {
                        params.insert(k.to_uppercase(), v.to_string());
                    }
                }
            }
            &key_part[..semicolon]
        }
        _ => key_part,
    };

    Some((name.to_uppercase(), params, value.to_string()))
}

/// Collect every closed VEVENT block, without validation.
pub fn parse_blocks(raw: &str) -> Vec<RawEventBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<RawEventBlock> = None;

    for line in unfold(raw) {
        let line = line.trim();

        if line == "BEGIN:VEVENT" {
            current = Some(RawEventBlock::default());
            continue;
        }
        if line == "END:VEVENT" {
            if let Some(block) = current.take() {
                blocks.push(block);
            }
            continue;
        }

        let Some(block) = current.as_mut() else {
            continue;
        };
        let Some((name, params, value)) = split_property(line) else {
            continue;
        };

        match name.as_str() {
            "UID" => block.uid = Some(value),
            "SUMMARY" => block.summary = Some(value),
            "STATUS" => block.status = Some(value),
            "DTSTART" => block.dtstart = Some(RawValue { value, params }),
            "DTEND" => block.dtend = Some(RawValue { value, params }),
            "DESCRIPTION" => block.description = Some(value.replace("\\n", "\n")),
            _ => {}
        }
    }

    if current.is_some() {
        debug!("Feed ended inside an unterminated VEVENT block; block dropped");
    }

    blocks
}

/// Parse feed text into valid events. Invalid blocks are logged and dropped.
pub fn parse(raw: &str) -> Vec<CalendarEvent> {
    parse_blocks(raw)
        .into_iter()
        .filter_map(|block| {
            let uid = block.uid.clone().unwrap_or_default();
            match block.into_event() {
                Ok(event) => Some(event),
                Err(reason) => {
                    warn!("Skipping incomplete event (uid {:?}): {}", uid, reason);
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const FEED: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:-//Example//Bookings//EN\r\n\
BEGIN:VEVENT\r\n\
DTSTART;VALUE=DATE:20240110\r\n\
DTEND;VALUE=DATE:20240113\r\n\
UID:booking-1@example.com\r\n\
SUMMARY:Reserved\r\n\
STATUS:CONFIRMED\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
DTSTART:20240201T150000Z\r\n\
DTEND:20240205T110000Z\r\n\
UID:booking-2@example.com\r\n\
SUMMARY:Not available\r\n\
DESCRIPTION:Phone: +1 555\\nNotes: late arrival\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    #[test]
    fn parses_valid_events() {
        let events = parse(FEED);
        assert_eq!(events.len(), 2);

        let first = &events[0];
        assert_eq!(first.uid, "booking-1@example.com");
        assert_eq!(first.summary.as_deref(), Some("Reserved"));
        assert_eq!(first.status, EventStatus::Confirmed);
        assert_eq!(first.start, Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap());
        assert_eq!(first.end, Utc.with_ymd_and_hms(2024, 1, 13, 0, 0, 0).unwrap());

        let second = &events[1];
        assert_eq!(second.status, EventStatus::Confirmed);
        assert_eq!(
            second.description.as_deref(),
            Some("Phone: +1 555\nNotes: late arrival")
        );
        assert_eq!(second.start, Utc.with_ymd_and_hms(2024, 2, 1, 15, 0, 0).unwrap());
    }

    #[test]
    fn unfolds_continuation_lines() {
        let raw = "SUMMARY:Long\r\n  guest name\r\n\tcontinued\nUID:x";
        assert_eq!(unfold(raw), vec!["SUMMARY:Long guest namecontinued", "UID:x"]);
    }

    #[test]
    fn unfold_handles_bare_cr_and_blank_lines() {
        let raw = "A:1\r\rB:2\n\n\nC:3\n";
        assert_eq!(unfold(raw), vec!["A:1", "B:2", "C:3"]);
    }

    #[test]
    fn leading_continuation_without_previous_line_is_dropped() {
        assert_eq!(unfold(" orphan\nA:1"), vec!["A:1"]);
    }

    #[test]
    fn folded_summary_reaches_event() {
        let raw = "BEGIN:VEVENT\nUID:a\nDTSTART:20240101\nDTEND:20240102\nSUMMARY:Jane\n  Doe (2 guests)\nEND:VEVENT\n";
        let events = parse(raw);
        assert_eq!(events[0].summary.as_deref(), Some("Jane Doe (2 guests)"));
    }

    #[test]
    fn blocks_missing_required_fields_are_dropped() {
        let raw = "\
BEGIN:VEVENT\nDTSTART:20240101\nDTEND:20240102\nEND:VEVENT\n\
BEGIN:VEVENT\nUID:no-start\nDTEND:20240102\nEND:VEVENT\n\
BEGIN:VEVENT\nUID:no-end\nDTSTART:20240101\nEND:VEVENT\n\
BEGIN:VEVENT\nUID:bad-date\nDTSTART:2024-01-01\nDTEND:20240102\nEND:VEVENT\n\
BEGIN:VEVENT\nUID:   \nDTSTART:20240101\nDTEND:20240102\nEND:VEVENT\n\
BEGIN:VEVENT\nUID:ok\nDTSTART:20240101\nDTEND:20240102\nEND:VEVENT\n";

        assert_eq!(parse_blocks(raw).len(), 6);
        let events = parse(raw);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].uid, "ok");
    }

    #[test]
    fn into_event_reports_reason() {
        let block = RawEventBlock {
            uid: Some("x".to_string()),
            dtstart: Some(RawValue {
                value: "garbage".to_string(),
                params: Params::new(),
            }),
            ..Default::default()
        };
        assert_eq!(
            block.into_event(),
            Err(InvalidEvent::InvalidStart("garbage".to_string()))
        );
    }

    #[test]
    fn property_names_and_params_are_case_insensitive() {
        let raw = "BEGIN:VEVENT\nuid:lower\ndtstart;value=DATE:20240301\nDtEnd;Value=DATE:20240303\nstatus:tentative\nEND:VEVENT\n";
        let blocks = parse_blocks(raw);
        assert_eq!(blocks[0].uid.as_deref(), Some("lower"));
        assert_eq!(
            blocks[0].dtstart.as_ref().unwrap().params.get("VALUE").map(String::as_str),
            Some("DATE")
        );

        let events = parse(raw);
        assert_eq!(events[0].status, EventStatus::Tentative);
    }

    #[test]
    fn second_begin_restarts_block() {
        let raw = "BEGIN:VEVENT\nUID:first\nBEGIN:VEVENT\nUID:second\nDTSTART:20240101\nDTEND:20240102\nEND:VEVENT\n";
        let events = parse(raw);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].uid, "second");
    }

    #[test]
    fn value_keeps_colons_after_the_first() {
        let raw = "BEGIN:VEVENT\nUID:a\nDTSTART:20240101\nDTEND:20240102\nSUMMARY:Check-in: 15:00\nEND:VEVENT\n";
        assert_eq!(parse(raw)[0].summary.as_deref(), Some("Check-in: 15:00"));
    }

    #[test]
    fn unknown_properties_and_lines_outside_blocks_are_ignored() {
        let raw = "UID:outside\nBEGIN:VEVENT\nX-CUSTOM:1\nUID:in\nDTSTART:20240101\nDTEND:20240102\nEND:VEVENT\nSUMMARY:after\n";
        let events = parse(raw);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].summary, None);
    }

    #[test]
    fn blank_status_reads_as_confirmed() {
        let raw = "BEGIN:VEVENT\nUID:a\nDTSTART:20240101\nDTEND:20240102\nSTATUS:\nEND:VEVENT\n\
BEGIN:VEVENT\nUID:b\nDTSTART:20240101\nDTEND:20240102\nSTATUS:   \nEND:VEVENT\n";
        let events = parse(raw);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.status == EventStatus::Confirmed));
    }
}
