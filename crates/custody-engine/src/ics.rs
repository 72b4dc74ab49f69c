//! iCalendar (`.ics`) text codec.
//!
//! [`decode`] is a best-effort line scanner: it isolates `VEVENT` blocks,
//! splits each content line into name, parameters, and value, and keeps
//! only events with a usable `SUMMARY` and `DTSTART`. It never fails;
//! broken input yields fewer (or zero) events.
//!
//! [`encode_schedule`] renders a custody schedule as a one-event calendar
//! with an `RRULE` derived from its pattern.

use tracing::debug;

use crate::model::{
    first_matching_date, floating_at, EventTime, NormalizedCalendarEvent, RecurrenceRule,
};
use crate::schedule::{CustodySchedule, SchedulePattern};

const PRODID: &str = "-//custody-engine//Custody Schedule//EN";
const MAX_LINE_OCTETS: usize = 75;

// ── Decode ──────────────────────────────────────────────────────────────────

/// Decode every well-formed `VEVENT` in `raw`, in document order.
///
/// # Examples
///
/// ```
/// use custody_engine::ics::decode;
///
/// let ics = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nSUMMARY:Custody pickup\r\n\
///            DTSTART:20250310T090000\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
/// let events = decode(ics);
/// assert_eq!(events.len(), 1);
/// assert_eq!(events[0].title, "Custody pickup");
/// assert_eq!(events[0].start_time.to_string(), "2025-03-10T09:00:00");
/// ```
pub fn decode(raw: &str) -> Vec<NormalizedCalendarEvent> {
    let mut events = Vec::new();
    let mut current: Option<EventFields> = None;
    let mut sub_depth = 0usize;
    let mut dropped = 0usize;

    for line in unfold_lines(raw) {
        let marker = line.trim().to_ascii_uppercase();

        if marker == "BEGIN:VEVENT" {
            if current.is_some() {
                // Unterminated block: abandon it and start over at this one.
                dropped += 1;
            }
            current = Some(EventFields::default());
            sub_depth = 0;
            continue;
        }

        if current.is_none() {
            continue;
        }

        if marker == "END:VEVENT" {
            if let Some(fields) = current.take() {
                match fields.build() {
                    Some(event) => events.push(event),
                    None => dropped += 1,
                }
            }
            sub_depth = 0;
        } else if marker == "END:VCALENDAR" {
            current = None;
            dropped += 1;
        } else if marker.starts_with("BEGIN:") {
            sub_depth += 1;
        } else if marker.starts_with("END:") {
            sub_depth = sub_depth.saturating_sub(1);
        } else if sub_depth == 0 {
            if let (Some(fields), Some(property)) = (current.as_mut(), Property::split(&line)) {
                fields.absorb(property);
            }
        }
    }

    if current.is_some() {
        dropped += 1;
    }
    if dropped > 0 {
        debug!(decoded = events.len(), dropped, "skipped unusable VEVENT blocks");
    }

    events
}

/// Join folded continuation lines. Accepts both CRLF and bare LF.
fn unfold_lines(raw: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for line in raw.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if let Some(rest) = line.strip_prefix([' ', '\t']) {
            if let Some(last) = lines.last_mut() {
                last.push_str(rest);
                continue;
            }
        }
        if !line.trim().is_empty() {
            lines.push(line.to_string());
        }
    }
    lines
}

/// One content line: `NAME;PARAM=...:VALUE`.
struct Property<'a> {
    name: String,
    value: &'a str,
}

impl<'a> Property<'a> {
    /// Split at the first `:` outside a quoted parameter value.
    fn split(line: &'a str) -> Option<Self> {
        let mut in_quotes = false;
        let mut colon = None;
        for (idx, ch) in line.char_indices() {
            match ch {
                '"' => in_quotes = !in_quotes,
                ':' if !in_quotes => {
                    colon = Some(idx);
                    break;
                }
                _ => {}
            }
        }
        let colon = colon?;
        let head = &line[..colon];
        let name = head.split(';').next().unwrap_or(head).trim();
        if name.is_empty() {
            return None;
        }
        Some(Property {
            name: name.to_ascii_uppercase(),
            value: &line[colon + 1..],
        })
    }
}

#[derive(Debug, Default)]
struct EventFields {
    summary: Option<String>,
    description: Option<String>,
    location: Option<String>,
    uid: Option<String>,
    dtstart: Option<String>,
    dtend: Option<String>,
    rrule: Option<String>,
}

impl EventFields {
    /// Record a property; the first occurrence of each name wins.
    fn absorb(&mut self, property: Property<'_>) {
        let slot = match property.name.as_str() {
            "SUMMARY" => &mut self.summary,
            "DESCRIPTION" => &mut self.description,
            "LOCATION" => &mut self.location,
            "UID" => &mut self.uid,
            "DTSTART" => &mut self.dtstart,
            "DTEND" => &mut self.dtend,
            "RRULE" => &mut self.rrule,
            _ => return,
        };
        if slot.is_none() {
            *slot = Some(property.value.to_string());
        }
    }

    fn build(self) -> Option<NormalizedCalendarEvent> {
        // The title is kept exactly as written; whitespace-only counts as missing.
        let title = self
            .summary
            .as_deref()
            .map(unescape_text)
            .filter(|t| !t.trim().is_empty())?;
        let start_time = EventTime::parse_ics(self.dtstart.as_deref()?).ok()?;
        let end_time = self
            .dtend
            .as_deref()
            .and_then(|v| EventTime::parse_ics(v).ok());

        if let Some(end) = end_time {
            if end.naive() < start_time.naive() {
                debug!(title = %title, "dropping event that ends before it starts");
                return None;
            }
        }

        let recurrence_rule = self.rrule.as_deref().and_then(RecurrenceRule::parse);

        Some(NormalizedCalendarEvent {
            title,
            description: non_empty(self.description.as_deref().map(unescape_text)),
            location: non_empty(self.location.as_deref().map(unescape_text)),
            start_time,
            end_time,
            external_id: non_empty(self.uid.map(|uid| uid.trim().to_string())),
            is_recurring: self.rrule.is_some(),
            recurrence_rule,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ── Encode ──────────────────────────────────────────────────────────────────

/// Render a schedule as a single-event iCalendar document.
///
/// `DTSTART`/`DTEND` are floating local times on the first date the schedule
/// applies to. Lines use CRLF endings and are folded at 75 octets.
pub fn encode_schedule(schedule: &CustodySchedule) -> String {
    let first_date = match schedule.pattern {
        SchedulePattern::Once => schedule.start_date,
        _ => first_matching_date(schedule.start_date, &schedule.days_of_week)
            .unwrap_or(schedule.start_date),
    };

    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        format!("PRODID:{PRODID}"),
        "CALSCALE:GREGORIAN".to_string(),
        "BEGIN:VEVENT".to_string(),
        format!("UID:{}@custody-engine", schedule.id),
        format!("DTSTAMP:{}", schedule.updated_at.format("%Y%m%dT%H%M%SZ")),
        format!(
            "DTSTART:{}",
            floating_at(first_date, schedule.start_time).to_ics_string()
        ),
        format!(
            "DTEND:{}",
            floating_at(first_date, schedule.end_time).to_ics_string()
        ),
        format!("SUMMARY:{}", escape_text(&schedule.name)),
    ];

    if let Some(notes) = schedule.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        lines.push(format!("DESCRIPTION:{}", escape_text(notes)));
    }
    if let Some(rule) = schedule.recurrence_rule() {
        lines.push(format!("RRULE:{}", rule.to_rrule_value()));
    }
    lines.push(format!("X-CUSTODY-VISIT-TYPE:{}", schedule.visit_type));
    lines.push("END:VEVENT".to_string());
    lines.push("END:VCALENDAR".to_string());

    let mut out = String::new();
    for line in &lines {
        out.push_str(&fold_line(line));
        out.push_str("\r\n");
    }
    out
}

// ── Text escaping and folding ───────────────────────────────────────────────

/// Escape a TEXT value: backslash, semicolon, comma, and newlines.
pub fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(ch),
        }
    }
    out
}

/// Reverse of [`escape_text`]. Unknown escapes are kept verbatim.
pub fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(c @ ('\\' | ';' | ',')) => out.push(c),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Fold a content line so no physical line exceeds 75 octets.
///
/// Continuation lines start with a single space, which counts toward their
/// length. Splits never land inside a UTF-8 sequence.
pub fn fold_line(line: &str) -> String {
    if line.len() <= MAX_LINE_OCTETS {
        return line.to_string();
    }

    let mut out = String::with_capacity(line.len() + line.len() / MAX_LINE_OCTETS * 3);
    let mut rest = line;
    let mut limit = MAX_LINE_OCTETS;
    while rest.len() > limit {
        let mut cut = limit;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        out.push_str(&rest[..cut]);
        out.push_str("\r\n ");
        rest = &rest[cut..];
        limit = MAX_LINE_OCTETS - 1;
    }
    out.push_str(rest);
    out
}

// ── Tests ───────────────────────────────────────────────────────────────────
