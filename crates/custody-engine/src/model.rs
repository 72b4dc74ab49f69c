//! Shared data model: calendar events, recurrence rules, and visit drafts.
//!
//! Timestamps are carried as [`EventTime`], which keeps the distinction the
//! iCalendar format makes between UTC instants (`...Z`) and floating local
//! wall-clock times. No timezone database is consulted; floating values are
//! interpreted in the single local context of the user.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{CustodyError, Result};

// ── Visit vocabulary ────────────────────────────────────────────────────────

/// The kind of parenting time a visit represents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum VisitType {
    #[default]
    PhysicalCare,
    Overnight,
    VirtualCall,
    SchoolTransportOnly,
}

impl VisitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisitType::PhysicalCare => "physical_care",
            VisitType::Overnight => "overnight",
            VisitType::VirtualCall => "virtual_call",
            VisitType::SchoolTransportOnly => "school_transport_only",
        }
    }
}

impl fmt::Display for VisitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a visit record came from.
///
/// The engine itself only produces [`VisitSource::ImportedFromCalendar`] and
/// [`VisitSource::GeneratedFromSchedule`]; the other variants belong to
/// records created elsewhere but still flow through deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitSource {
    ManualStartStop,
    AutoFromTrip,
    ImportedFromCalendar,
    AutoDetected,
    GeneratedFromSchedule,
}

/// A day of the week as used in schedules and `BYDAY` rule parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    pub fn from_chrono(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }

    pub fn to_chrono(self) -> Weekday {
        match self {
            DayOfWeek::Monday => Weekday::Mon,
            DayOfWeek::Tuesday => Weekday::Tue,
            DayOfWeek::Wednesday => Weekday::Wed,
            DayOfWeek::Thursday => Weekday::Thu,
            DayOfWeek::Friday => Weekday::Fri,
            DayOfWeek::Saturday => Weekday::Sat,
            DayOfWeek::Sunday => Weekday::Sun,
        }
    }

    /// Two-letter iCalendar code (`MO`, `TU`, ...).
    pub fn ics_code(self) -> &'static str {
        match self {
            DayOfWeek::Monday => "MO",
            DayOfWeek::Tuesday => "TU",
            DayOfWeek::Wednesday => "WE",
            DayOfWeek::Thursday => "TH",
            DayOfWeek::Friday => "FR",
            DayOfWeek::Saturday => "SA",
            DayOfWeek::Sunday => "SU",
        }
    }

    /// Parse a `BYDAY` entry. Ordinal prefixes (`1MO`, `-1FR`) are dropped.
    pub fn from_ics_code(code: &str) -> Option<Self> {
        let code = code
            .trim()
            .trim_start_matches(|c: char| c == '+' || c == '-' || c.is_ascii_digit());
        match code.to_ascii_uppercase().as_str() {
            "MO" => Some(DayOfWeek::Monday),
            "TU" => Some(DayOfWeek::Tuesday),
            "WE" => Some(DayOfWeek::Wednesday),
            "TH" => Some(DayOfWeek::Thursday),
            "FR" => Some(DayOfWeek::Friday),
            "SA" => Some(DayOfWeek::Saturday),
            "SU" => Some(DayOfWeek::Sunday),
            _ => None,
        }
    }

    pub fn short_name(self) -> &'static str {
        match self {
            DayOfWeek::Monday => "Mon",
            DayOfWeek::Tuesday => "Tue",
            DayOfWeek::Wednesday => "Wed",
            DayOfWeek::Thursday => "Thu",
            DayOfWeek::Friday => "Fri",
            DayOfWeek::Saturday => "Sat",
            DayOfWeek::Sunday => "Sun",
        }
    }
}

// ── EventTime ───────────────────────────────────────────────────────────────

/// A calendar timestamp: either a UTC instant or a floating local time.
///
/// Serialized as an ISO 8601 string: `2025-03-10T09:00:00Z` for UTC and
/// `2025-03-10T09:00:00` (no offset) for floating values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum EventTime {
    Utc(DateTime<Utc>),
    Floating(NaiveDateTime),
}

impl EventTime {
    /// Parse the compact iCalendar form `YYYYMMDDTHHMMSS[Z]`.
    ///
    /// A date-only value (`YYYYMMDD`) resolves to floating midnight. Seconds
    /// may be omitted (`YYYYMMDDTHHMM`).
    pub fn parse_ics(value: &str) -> Result<Self> {
        let raw = value.trim();
        let (body, is_utc) = match raw.strip_suffix('Z').or_else(|| raw.strip_suffix('z')) {
            Some(body) => (body, true),
            None => (raw, false),
        };

        let invalid = || CustodyError::InvalidDatetime(format!("'{raw}'"));

        let (date_part, time_part) = match body.split_once(['T', 't']) {
            Some((d, t)) => (d, Some(t)),
            None => (body, None),
        };

        let date = parse_compact_date(date_part).ok_or_else(invalid)?;
        let time = match time_part {
            Some(t) => parse_compact_time(t).ok_or_else(invalid)?,
            None => NaiveTime::MIN,
        };
        let naive = date.and_time(time);

        Ok(if is_utc {
            EventTime::Utc(naive.and_utc())
        } else {
            EventTime::Floating(naive)
        })
    }

    /// Parse an ISO 8601 string as produced by [`fmt::Display`].
    ///
    /// Values with an explicit offset are normalized to UTC; values without
    /// one are floating.
    pub fn parse_iso(value: &str) -> Result<Self> {
        let raw = value.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(EventTime::Utc(dt.with_timezone(&Utc)));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
            .map(EventTime::Floating)
            .map_err(|e| CustodyError::InvalidDatetime(format!("'{raw}': {e}")))
    }

    /// Compact iCalendar form, the inverse of [`EventTime::parse_ics`].
    pub fn to_ics_string(&self) -> String {
        match self {
            EventTime::Utc(dt) => dt.format("%Y%m%dT%H%M%SZ").to_string(),
            EventTime::Floating(naive) => naive.format("%Y%m%dT%H%M%S").to_string(),
        }
    }

    /// Wall-clock reading used for ordering and arithmetic.
    ///
    /// UTC and floating values share one naive timeline; this is the
    /// single-local-timezone simplification.
    pub fn naive(&self) -> NaiveDateTime {
        match self {
            EventTime::Utc(dt) => dt.naive_utc(),
            EventTime::Floating(naive) => *naive,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.naive().date()
    }

    pub fn is_utc(&self) -> bool {
        matches!(self, EventTime::Utc(_))
    }

    /// Replace the wall-clock reading, keeping the UTC/floating kind.
    pub fn with_naive(&self, naive: NaiveDateTime) -> Self {
        match self {
            EventTime::Utc(_) => EventTime::Utc(naive.and_utc()),
            EventTime::Floating(_) => EventTime::Floating(naive),
        }
    }

    pub fn shifted(&self, delta: TimeDelta) -> Self {
        self.with_naive(self.naive() + delta)
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventTime::Utc(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%SZ")),
            EventTime::Floating(naive) => write!(f, "{}", naive.format("%Y-%m-%dT%H:%M:%S")),
        }
    }
}

impl From<EventTime> for String {
    fn from(value: EventTime) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for EventTime {
    type Error = CustodyError;

    fn try_from(value: String) -> Result<Self> {
        EventTime::parse_iso(&value)
    }
}

fn parse_compact_date(s: &str) -> Option<NaiveDate> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = s[0..4].parse().ok()?;
    let month: u32 = s[4..6].parse().ok()?;
    let day: u32 = s[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_compact_time(s: &str) -> Option<NaiveTime> {
    if !(s.len() == 4 || s.len() == 6) || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hour: u32 = s[0..2].parse().ok()?;
    let minute: u32 = s[2..4].parse().ok()?;
    let second: u32 = if s.len() == 6 { s[4..6].parse().ok()? } else { 0 };
    NaiveTime::from_hms_opt(hour, minute, second)
}

// ── Recurrence rules ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_ics(&self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }

    pub fn from_ics(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "DAILY" => Some(Frequency::Daily),
            "WEEKLY" => Some(Frequency::Weekly),
            "MONTHLY" => Some(Frequency::Monthly),
            "YEARLY" => Some(Frequency::Yearly),
            _ => None,
        }
    }
}

/// Structured form of an `RRULE` value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    /// Always at least 1.
    pub interval: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_day: Vec<DayOfWeek>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<EventTime>,
}

impl RecurrenceRule {
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: 1,
            by_day: Vec::new(),
            count: None,
            until: None,
        }
    }

    /// Parse an `RRULE` value such as `FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,WE`.
    ///
    /// Unknown parts and unparseable part values are ignored. Returns `None`
    /// only when no recognizable `FREQ` is present.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        let value = value
            .strip_prefix("RRULE:")
            .or_else(|| value.strip_prefix("rrule:"))
            .unwrap_or(value);

        let mut frequency = None;
        let mut rule = RecurrenceRule::new(Frequency::Daily);

        for part in value.split(';') {
            let Some((key, val)) = part.split_once('=') else {
                continue;
            };
            match key.trim().to_ascii_uppercase().as_str() {
                "FREQ" => frequency = Frequency::from_ics(val),
                "INTERVAL" => {
                    if let Ok(n) = val.trim().parse::<u32>() {
                        rule.interval = n.max(1);
                    }
                }
                "BYDAY" => {
                    rule.by_day = val.split(',').filter_map(DayOfWeek::from_ics_code).collect();
                }
                "COUNT" => rule.count = val.trim().parse().ok(),
                "UNTIL" => rule.until = EventTime::parse_ics(val).ok(),
                _ => {}
            }
        }

        rule.frequency = frequency?;
        Some(rule)
    }

    /// Render the rule value (without the `RRULE:` prefix).
    pub fn to_rrule_value(&self) -> String {
        let mut parts = vec![format!("FREQ={}", self.frequency.as_ics())];
        if self.interval > 1 {
            parts.push(format!("INTERVAL={}", self.interval));
        }
        if !self.by_day.is_empty() {
            let days: Vec<&str> = self.by_day.iter().map(|d| d.ics_code()).collect();
            parts.push(format!("BYDAY={}", days.join(",")));
        }
        if let Some(count) = self.count {
            parts.push(format!("COUNT={count}"));
        }
        if let Some(until) = &self.until {
            parts.push(format!("UNTIL={}", until.to_ics_string()));
        }
        parts.join(";")
    }
}

// ── Events ──────────────────────────────────────────────────────────────────

/// A calendar event in provider-neutral form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedCalendarEvent {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub start_time: EventTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<EventTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence_rule: Option<RecurrenceRule>,
}

impl NormalizedCalendarEvent {
    pub fn new(title: impl Into<String>, start_time: EventTime) -> Self {
        Self {
            title: title.into(),
            description: None,
            location: None,
            start_time,
            end_time: None,
            external_id: None,
            is_recurring: false,
            recurrence_rule: None,
        }
    }

    pub fn duration(&self) -> Option<TimeDelta> {
        self.end_time
            .map(|end| end.naive() - self.start_time.naive())
    }

    /// Whether the event ends on a later calendar day than it starts.
    pub fn spans_midnight(&self) -> bool {
        match self.end_time {
            Some(end) => {
                let end = end.naive();
                // An end of exactly 00:00 the next day still belongs to the start day.
                let last_moment = if end.time() == NaiveTime::MIN && end > self.start_time.naive()
                {
                    end - TimeDelta::seconds(1)
                } else {
                    end
                };
                last_moment.date() > self.start_time.date()
            }
            None => false,
        }
    }

    /// Identity of this particular occurrence.
    ///
    /// Expanded occurrences of one recurring event share `external_id`, so
    /// the start is appended to keep them distinct.
    pub fn occurrence_key(&self) -> Option<String> {
        self.external_id
            .as_ref()
            .map(|id| format!("{}_{}", id, self.start_time.to_ics_string()))
    }
}

/// An imported event after custody classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedCalendarEvent {
    #[serde(flatten)]
    pub event: NormalizedCalendarEvent,
    pub is_custody_related: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_visit_type: Option<VisitType>,
}

/// A draft visit record handed to the external store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitSession {
    pub child_id: String,
    pub start_time: EventTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<EventTime>,
    #[serde(rename = "type")]
    pub visit_type: VisitType,
    pub source: VisitSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Combine a calendar date with a local time of day into a floating time.
pub fn floating_at(date: NaiveDate, time: NaiveTime) -> EventTime {
    EventTime::Floating(date.and_time(time))
}

/// First date on or after `from` whose weekday is in `days`.
pub(crate) fn first_matching_date(from: NaiveDate, days: &[DayOfWeek]) -> Option<NaiveDate> {
    (0..7)
        .map(|offset| from + TimeDelta::days(offset))
        .find(|date| days.contains(&DayOfWeek::from_chrono(date.weekday())))
}

// ── Tests ───────────────────────────────────────────────────────────────────
