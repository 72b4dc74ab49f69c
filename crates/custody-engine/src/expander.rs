//! Recurrence expansion.
//!
//! Two entry points:
//!
//! - [`expand_template`] — custody schedule template → dated occurrences
//!   within a horizon. Pure function of `(schedule, horizon_weeks, today)`.
//! - [`expand_recurring_event`] — one imported event with an `RRULE` →
//!   copies of that event at each occurrence, via the `rrule` crate.
//!
//! Neither function reads the system clock; callers pass `today`.

use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta};
use rrule::RRuleSet;
use serde::Serialize;

use crate::config::WeekStartDay;
use crate::error::{CustodyError, Result};
use crate::model::{floating_at, DayOfWeek, EventTime, NormalizedCalendarEvent, RecurrenceRule};
use crate::schedule::{CustodySchedule, SchedulePattern};

/// A concrete, dated instance of a schedule template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Occurrence {
    pub date: NaiveDate,
    pub start: EventTime,
    pub end: EventTime,
}

/// Options for [`expand_template_with_options`].
#[derive(Debug, Clone, Default)]
pub struct ExpandOptions {
    /// Week boundary used to decide biweekly parity.
    pub week_start: WeekStartDay,
}

// ── expand_template ─────────────────────────────────────────────────────────

/// Expand a schedule template into occurrences, using Monday-start weeks.
///
/// See [`expand_template_with_options`] for the rules.
///
/// # Examples
///
/// ```
/// use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
/// use custody_engine::expander::expand_template;
/// use custody_engine::model::{DayOfWeek, VisitType};
/// use custody_engine::schedule::{CustodySchedule, ScheduleDraft, SchedulePattern};
///
/// let draft = ScheduleDraft {
///     name: "Alternate Mondays".to_string(),
///     pattern: SchedulePattern::Biweekly,
///     child_ids: vec![],
///     visit_type: VisitType::PhysicalCare,
///     days_of_week: vec![DayOfWeek::Monday],
///     start_date: NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
///     end_date: None,
///     start_time: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
///     end_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
///     active: true,
///     notes: None,
/// };
/// let created = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
/// let schedule = CustodySchedule::from_draft(draft, created);
/// let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
///
/// let dates: Vec<String> = expand_template(&schedule, 8, today)
///     .iter()
///     .map(|o| o.date.to_string())
///     .collect();
/// assert_eq!(dates, ["2025-01-06", "2025-01-20", "2025-02-03", "2025-02-17"]);
/// ```
pub fn expand_template(
    schedule: &CustodySchedule,
    horizon_weeks: u32,
    today: NaiveDate,
) -> Vec<Occurrence> {
    expand_template_with_options(schedule, horizon_weeks, today, &ExpandOptions::default())
}

/// Expand a schedule template into occurrences.
///
/// - `once`: exactly one occurrence on `start_date`, even if it is in the
///   past relative to `today`.
/// - `weekly` / `custom`: one occurrence per date in
///   `[max(start_date, today), start_date + horizon_weeks)` whose weekday is
///   selected, further capped by the inclusive `end_date`.
/// - `biweekly`: as weekly, restricted to weeks at an even distance from the
///   week containing `start_date`.
///
/// An empty weekday selection yields no occurrences. Output is in ascending
/// date order.
pub fn expand_template_with_options(
    schedule: &CustodySchedule,
    horizon_weeks: u32,
    today: NaiveDate,
    options: &ExpandOptions,
) -> Vec<Occurrence> {
    if schedule.pattern == SchedulePattern::Once {
        return vec![occurrence_on(schedule, schedule.start_date)];
    }
    if schedule.days_of_week.is_empty() {
        return Vec::new();
    }

    let first = schedule.start_date.max(today);
    let horizon_end = schedule
        .start_date
        .checked_add_signed(TimeDelta::weeks(i64::from(horizon_weeks)))
        .unwrap_or(NaiveDate::MAX);
    let Some(mut last) = horizon_end.pred_opt() else {
        return Vec::new();
    };
    if let Some(end_date) = schedule.end_date {
        last = last.min(end_date);
    }

    let anchor_week = week_start_of(schedule.start_date, options.week_start);

    first
        .iter_days()
        .take_while(|date| *date <= last)
        .filter(|date| {
            schedule
                .days_of_week
                .contains(&DayOfWeek::from_chrono(date.weekday()))
        })
        .filter(|date| match schedule.pattern {
            SchedulePattern::Biweekly => {
                let weeks_from_anchor =
                    (week_start_of(*date, options.week_start) - anchor_week).num_days() / 7;
                weeks_from_anchor % 2 == 0
            }
            _ => true,
        })
        .map(|date| occurrence_on(schedule, date))
        .collect()
}

fn occurrence_on(schedule: &CustodySchedule, date: NaiveDate) -> Occurrence {
    Occurrence {
        date,
        start: floating_at(date, schedule.start_time),
        end: floating_at(date, schedule.end_time),
    }
}

fn week_start_of(date: NaiveDate, week_start: WeekStartDay) -> NaiveDate {
    date - TimeDelta::days(week_start.days_from_start(date.weekday()))
}

// ── expand_recurring_event ──────────────────────────────────────────────────

/// Project a recurring event forward into at most `occurrence_limit` copies.
///
/// Each copy keeps the source's title, description, location, and
/// `external_id`; only `start_time`/`end_time` move, with the duration
/// preserved. Because the `external_id` repeats, use
/// [`NormalizedCalendarEvent::occurrence_key`] when per-occurrence identity
/// is needed.
///
/// An event without a usable rule is returned unchanged as a single element.
/// The event's own start is always the first copy, even when it falls on a
/// day the rule would not produce. Expansion stops early at the rule's
/// `COUNT` or `UNTIL`.
///
/// # Errors
///
/// Returns [`CustodyError::InvalidRule`] if the rule is rejected by the
/// recurrence engine.
pub fn expand_recurring_event(
    event: &NormalizedCalendarEvent,
    occurrence_limit: usize,
) -> Result<Vec<NormalizedCalendarEvent>> {
    if occurrence_limit == 0 {
        return Ok(Vec::new());
    }
    let Some(rule) = event.recurrence_rule.as_ref().filter(|_| event.is_recurring) else {
        return Ok(vec![event.clone()]);
    };

    let start = event.start_time.naive();
    let until = rule.until.map(|u| u.naive());
    if until.is_some_and(|u| u < start) {
        return Ok(Vec::new());
    }

    // UNTIL is applied below so the rule's timezone form never has to match
    // DTSTART's; floating and UTC values both expand on the UTC timeline.
    let engine_rule = RecurrenceRule {
        until: None,
        ..rule.clone()
    };
    let text = format!(
        "DTSTART:{}\nRRULE:{}",
        start.format("%Y%m%dT%H%M%SZ"),
        engine_rule.to_rrule_value()
    );
    let rrule_set = text
        .parse::<RRuleSet>()
        .map_err(|e| CustodyError::InvalidRule(format!("'{}': {}", text, e)))?;

    let limit = u16::try_from(occurrence_limit).unwrap_or(u16::MAX);
    let duration = event.duration();

    let mut starts: Vec<NaiveDateTime> = rrule_set
        .all(limit)
        .dates
        .into_iter()
        .map(|dt| dt.naive_utc())
        .collect();
    // DTSTART is always the first instance and counts toward COUNT, even
    // when it falls outside the rule's BYDAY/BYMONTHDAY set.
    if starts.first() != Some(&start) {
        starts.insert(0, start);
    }
    let cap = rule
        .count
        .map_or(occurrence_limit, |c| occurrence_limit.min(c as usize));
    starts.truncate(cap);

    let occurrences = starts
        .into_iter()
        .take_while(|naive| until.is_none_or(|u| *naive <= u))
        .map(|naive| {
            let start_time = event.start_time.with_naive(naive);
            NormalizedCalendarEvent {
                start_time,
                end_time: duration.map(|d| start_time.shifted(d)),
                ..event.clone()
            }
        })
        .collect();

    Ok(occurrences)
}

// ── Tests ───────────────────────────────────────────────────────────────────
