//! Custody schedules: user-authored recurring templates and their lifecycle.
//!
//! - [`validate`] — list every violated invariant of a draft (never fails)
//! - [`describe`] — one-line human-readable summary
//! - [`generate_visits`] — materialize visit drafts, one per occurrence × child
//! - [`export_ics`] — iCalendar text for a schedule
//! - [`ScheduleManager`] — create / update / delete / toggle over a [`ScheduleStore`]

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{CustodyError, Result};
use crate::expander::{expand_template_with_options, ExpandOptions};
use crate::ics;
use crate::model::{
    floating_at, DayOfWeek, Frequency, RecurrenceRule, VisitSession, VisitSource, VisitType,
};
use crate::store::ScheduleStore;

// ── Types ───────────────────────────────────────────────────────────────────

/// Opaque, immutable schedule identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleId(Uuid);

impl ScheduleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ScheduleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ScheduleId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulePattern {
    Weekly,
    Biweekly,
    Custom,
    Once,
}

impl SchedulePattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulePattern::Weekly => "weekly",
            SchedulePattern::Biweekly => "biweekly",
            SchedulePattern::Custom => "custom",
            SchedulePattern::Once => "once",
        }
    }

    pub fn is_recurring(&self) -> bool {
        !matches!(self, SchedulePattern::Once)
    }
}

impl fmt::Display for SchedulePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field values for a new schedule, before an id and timestamps exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleDraft {
    pub name: String,
    pub pattern: SchedulePattern,
    #[serde(default)]
    pub child_ids: Vec<String>,
    #[serde(default)]
    pub visit_type: VisitType,
    #[serde(default)]
    pub days_of_week: Vec<DayOfWeek>,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(with = "time_of_day")]
    pub start_time: NaiveTime,
    #[serde(with = "time_of_day")]
    pub end_time: NaiveTime,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_active() -> bool {
    true
}

/// A stored recurring custody template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustodySchedule {
    pub id: ScheduleId,
    pub name: String,
    pub pattern: SchedulePattern,
    pub child_ids: Vec<String>,
    pub visit_type: VisitType,
    /// Sorted Monday-first, no duplicates. Ignored for `once`.
    pub days_of_week: Vec<DayOfWeek>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[serde(with = "time_of_day")]
    pub start_time: NaiveTime,
    #[serde(with = "time_of_day")]
    pub end_time: NaiveTime,
    pub active: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CustodySchedule {
    /// Assign a fresh id and stamp both timestamps with `now`.
    pub fn from_draft(draft: ScheduleDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: ScheduleId::new(),
            name: draft.name,
            pattern: draft.pattern,
            child_ids: dedup_children(draft.child_ids),
            visit_type: draft.visit_type,
            days_of_week: normalize_days(draft.days_of_week),
            start_date: draft.start_date,
            end_date: draft.end_date,
            start_time: draft.start_time,
            end_time: draft.end_time,
            active: draft.active,
            notes: draft.notes,
            created_at: now,
            updated_at: now,
        }
    }

    /// The `RRULE` equivalent of this schedule; `None` for `once`.
    pub fn recurrence_rule(&self) -> Option<RecurrenceRule> {
        if !self.pattern.is_recurring() {
            return None;
        }
        let mut rule = RecurrenceRule::new(Frequency::Weekly);
        if self.pattern == SchedulePattern::Biweekly {
            rule.interval = 2;
        }
        rule.by_day = self.days_of_week.clone();
        // endDate is inclusive, so UNTIL is its last second.
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        rule.until = self.end_date.map(|end| floating_at(end, end_of_day));
        Some(rule)
    }
}

/// Partial update merged into an existing schedule.
///
/// `None` leaves a field untouched. For optional fields, `Some(None)` clears.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleUpdate {
    pub name: Option<String>,
    pub pattern: Option<SchedulePattern>,
    pub child_ids: Option<Vec<String>>,
    pub visit_type: Option<VisitType>,
    pub days_of_week: Option<Vec<DayOfWeek>>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<Option<NaiveDate>>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub active: Option<bool>,
    pub notes: Option<Option<String>>,
}

impl ScheduleUpdate {
    fn apply(self, schedule: &mut CustodySchedule) {
        if let Some(name) = self.name {
            schedule.name = name;
        }
        if let Some(pattern) = self.pattern {
            schedule.pattern = pattern;
        }
        if let Some(child_ids) = self.child_ids {
            schedule.child_ids = dedup_children(child_ids);
        }
        if let Some(visit_type) = self.visit_type {
            schedule.visit_type = visit_type;
        }
        if let Some(days) = self.days_of_week {
            schedule.days_of_week = normalize_days(days);
        }
        if let Some(start_date) = self.start_date {
            schedule.start_date = start_date;
        }
        if let Some(end_date) = self.end_date {
            schedule.end_date = end_date;
        }
        if let Some(start_time) = self.start_time {
            schedule.start_time = start_time;
        }
        if let Some(end_time) = self.end_time {
            schedule.end_time = end_time;
        }
        if let Some(active) = self.active {
            schedule.active = active;
        }
        if let Some(notes) = self.notes {
            schedule.notes = notes;
        }
    }
}

fn normalize_days(mut days: Vec<DayOfWeek>) -> Vec<DayOfWeek> {
    days.sort();
    days.dedup();
    days
}

fn dedup_children(mut ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.retain(|id| seen.insert(id.clone()));
    ids
}

/// Parse a local time of day written as `HH:MM` (seconds optional).
pub fn parse_time_of_day(raw: &str) -> Result<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|e| CustodyError::InvalidTime(format!("'{raw}': {e}")))
}

mod time_of_day {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_time_of_day(&raw).map_err(serde::de::Error::custom)
    }
}

// ── validate ────────────────────────────────────────────────────────────────

/// Check a draft against the schedule invariants.
///
/// Returns one message per violation; an empty list means valid. Child
/// selection is optional and never reported.
pub fn validate(draft: &ScheduleDraft) -> Vec<String> {
    let mut errors = Vec::new();

    if draft.name.trim().is_empty() {
        errors.push("Schedule name is required".to_string());
    }
    if draft.pattern.is_recurring() && draft.days_of_week.is_empty() {
        errors.push(format!(
            "Select at least one day of the week for a {} schedule",
            draft.pattern
        ));
    }
    if draft.end_time <= draft.start_time {
        errors.push("End time must be after start time".to_string());
    }
    if let Some(end_date) = draft.end_date {
        if end_date < draft.start_date {
            errors.push("End date cannot be before start date".to_string());
        }
    }

    errors
}

// ── describe ────────────────────────────────────────────────────────────────

/// Human-readable summary, e.g. `"Biweekly on Fri, Sat, 5:00 PM - 8:30 PM"`.
pub fn describe(schedule: &CustodySchedule) -> String {
    let times = format!(
        "{} - {}",
        schedule.start_time.format("%-I:%M %p"),
        schedule.end_time.format("%-I:%M %p")
    );

    if schedule.pattern == SchedulePattern::Once {
        return format!(
            "Once on {}, {}",
            schedule.start_date.format("%a, %b %-d, %Y"),
            times
        );
    }

    let days = if schedule.days_of_week.is_empty() {
        "no days selected".to_string()
    } else {
        schedule
            .days_of_week
            .iter()
            .map(|d| d.short_name())
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut text = match schedule.pattern {
        SchedulePattern::Weekly => format!("Weekly on {days}, {times}"),
        SchedulePattern::Biweekly => format!("Biweekly on {days}, {times}"),
        _ => format!("Custom days ({days}), {times}"),
    };
    if let Some(end_date) = schedule.end_date {
        text.push_str(&format!(" until {}", end_date.format("%b %-d, %Y")));
    }
    text
}

// ── generate_visits / export_ics ────────────────────────────────────────────

/// Materialize visit drafts for a schedule, Monday-start weeks.
pub fn generate_visits(
    schedule: &CustodySchedule,
    horizon_weeks: u32,
    today: NaiveDate,
) -> Vec<VisitSession> {
    generate_visits_with_options(schedule, horizon_weeks, today, &ExpandOptions::default())
}

/// Materialize visit drafts: one [`VisitSession`] per occurrence × child.
///
/// A schedule with two children and four occurrences yields eight drafts,
/// ordered by occurrence and then by child. A schedule with no children
/// yields none.
pub fn generate_visits_with_options(
    schedule: &CustodySchedule,
    horizon_weeks: u32,
    today: NaiveDate,
    options: &ExpandOptions,
) -> Vec<VisitSession> {
    let occurrences = expand_template_with_options(schedule, horizon_weeks, today, options);

    let visits: Vec<VisitSession> = occurrences
        .iter()
        .flat_map(|occurrence| {
            schedule.child_ids.iter().map(move |child_id| VisitSession {
                child_id: child_id.clone(),
                start_time: occurrence.start,
                end_time: Some(occurrence.end),
                visit_type: schedule.visit_type,
                source: VisitSource::GeneratedFromSchedule,
                notes: schedule.notes.clone(),
            })
        })
        .collect();

    debug!(
        schedule_id = %schedule.id,
        occurrences = occurrences.len(),
        visits = visits.len(),
        "generated visits from schedule"
    );
    visits
}

pub fn export_ics(schedule: &CustodySchedule) -> String {
    ics::encode_schedule(schedule)
}

// ── ScheduleManager ─────────────────────────────────────────────────────────

/// Lifecycle operations over a schedule collection.
///
/// Mutations do not re-validate; call [`validate`] first when hard
/// validation is wanted. Operations on a missing id are silent no-ops.
pub struct ScheduleManager<S: ScheduleStore> {
    store: S,
    config: EngineConfig,
}

impl<S: ScheduleStore> ScheduleManager<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn list(&self) -> Vec<CustodySchedule> {
        self.store.all()
    }

    pub fn get(&self, id: &ScheduleId) -> Option<CustodySchedule> {
        self.store.get(id)
    }

    pub fn create(&mut self, draft: ScheduleDraft, now: DateTime<Utc>) -> CustodySchedule {
        let schedule = CustodySchedule::from_draft(draft, now);
        self.store.insert(schedule.clone());
        info!(schedule_id = %schedule.id, pattern = %schedule.pattern, "schedule created");
        schedule
    }

    pub fn update(&mut self, id: &ScheduleId, update: ScheduleUpdate, now: DateTime<Utc>) {
        let Some(mut schedule) = self.store.get(id) else {
            debug!(schedule_id = %id, "update skipped: schedule not found");
            return;
        };
        update.apply(&mut schedule);
        schedule.updated_at = now;
        self.store.replace(schedule);
        info!(schedule_id = %id, "schedule updated");
    }

    pub fn delete(&mut self, id: &ScheduleId) {
        if self.store.remove(id) {
            info!(schedule_id = %id, "schedule deleted");
        } else {
            debug!(schedule_id = %id, "delete skipped: schedule not found");
        }
    }

    pub fn toggle_active(&mut self, id: &ScheduleId, now: DateTime<Utc>) {
        let Some(schedule) = self.store.get(id) else {
            debug!(schedule_id = %id, "toggle skipped: schedule not found");
            return;
        };
        let update = ScheduleUpdate {
            active: Some(!schedule.active),
            ..Default::default()
        };
        self.update(id, update, now);
    }

    /// Visit drafts for every active schedule over the configured horizon.
    pub fn generate_active_visits(&self, today: NaiveDate) -> Vec<VisitSession> {
        let options = ExpandOptions {
            week_start: self.config.week_start,
        };
        self.store
            .all()
            .iter()
            .filter(|s| s.active)
            .flat_map(|s| {
                generate_visits_with_options(s, self.config.horizon_weeks, today, &options)
            })
            .collect()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
