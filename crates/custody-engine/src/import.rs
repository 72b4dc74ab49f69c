//! Calendar import pipeline.
//!
//! Raw ICS text → decoded events → recurring events expanded in place →
//! custody classification → visit drafts → deduplication against existing
//! visit records. Fetching the text and persisting the result are the
//! caller's job.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::classifier::classify;
use crate::config::DEFAULT_OCCURRENCE_LIMIT;
use crate::expander::expand_recurring_event;
use crate::ics;
use crate::model::{ParsedCalendarEvent, VisitSession, VisitSource};

/// Options for [`import_from_text_with_options`].
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Copies produced per recurring event.
    pub occurrence_limit: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            occurrence_limit: DEFAULT_OCCURRENCE_LIMIT,
        }
    }
}

/// Result of [`deduplicate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupOutcome {
    pub to_insert: Vec<VisitSession>,
    pub skipped: usize,
}

/// Import custody-related events from raw ICS text, 12 occurrences per
/// recurring event.
///
/// # Examples
///
/// ```
/// use custody_engine::import::import_from_text;
///
/// let ics = "BEGIN:VCALENDAR\r\n\
///            BEGIN:VEVENT\r\nSUMMARY:Custody pickup\r\nDTSTART:20250310T090000\r\nEND:VEVENT\r\n\
///            BEGIN:VEVENT\r\nSUMMARY:Grocery run\r\nDTSTART:20250311T140000\r\nEND:VEVENT\r\n\
///            END:VCALENDAR\r\n";
/// let events = import_from_text(ics);
/// assert_eq!(events.len(), 1);
/// assert_eq!(events[0].event.title, "Custody pickup");
/// ```
pub fn import_from_text(raw: &str) -> Vec<ParsedCalendarEvent> {
    import_from_text_with_options(raw, &ImportOptions::default())
}

/// Import custody-related events from raw ICS text.
///
/// Never fails: undecodable blocks are dropped by the codec, and a recurring
/// event whose rule cannot be expanded is kept as its single original
/// occurrence. The result is sorted by start time; ties keep decode order.
pub fn import_from_text_with_options(
    raw: &str,
    options: &ImportOptions,
) -> Vec<ParsedCalendarEvent> {
    let decoded = ics::decode(raw);
    let decoded_count = decoded.len();

    let mut parsed: Vec<ParsedCalendarEvent> = decoded
        .into_iter()
        .flat_map(|event| {
            if !event.is_recurring {
                return vec![event];
            }
            match expand_recurring_event(&event, options.occurrence_limit) {
                Ok(occurrences) => occurrences,
                Err(e) => {
                    warn!(
                        external_id = event.external_id.as_deref().unwrap_or_default(),
                        error = %e,
                        "recurrence expansion failed, keeping original event"
                    );
                    vec![event]
                }
            }
        })
        .filter_map(|event| {
            let classification = classify(&event);
            classification
                .is_custody_related
                .then_some(ParsedCalendarEvent {
                    event,
                    is_custody_related: true,
                    suggested_visit_type: classification.suggested_visit_type,
                })
        })
        .collect();

    parsed.sort_by_key(|p| p.event.start_time.naive());

    info!(
        decoded = decoded_count,
        custody_related = parsed.len(),
        "calendar import finished"
    );
    parsed
}

/// Map imported events 1:1 to visit drafts for one child.
pub fn convert_to_visits(events: &[ParsedCalendarEvent], child_id: &str) -> Vec<VisitSession> {
    events
        .iter()
        .map(|parsed| VisitSession {
            child_id: child_id.to_string(),
            start_time: parsed.event.start_time,
            end_time: parsed.event.end_time,
            visit_type: parsed.suggested_visit_type.unwrap_or_default(),
            source: VisitSource::ImportedFromCalendar,
            notes: Some(parsed.event.title.clone()),
        })
        .collect()
}

/// Drop candidates whose `(child_id, start_time)` already exists.
///
/// Only those two fields are compared; a candidate that differs from an
/// existing record only in end time counts as a duplicate. Candidates are
/// not checked against each other.
pub fn deduplicate(candidates: Vec<VisitSession>, existing: &[VisitSession]) -> DedupOutcome {
    let seen: HashSet<(&str, String)> = existing
        .iter()
        .map(|v| (v.child_id.as_str(), v.start_time.to_string()))
        .collect();

    let total = candidates.len();
    let to_insert: Vec<VisitSession> = candidates
        .into_iter()
        .filter(|c| !seen.contains(&(c.child_id.as_str(), c.start_time.to_string())))
        .collect();
    let skipped = total - to_insert.len();

    debug!(
        candidates = total,
        inserted = to_insert.len(),
        skipped,
        "deduplicated visit candidates"
    );
    DedupOutcome { to_insert, skipped }
}
