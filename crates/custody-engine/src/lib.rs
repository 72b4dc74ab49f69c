//! # custody-engine
//!
//! Deterministic custody schedule computation and calendar interoperability.
//!
//! The engine turns user-authored custody schedules into dated visit drafts,
//! reads and writes iCalendar text, expands recurring calendar events, and
//! decides which imported events are about parenting time. Everything is a
//! synchronous computation over in-memory data: fetching calendars and
//! persisting visits belong to the host.
//!
//! ## Modules
//!
//! - [`ics`] — iCalendar decode (best effort) and encode (schedule → `.ics`)
//! - [`expander`] — schedule templates and recurring events → occurrences
//! - [`classifier`] — custody relevance and visit-type suggestion
//! - [`schedule`] — schedule validation, description, visit generation, CRUD
//! - [`import`] — ICS text → custody events → deduplicated visit drafts
//! - [`store`] — schedule collection seam and in-memory implementation
//! - [`model`] — shared event, rule, and visit types
//! - [`config`] — engine settings from JSON and `CUSTODY_*` variables
//! - [`error`] — Error types

pub mod classifier;
pub mod config;
pub mod error;
pub mod expander;
pub mod ics;
pub mod import;
pub mod model;
pub mod schedule;
pub mod store;

pub use classifier::{classify, Classification};
pub use config::{EngineConfig, WeekStartDay};
pub use error::{CustodyError, Result};
pub use expander::{
    expand_recurring_event, expand_template, expand_template_with_options, ExpandOptions,
    Occurrence,
};
pub use import::{
    convert_to_visits, deduplicate, import_from_text, import_from_text_with_options, DedupOutcome,
    ImportOptions,
};
pub use model::{
    DayOfWeek, EventTime, Frequency, NormalizedCalendarEvent, ParsedCalendarEvent,
    RecurrenceRule, VisitSession, VisitSource, VisitType,
};
pub use schedule::{
    describe, export_ics, generate_visits, generate_visits_with_options, validate,
    CustodySchedule, ScheduleDraft, ScheduleId, ScheduleManager, SchedulePattern, ScheduleUpdate,
};
pub use store::{InMemoryScheduleStore, ScheduleStore};
