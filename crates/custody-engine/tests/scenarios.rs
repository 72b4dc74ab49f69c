//! End-to-end scenarios across the codec, expander, classifier, schedule
//! manager, and import pipeline.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};
use custody_engine::{
    classify, convert_to_visits, deduplicate, expand_recurring_event, expand_template,
    generate_visits, import_from_text, validate, CustodySchedule, DayOfWeek, EventTime,
    InMemoryScheduleStore, NormalizedCalendarEvent, RecurrenceRule, ScheduleDraft,
    ScheduleManager, SchedulePattern, VisitSource, VisitType,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn draft(pattern: SchedulePattern, days: Vec<DayOfWeek>) -> ScheduleDraft {
    ScheduleDraft {
        name: "Alternating weekends".to_string(),
        pattern,
        child_ids: vec!["maya".to_string(), "leo".to_string()],
        visit_type: VisitType::Overnight,
        days_of_week: days,
        start_date: date(2025, 1, 6),
        end_date: None,
        start_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
        active: true,
        notes: None,
    }
}

const PICKUP_AND_GROCERIES: &str = "BEGIN:VCALENDAR\r\n\
    VERSION:2.0\r\n\
    BEGIN:VEVENT\r\n\
    UID:pickup-1\r\n\
    SUMMARY:Custody pickup\r\n\
    DTSTART:20250310T090000\r\n\
    DTEND:20250310T100000\r\n\
    END:VEVENT\r\n\
    BEGIN:VEVENT\r\n\
    UID:groceries-1\r\n\
    SUMMARY:Grocery run\r\n\
    DTSTART:20250311T140000\r\n\
    END:VEVENT\r\n\
    END:VCALENDAR\r\n";

#[test]
fn test_weekly_schedule_round_trips_through_ics() {
    let schedule = CustodySchedule::from_draft(
        draft(
            SchedulePattern::Weekly,
            vec![DayOfWeek::Wednesday, DayOfWeek::Monday],
        ),
        now(),
    );

    let events = custody_engine::ics::decode(&custody_engine::export_ics(&schedule));

    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.title, schedule.name);
    assert!(event.is_recurring);
    let rule = event.recurrence_rule.as_ref().unwrap();
    assert_eq!(rule.by_day, schedule.days_of_week);
    assert_eq!(rule.interval, 1);
    assert_eq!(event.start_time.date(), date(2025, 1, 6));
}

#[test]
fn test_valid_name_with_trailing_space_round_trips() {
    let mut d = draft(SchedulePattern::Weekly, vec![DayOfWeek::Friday]);
    d.name = "Dad weekend ".to_string();
    assert!(validate(&d).is_empty());

    let schedule = CustodySchedule::from_draft(d, now());
    let events = custody_engine::ics::decode(&custody_engine::export_ics(&schedule));
    assert_eq!(events[0].title, "Dad weekend ");
}

#[test]
fn test_reimport_yields_no_new_visits() {
    let first_candidates = convert_to_visits(&import_from_text(PICKUP_AND_GROCERIES), "maya");
    let first = deduplicate(first_candidates, &[]);
    assert_eq!(first.to_insert.len(), 1);
    assert_eq!(first.skipped, 0);

    let second_candidates = convert_to_visits(&import_from_text(PICKUP_AND_GROCERIES), "maya");
    let candidate_count = second_candidates.len();
    let second = deduplicate(second_candidates, &first.to_insert);
    assert!(second.to_insert.is_empty());
    assert_eq!(second.skipped, candidate_count);
}

#[test]
fn test_biweekly_parity_counts_from_start_week() {
    let schedule = CustodySchedule::from_draft(
        draft(SchedulePattern::Biweekly, vec![DayOfWeek::Monday]),
        now(),
    );
    let dates: Vec<NaiveDate> = expand_template(&schedule, 8, date(2025, 1, 1))
        .into_iter()
        .map(|o| o.date)
        .collect();

    assert_eq!(
        dates,
        vec![date(2025, 1, 6), date(2025, 1, 20), date(2025, 2, 3), date(2025, 2, 17)]
    );
    assert!(!dates.contains(&date(2025, 1, 13)));
    assert!(!dates.contains(&date(2025, 1, 27)));
}

#[test]
fn test_custom_schedule_needs_a_weekday() {
    let mut d = draft(SchedulePattern::Custom, vec![]);
    assert!(!validate(&d).is_empty());

    d.days_of_week = vec![DayOfWeek::Friday];
    assert!(validate(&d).is_empty());
}

#[test]
fn test_pickup_at_school_classification_is_stable() {
    let event = NormalizedCalendarEvent::new(
        "Pickup at school",
        EventTime::parse_ics("20250310T150000").unwrap(),
    );
    for _ in 0..5 {
        let result = classify(&event);
        assert!(result.is_custody_related);
        assert_eq!(result.suggested_visit_type, Some(VisitType::SchoolTransportOnly));
    }
}

#[test]
fn test_weekly_recurring_event_expands_to_twelve() {
    let mut event = NormalizedCalendarEvent::new(
        "Custody dinner",
        EventTime::parse_ics("20250303T180000").unwrap(),
    );
    event.end_time = Some(EventTime::parse_ics("20250303T193000").unwrap());
    event.external_id = Some("dinner".to_string());
    event.is_recurring = true;
    event.recurrence_rule = RecurrenceRule::parse("FREQ=WEEKLY");

    let occurrences = expand_recurring_event(&event, 12).unwrap();

    assert_eq!(occurrences.len(), 12);
    for pair in occurrences.windows(2) {
        assert_eq!(
            pair[1].start_time.naive() - pair[0].start_time.naive(),
            TimeDelta::days(7)
        );
    }
    assert!(occurrences
        .iter()
        .all(|o| o.duration() == Some(TimeDelta::minutes(90))));

    // externalId repeats; occurrence keys do not.
    let mut keys: Vec<String> = occurrences
        .iter()
        .filter_map(|o| o.occurrence_key())
        .collect();
    keys.dedup();
    assert_eq!(keys.len(), 12);
}

#[test]
fn test_import_returns_only_the_pickup() {
    let events = import_from_text(PICKUP_AND_GROCERIES);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event.title, "Custody pickup");
    assert!(events[0].is_custody_related);
}

#[test]
fn test_generated_visits_fan_out_over_children() {
    let schedule = CustodySchedule::from_draft(
        draft(
            SchedulePattern::Weekly,
            vec![DayOfWeek::Friday, DayOfWeek::Saturday],
        ),
        now(),
    );
    let visits = generate_visits(&schedule, 2, date(2025, 1, 1));

    // Four dates (Jan 10, 11, 17, 18) for two children.
    assert_eq!(visits.len(), 8);
    assert!(visits
        .iter()
        .all(|v| v.source == VisitSource::GeneratedFromSchedule
            && v.visit_type == VisitType::Overnight));
    assert_eq!(visits.iter().filter(|v| v.child_id == "leo").count(), 4);
}

#[test]
fn test_manager_lifecycle_feeds_generation() {
    let mut manager = ScheduleManager::new(InMemoryScheduleStore::new());
    let weekly = manager.create(draft(SchedulePattern::Weekly, vec![DayOfWeek::Monday]), now());
    let once = manager.create(draft(SchedulePattern::Once, vec![]), now());

    // 4 Mondays × 2 children + 1 once × 2 children.
    assert_eq!(manager.generate_active_visits(date(2025, 1, 1)).len(), 10);

    manager.toggle_active(&weekly.id, now());
    assert_eq!(manager.generate_active_visits(date(2025, 1, 1)).len(), 2);

    manager.delete(&once.id);
    assert!(manager.generate_active_visits(date(2025, 1, 1)).is_empty());
    assert_eq!(manager.list().len(), 1);
}

#[test]
fn test_imported_recurring_events_have_distinct_visits() {
    let text = "BEGIN:VCALENDAR\n\
        BEGIN:VEVENT\n\
        UID:weekly-exchange\n\
        SUMMARY:Custody exchange\n\
        DTSTART:20250307T180000\n\
        DTEND:20250307T183000\n\
        RRULE:FREQ=WEEKLY;UNTIL=20250328T235959\n\
        END:VEVENT\n\
        END:VCALENDAR\n";

    let visits = convert_to_visits(&import_from_text(text), "maya");
    assert_eq!(visits.len(), 4);
    let outcome = deduplicate(visits, &[]);
    assert_eq!(outcome.to_insert.len(), 4);
    assert_eq!(outcome.skipped, 0);
}
